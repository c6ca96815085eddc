//! ### English
//! Listener contracts invoked by the queue without its core lock held, plus a channel-forwarding
//! consumer listener for consumers that drain events on their own thread.
//!
//! ### 中文
//! 队列在不持有核心锁时调用的监听器契约，以及一个把事件转发到 channel 的消费者监听器，
//! 供在独立线程处理事件的消费者使用。

use std::sync::Arc;

use crossbeam_channel as channel;

use crate::frame::FrameTimestamps;
use crate::queue::{BufferItem, DeathNotice};

/// ### English
/// Consumer-side notifications. Frame callbacks arrive in queue order; the item carries neither the
/// buffer handle nor the slot.
///
/// ### 中文
/// 消费者侧通知。帧回调按 queue 顺序到达；item 中既不含缓冲区句柄也不含槽位。
pub trait ConsumerListener: Send + Sync {
    fn on_frame_available(&self, item: &BufferItem);

    /// ### English
    /// The newest pending frame overwrote a droppable one. Defaults to `on_frame_available`.
    ///
    /// ### 中文
    /// 最新的待处理帧覆盖了一个可丢弃帧。默认转发到 `on_frame_available`。
    fn on_frame_replaced(&self, item: &BufferItem) {
        self.on_frame_available(item);
    }

    /// ### English
    /// Buffers were freed; call `get_released_buffers` to find which slots to forget.
    ///
    /// ### 中文
    /// 有缓冲区被释放；调用 `get_released_buffers` 得知需要遗忘哪些槽位。
    fn on_buffers_released(&self);

    fn on_sideband_stream_changed(&self);

    fn on_disconnect(&self) {}

    /// ### English
    /// Answers `BufferQueueProducer::frame_timestamps`, usually from a `FrameHistory`.
    ///
    /// ### 中文
    /// 响应 `BufferQueueProducer::frame_timestamps`，通常从 `FrameHistory` 中查询。
    fn frame_timestamps(&self, _frame_number: u64) -> Option<FrameTimestamps> {
        None
    }
}

/// ### English
/// Producer-side notifications.
///
/// ### 中文
/// 生产者侧通知。
pub trait ProducerListener: Send + Sync {
    /// ### English
    /// A buffer went back to the free list (released or dropped by the consumer).
    ///
    /// ### 中文
    /// 有缓冲区回到空闲列表（被消费者 release 或丢弃）。
    fn on_buffer_released(&self);

    /// ### English
    /// Liveness link watched by the queue; when it fires the queue disconnects this producer.
    ///
    /// ### 中文
    /// 队列监视的存活链接；触发时队列会断开该生产者。
    fn death_notice(&self) -> Option<DeathNotice> {
        None
    }
}

/// ### English
/// Event forwarded by [`ChannelConsumerListener`].
///
/// ### 中文
/// [`ChannelConsumerListener`] 转发的事件。
#[derive(Debug, Clone)]
pub enum ConsumerEvent {
    FrameAvailable(BufferItem),
    FrameReplaced(BufferItem),
    BuffersReleased,
    SidebandStreamChanged,
    Disconnected,
}

/// ### English
/// Consumer listener that forwards every notification into an unbounded channel.
///
/// ### 中文
/// 把每条通知转发到无界 channel 的消费者监听器。
pub struct ChannelConsumerListener {
    tx: channel::Sender<ConsumerEvent>,
}

impl ChannelConsumerListener {
    pub fn new() -> (Arc<Self>, channel::Receiver<ConsumerEvent>) {
        let (tx, rx) = channel::unbounded();
        (Arc::new(Self { tx }), rx)
    }

    fn forward(&self, event: ConsumerEvent) {
        // receiver gone: consumer stopped listening
        let _ = self.tx.send(event);
    }
}

impl ConsumerListener for ChannelConsumerListener {
    fn on_frame_available(&self, item: &BufferItem) {
        self.forward(ConsumerEvent::FrameAvailable(item.clone()));
    }

    fn on_frame_replaced(&self, item: &BufferItem) {
        self.forward(ConsumerEvent::FrameReplaced(item.clone()));
    }

    fn on_buffers_released(&self) {
        self.forward(ConsumerEvent::BuffersReleased);
    }

    fn on_sideband_stream_changed(&self) {
        self.forward(ConsumerEvent::SidebandStreamChanged);
    }

    fn on_disconnect(&self) {
        self.forward(ConsumerEvent::Disconnected);
    }
}
