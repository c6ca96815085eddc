use std::sync::Arc;

use super::BufferQueueProducer;
use crate::buffer::GraphicBuffer;
use crate::error::{QueueError, Result};
use crate::fence::Fence;
use crate::flags::Transform;
use crate::frame::FrameTimestamps;
use crate::macros::bq_error;
use crate::queue::item::Rect;

/// ### English
/// Values a producer can query from the queue.
///
/// ### 中文
/// 生产者可向队列查询的值。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeWindowQuery {
    Width,
    Height,
    Format,
    /// ### English
    /// Buffers the consumer may hold that the producer can never dequeue.
    ///
    /// ### 中文
    /// 消费者可能持有、生产者永远无法 dequeue 的缓冲区数量。
    MinUndequeuedBuffers,
    /// ### English
    /// 1 when at least two frames are waiting to be acquired.
    ///
    /// ### 中文
    /// 至少有两帧等待 acquire 时为 1。
    ConsumerRunningBehind,
    ConsumerUsageBits,
    DefaultDataSpace,
    BufferAge,
    StickyTransform,
}

/// ### English
/// Most recently queued buffer and the parameters it was queued with.
///
/// ### 中文
/// 最近一次入队的缓冲区及其入队参数。
#[derive(Debug, Clone)]
pub struct LastQueuedBuffer {
    pub buffer: Arc<GraphicBuffer>,
    pub fence: Fence,
    pub crop: Rect,
    pub transform: Transform,
}

impl BufferQueueProducer {
    pub fn query(&self, what: NativeWindowQuery) -> Result<u64> {
        let state = self.core.lock();
        if state.is_abandoned {
            bq_error!(state.consumer_name, "query: queue abandoned");
            return Err(QueueError::NoInit);
        }
        let value = match what {
            NativeWindowQuery::Width => u64::from(state.default_size.width),
            NativeWindowQuery::Height => u64::from(state.default_size.height),
            NativeWindowQuery::Format => u64::from(state.default_format.0),
            NativeWindowQuery::MinUndequeuedBuffers => state.min_undequeued_buffer_count() as u64,
            NativeWindowQuery::ConsumerRunningBehind => u64::from(state.queue.len() >= 2),
            NativeWindowQuery::ConsumerUsageBits => u64::from(state.consumer_usage_bits.bits()),
            NativeWindowQuery::DefaultDataSpace => u64::from(state.default_data_space.raw()),
            NativeWindowQuery::BufferAge => {
                if state.buffer_age > i32::MAX as u64 {
                    0
                } else {
                    state.buffer_age
                }
            }
            NativeWindowQuery::StickyTransform => u64::from(state.producer.sticky_transform),
        };
        Ok(value)
    }

    /// ### English
    /// Buffer and acquire fence of the most recently queued slot; `None` before the first queue or
    /// once that slot lost its buffer.
    ///
    /// ### 中文
    /// 最近一次入队槽位的缓冲区与 acquire fence；在首次 queue 之前或该槽位已失去缓冲区时为 `None`。
    pub fn last_queued_buffer(&self) -> Result<Option<LastQueuedBuffer>> {
        let state = self.core.lock();
        if state.is_abandoned {
            bq_error!(state.consumer_name, "last_queued_buffer: queue abandoned");
            return Err(QueueError::NoInit);
        }
        let last = state.last_queued_slot.and_then(|slot| {
            state.slots[slot]
                .graphic_buffer
                .clone()
                .map(|buffer| LastQueuedBuffer {
                    buffer,
                    fence: state.producer.last_queue_fence.clone(),
                    crop: state.producer.last_queued_crop,
                    transform: state.producer.last_queued_transform,
                })
        });
        Ok(last)
    }

    /// ### English
    /// Presentation timeline of `frame_number`, answered by the consumer listener.
    ///
    /// ### 中文
    /// `frame_number` 的呈现时间线，由消费者监听器回答。
    pub fn frame_timestamps(&self, frame_number: u64) -> Option<FrameTimestamps> {
        let listener = self.core.lock().consumer_listener.clone()?;
        listener.frame_timestamps(frame_number)
    }
}
