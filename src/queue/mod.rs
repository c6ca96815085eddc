//! ### English
//! Slot-based producer / consumer buffer queue.
//!
//! One [`BufferQueueProducer`] (a drawing client) and one [`BufferQueueConsumer`] (a compositor or
//! sampler) exchange a fixed pool of [`NUM_BUFFER_SLOTS`] slots through a shared core guarded by a
//! single mutex.
//!
//! ### 中文
//! 基于槽位的生产者 / 消费者缓冲队列。
//!
//! 一个 [`BufferQueueProducer`]（绘制客户端）与一个 [`BufferQueueConsumer`]（合成器或采样器）
//! 通过由单个互斥锁保护的共享核心，交换固定数量 [`NUM_BUFFER_SLOTS`] 的槽位。
mod callback;
mod consumer;
mod death;
mod item;
mod occupancy;
mod producer;
pub(crate) mod shared_state;
mod slot;

use std::fmt;
use std::sync::Arc;

pub use consumer::{BufferQueueConsumer, QueueSnapshot};
pub use death::{DeathNotice, DeathToken, death_link};
pub use item::{
    BufferItem, DataSpace, DequeuedBuffer, QueueBufferInput, QueueBufferOutput, Rect, ScalingMode,
};
pub use occupancy::OccupancySegment;
pub use producer::{BufferQueueProducer, LastQueuedBuffer, NativeWindowQuery};
pub use slot::SlotState;

use crate::buffer::GraphicBufferAlloc;
use crate::config::BufferQueueConfig;
use crate::error::{QueueError, Result};
use self::shared_state::BufferQueueCore;

/// ### English
/// Fixed slot pool size. A slot index is the stable identity of a buffer for the queue's lifetime.
///
/// ### 中文
/// 固定槽位池大小。槽位索引在队列生命周期内是缓冲区的稳定标识。
pub const NUM_BUFFER_SLOTS: usize = 64;

/// ### English
/// Largest accepted max-acquired count (leaves room for one dequeued and one queued buffer).
///
/// ### 中文
/// 可接受的最大 max-acquired 值（为一个 dequeued 与一个 queued 缓冲区留出空间）。
pub const MAX_MAX_ACQUIRED_BUFFERS: usize = NUM_BUFFER_SLOTS - 2;

/// ### English
/// Kind of client connected on the producer side.
///
/// ### 中文
/// 生产者一侧连接的客户端类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ProducerApi {
    /// ### English
    /// GPU rendering stream; queue throttles on the previous frame's acquire fence.
    ///
    /// ### 中文
    /// GPU 渲染流；queue 时会等待上一帧的 acquire fence 进行节流。
    Gpu = 1,
    Cpu = 2,
    Media = 3,
    Camera = 4,
}

/// ### English
/// Opaque out-of-band stream handle (e.g. a tunnelled video path).
///
/// ### 中文
/// 不透明的带外流句柄（例如隧道化视频通路）。
#[derive(Clone)]
pub struct SidebandStream {
    handle: Arc<NativeHandle>,
}

/// ### English
/// File descriptors and integers describing a sideband stream.
///
/// ### 中文
/// 描述 sideband 流的文件描述符与整数。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativeHandle {
    pub fds: Vec<i32>,
    pub ints: Vec<i32>,
}

impl SidebandStream {
    pub fn new(handle: NativeHandle) -> Self {
        Self {
            handle: Arc::new(handle),
        }
    }

    pub fn handle(&self) -> &NativeHandle {
        &self.handle
    }

    pub fn same_as(&self, other: &SidebandStream) -> bool {
        Arc::ptr_eq(&self.handle, &other.handle)
    }
}

impl fmt::Debug for SidebandStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SidebandStream").field(&*self.handle).finish()
    }
}

/// ### English
/// Entry point creating a producer / consumer pair over one fresh core.
///
/// ### 中文
/// 创建共享同一个新核心的生产者 / 消费者对的入口。
pub struct BufferQueue;

impl BufferQueue {
    /// ### English
    /// Creates a queue.
    ///
    /// Rejects (`BadValue`) configurations whose limits do not fit the slot pool.
    ///
    /// ### 中文
    /// 创建一个队列。
    ///
    /// 若配置的上限无法容纳于槽位池中，则拒绝（`BadValue`）。
    pub fn create_buffer_queue(
        allocator: Arc<dyn GraphicBufferAlloc>,
        config: BufferQueueConfig,
    ) -> Result<(BufferQueueProducer, BufferQueueConsumer)> {
        let acquired = config.max_acquired_buffer_count;
        let dequeued = config.max_dequeued_buffer_count;
        if !(1..=MAX_MAX_ACQUIRED_BUFFERS).contains(&acquired)
            || dequeued < 1
            || acquired + dequeued > NUM_BUFFER_SLOTS
            || config.default_size.width == 0
            || config.default_size.height == 0
        {
            log::error!(
                "create_buffer_queue: invalid limits acquired={acquired} dequeued={dequeued} size={}x{}",
                config.default_size.width,
                config.default_size.height
            );
            return Err(QueueError::BadValue);
        }
        let core = BufferQueueCore::new(allocator, config);
        Ok((
            BufferQueueProducer::from_core(core.clone()),
            BufferQueueConsumer::from_core(core),
        ))
    }
}
