use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use dpi::PhysicalSize;

use crate::buffer::PixelFormat;
use crate::config::BufferQueueConfig;
use crate::fence::Fence;
use crate::flags::{BufferUsage, Transform};
use crate::listener::{ConsumerListener, ProducerListener};
use crate::queue::death::DeathWatch;
use crate::queue::item::{BufferItem, DataSpace, Rect, ScalingMode};
use crate::queue::occupancy::OccupancyTracker;
use crate::queue::slot::BufferSlot;
use crate::queue::{NUM_BUFFER_SLOTS, ProducerApi, SidebandStream};

/// ### English
/// Last queued parameters of the shared slot, used to rebuild its item on auto-refresh acquires.
///
/// ### 中文
/// 共享槽位最近一次 queue 的参数，用于在 auto-refresh acquire 时重建其 BufferItem。
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SharedBufferCache {
    pub(crate) crop: Rect,
    pub(crate) transform: Transform,
    pub(crate) scaling_mode: ScalingMode,
    pub(crate) data_space: DataSpace,
}

/// ### English
/// Producer-local settings; guarded by the core lock like everything else.
///
/// ### 中文
/// 生产者本地设置；与其它字段一样受核心锁保护。
#[derive(Debug, Default)]
pub(crate) struct ProducerState {
    /// ### English
    /// `None` keeps the legacy async / non-blocking policy.
    ///
    /// ### 中文
    /// `None` 表示沿用旧的 async / 非阻塞策略。
    pub(crate) dequeue_timeout: Option<Duration>,
    pub(crate) sticky_transform: u32,
    /// ### English
    /// Acquire fence of the previous queue; the GPU api throttles on it.
    ///
    /// ### 中文
    /// 上一次 queue 的 acquire fence；GPU api 以此节流。
    pub(crate) last_queue_fence: Fence,
    pub(crate) last_queued_crop: Rect,
    pub(crate) last_queued_transform: Transform,
    pub(crate) next_callback_ticket: u64,
}

pub(crate) struct CoreState {
    pub(crate) consumer_name: String,
    pub(crate) slots: [BufferSlot; NUM_BUFFER_SLOTS],
    /// ### English
    /// Pending queue (FIFO).
    ///
    /// ### 中文
    /// 待处理队列（FIFO）。
    pub(crate) queue: VecDeque<BufferItem>,
    /// ### English
    /// FREE slots without a buffer, ordered so the lowest index is handed out first.
    ///
    /// ### 中文
    /// 没有缓冲区的 FREE 槽位，按索引有序，最小者优先分配。
    pub(crate) free_slots: BTreeSet<usize>,
    /// ### English
    /// FREE slots holding a buffer, oldest first.
    ///
    /// ### 中文
    /// 持有缓冲区的 FREE 槽位，最早者在前。
    pub(crate) free_buffers: VecDeque<usize>,
    /// ### English
    /// Slots beyond the current buffer budget.
    ///
    /// ### 中文
    /// 超出当前缓冲区预算的槽位。
    pub(crate) unused_slots: VecDeque<usize>,
    /// ### English
    /// Slots owned by the producer or consumer, or waiting in the pending queue.
    ///
    /// ### 中文
    /// 被生产者或消费者持有，或在待处理队列中等待的槽位。
    pub(crate) active_buffers: BTreeSet<usize>,

    pub(crate) consumer_listener: Option<Arc<dyn ConsumerListener>>,
    pub(crate) consumer_controlled_by_app: bool,
    pub(crate) connected_api: Option<ProducerApi>,
    pub(crate) connected_producer_listener: Option<Arc<dyn ProducerListener>>,
    /// ### English
    /// Incremented on every connect; lets a death watcher target exactly one connection.
    ///
    /// ### 中文
    /// 每次 connect 递增；使死亡监视线程只针对某一个连接。
    pub(crate) connection_id: u64,
    pub(crate) death_watch: Option<DeathWatch>,

    pub(crate) is_abandoned: bool,
    pub(crate) is_allocating: bool,
    pub(crate) allow_allocation: bool,
    pub(crate) buffer_has_been_queued: bool,
    /// ### English
    /// Buffers were cleared while the producer may still cache them; reported once by dequeue.
    ///
    /// ### 中文
    /// 在生产者可能仍缓存时清除了缓冲区；由 dequeue 报告一次。
    pub(crate) buffers_released_behind_producer: bool,

    pub(crate) default_size: PhysicalSize<u32>,
    pub(crate) default_format: PixelFormat,
    pub(crate) default_data_space: DataSpace,
    pub(crate) consumer_usage_bits: BufferUsage,
    pub(crate) transform_hint: u32,

    pub(crate) max_buffer_count: usize,
    pub(crate) max_acquired_buffer_count: usize,
    pub(crate) max_dequeued_buffer_count: usize,
    pub(crate) async_mode: bool,
    pub(crate) dequeue_buffer_cannot_block: bool,

    pub(crate) shared_buffer_mode: bool,
    pub(crate) auto_refresh: bool,
    pub(crate) shared_buffer_slot: Option<usize>,
    pub(crate) shared_buffer_cache: SharedBufferCache,

    pub(crate) frame_counter: u64,
    pub(crate) generation_number: u32,
    pub(crate) buffer_age: u64,
    pub(crate) last_queued_slot: Option<usize>,
    pub(crate) sideband_stream: Option<SidebandStream>,
    pub(crate) occupancy: OccupancyTracker,
    pub(crate) producer: ProducerState,
}

impl CoreState {
    pub(crate) fn new(config: &BufferQueueConfig) -> Self {
        let mut state = Self {
            consumer_name: config.consumer_name.clone().unwrap_or_default(),
            slots: std::array::from_fn(|_| BufferSlot::default()),
            queue: VecDeque::new(),
            free_slots: BTreeSet::new(),
            free_buffers: VecDeque::new(),
            unused_slots: VecDeque::new(),
            active_buffers: BTreeSet::new(),
            consumer_listener: None,
            consumer_controlled_by_app: false,
            connected_api: None,
            connected_producer_listener: None,
            connection_id: 0,
            death_watch: None,
            is_abandoned: false,
            is_allocating: false,
            allow_allocation: true,
            buffer_has_been_queued: false,
            buffers_released_behind_producer: false,
            default_size: config.default_size,
            default_format: config.default_format,
            default_data_space: config.default_data_space,
            consumer_usage_bits: config.consumer_usage_bits,
            transform_hint: 0,
            max_buffer_count: NUM_BUFFER_SLOTS,
            max_acquired_buffer_count: config.max_acquired_buffer_count,
            max_dequeued_buffer_count: config.max_dequeued_buffer_count,
            async_mode: false,
            dequeue_buffer_cannot_block: false,
            shared_buffer_mode: false,
            auto_refresh: false,
            shared_buffer_slot: None,
            shared_buffer_cache: SharedBufferCache::default(),
            frame_counter: 0,
            generation_number: 0,
            buffer_age: 0,
            last_queued_slot: None,
            sideband_stream: None,
            occupancy: OccupancyTracker::default(),
            producer: ProducerState::default(),
        };

        let budget = state.max_buffer_count();
        state.free_slots.extend(0..budget);
        for slot in budget..NUM_BUFFER_SLOTS {
            state.unused_slots.push_front(slot);
        }
        state
    }
}
