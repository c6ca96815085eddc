use std::sync::Arc;

use crate::buffer::GraphicBuffer;
use crate::fence::Fence;

/// ### English
/// Ownership state of one slot, as reported to callers.
///
/// ### 中文
/// 对外报告的单个槽位归属状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotState {
    Free,
    Dequeued,
    Queued,
    Acquired,
}

/// ### English
/// Per-slot ownership counters.
///
/// A normal slot has at most one counter set. The shared slot can be dequeued, queued and acquired
/// at the same time, so each role keeps its own count.
///
/// ### 中文
/// 每个槽位的归属计数。
///
/// 普通槽位最多只有一个计数非零。共享槽位可同时处于 dequeued、queued 与 acquired，因此每种角色各自计数。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct BufferState {
    dequeue_count: u32,
    queue_count: u32,
    acquire_count: u32,
    shared: bool,
}

impl BufferState {
    #[inline]
    pub(crate) fn is_free(&self) -> bool {
        !self.is_acquired() && !self.is_dequeued() && !self.is_queued()
    }

    #[inline]
    pub(crate) fn is_dequeued(&self) -> bool {
        self.dequeue_count > 0
    }

    #[inline]
    pub(crate) fn is_queued(&self) -> bool {
        self.queue_count > 0
    }

    #[inline]
    pub(crate) fn is_acquired(&self) -> bool {
        self.acquire_count > 0
    }

    #[inline]
    pub(crate) fn is_shared(&self) -> bool {
        self.shared
    }

    pub(crate) fn set_shared(&mut self, shared: bool) {
        self.shared = shared;
    }

    pub(crate) fn reset(&mut self) {
        *self = BufferState::default();
    }

    pub(crate) fn dequeue(&mut self) {
        self.dequeue_count += 1;
    }

    pub(crate) fn detach_producer(&mut self) {
        self.dequeue_count = self.dequeue_count.saturating_sub(1);
    }

    pub(crate) fn attach_producer(&mut self) {
        self.dequeue_count += 1;
    }

    pub(crate) fn queue(&mut self) {
        self.dequeue_count = self.dequeue_count.saturating_sub(1);
        self.queue_count += 1;
    }

    pub(crate) fn cancel(&mut self) {
        self.dequeue_count = self.dequeue_count.saturating_sub(1);
    }

    pub(crate) fn free_queued(&mut self) {
        self.queue_count = self.queue_count.saturating_sub(1);
    }

    pub(crate) fn acquire(&mut self) {
        self.queue_count = self.queue_count.saturating_sub(1);
        self.acquire_count += 1;
    }

    /// Shared-buffer re-acquire without a queued item.
    pub(crate) fn acquire_not_in_queue(&mut self) {
        self.acquire_count += 1;
    }

    pub(crate) fn release(&mut self) {
        self.acquire_count = self.acquire_count.saturating_sub(1);
    }

    pub(crate) fn detach_consumer(&mut self) {
        self.acquire_count = self.acquire_count.saturating_sub(1);
    }

    pub(crate) fn attach_consumer(&mut self) {
        self.acquire_count += 1;
    }

    /// ### English
    /// Dominant state: ACQUIRED, then DEQUEUED, then QUEUED.
    ///
    /// ### 中文
    /// 主导状态：ACQUIRED 优先，其次 DEQUEUED，再次 QUEUED。
    pub(crate) fn state(&self) -> SlotState {
        if self.is_acquired() {
            SlotState::Acquired
        } else if self.is_dequeued() {
            SlotState::Dequeued
        } else if self.is_queued() {
            SlotState::Queued
        } else {
            SlotState::Free
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        if self.shared {
            return "SHARED";
        }
        match self.state() {
            SlotState::Free => "FREE",
            SlotState::Dequeued => "DEQUEUED",
            SlotState::Queued => "QUEUED",
            SlotState::Acquired => "ACQUIRED",
        }
    }
}

/// ### English
/// One entry of the fixed slot pool.
///
/// ### 中文
/// 固定槽位池中的一项。
#[derive(Debug, Default)]
pub(crate) struct BufferSlot {
    pub(crate) graphic_buffer: Option<Arc<GraphicBuffer>>,
    pub(crate) buffer_state: BufferState,
    /// ### English
    /// Producer pulled the buffer handle across with `request_buffer`.
    ///
    /// ### 中文
    /// 生产者已通过 `request_buffer` 取得缓冲区句柄。
    pub(crate) request_buffer_called: bool,
    pub(crate) frame_number: u64,
    /// ### English
    /// Fence from the producer's last queue; moved into the item on acquire.
    ///
    /// ### 中文
    /// 生产者上次 queue 时的 fence；acquire 时移入 BufferItem。
    pub(crate) acquire_fence: Fence,
    /// ### English
    /// Fence from the consumer's release (or the producer's cancel); handed out on dequeue.
    ///
    /// ### 中文
    /// 消费者 release（或生产者 cancel）留下的 fence；在 dequeue 时交出。
    pub(crate) release_fence: Fence,
    /// ### English
    /// Consumer already received this buffer; later acquires omit the handle.
    ///
    /// ### 中文
    /// 消费者已收到过该缓冲区；后续 acquire 不再附带句柄。
    pub(crate) acquire_called: bool,
    /// ### English
    /// The consumer attached or the core replaced the buffer; the producer must re-import it.
    ///
    /// ### 中文
    /// 消费者 attach 或核心替换了缓冲区；生产者必须重新导入。
    pub(crate) needs_reallocation: bool,
}

impl BufferSlot {
    pub(crate) fn state(&self) -> SlotState {
        self.buffer_state.state()
    }
}
