//! ### English
//! Slot-set bookkeeping: budget arithmetic, free lists and slot clearing.
//!
//! ### 中文
//! 槽位集合记账：预算计算、空闲列表以及槽位清理。

use super::CoreState;
use crate::fence::Fence;
use crate::macros::bq_trace;

impl CoreState {
    /// ### English
    /// Buffers the consumer keeps out of the producer's reach.
    ///
    /// ### 中文
    /// 消费者使生产者无法使用的缓冲区数量。
    pub(crate) fn min_undequeued_buffer_count(&self) -> usize {
        if self.async_mode || self.dequeue_buffer_cannot_block {
            self.max_acquired_buffer_count + 1
        } else {
            self.max_acquired_buffer_count
        }
    }

    pub(crate) fn min_max_buffer_count(&self) -> usize {
        self.min_undequeued_buffer_count() + 1
    }

    /// ### English
    /// Slot budget for arbitrary limits.
    ///
    /// ### 中文
    /// 任意上限组合下的槽位预算。
    pub(crate) fn budget_for(
        max_acquired: usize,
        max_dequeued: usize,
        extra_for_async: bool,
        max_buffer_count: usize,
    ) -> usize {
        (max_acquired + max_dequeued + usize::from(extra_for_async)).min(max_buffer_count)
    }

    /// ### English
    /// Current slot budget: the number of slots outside `unused_slots`.
    ///
    /// ### 中文
    /// 当前槽位预算：不在 `unused_slots` 中的槽位数量。
    pub(crate) fn max_buffer_count(&self) -> usize {
        Self::budget_for(
            self.max_acquired_buffer_count,
            self.max_dequeued_buffer_count,
            self.async_mode || self.dequeue_buffer_cannot_block,
            self.max_buffer_count,
        )
    }

    /// ### English
    /// Budget change if the given limits replaced the current ones.
    ///
    /// ### 中文
    /// 若以给定上限替换当前上限，预算的变化量。
    pub(crate) fn budget_delta(
        &self,
        max_acquired: usize,
        max_dequeued: usize,
        extra_for_async: bool,
        max_buffer_count: usize,
    ) -> isize {
        let next = Self::budget_for(max_acquired, max_dequeued, extra_for_async, max_buffer_count);
        next as isize - self.max_buffer_count() as isize
    }

    /// ### English
    /// Moves slots between `unused_slots` and the free sets. Fails without side effects when the
    /// delta cannot be met; shrinking takes empty slots first, then the oldest free buffers.
    ///
    /// ### 中文
    /// 在 `unused_slots` 与空闲集合之间移动槽位。无法满足 delta 时失败且无副作用；
    /// 收缩时先取空槽位，再取最早的空闲缓冲区。
    pub(crate) fn adjust_available_slots(&mut self, delta: isize) -> bool {
        if delta >= 0 {
            let grow = delta.unsigned_abs();
            if grow > self.unused_slots.len() {
                return false;
            }
            for _ in 0..grow {
                let Some(slot) = self.unused_slots.pop_back() else {
                    return false;
                };
                self.free_slots.insert(slot);
            }
        } else {
            let shrink = delta.unsigned_abs();
            if shrink > self.free_slots.len() + self.free_buffers.len() {
                return false;
            }
            for _ in 0..shrink {
                let slot = if let Some(slot) = self.free_slots.pop_first() {
                    slot
                } else if let Some(slot) = self.free_buffers.pop_back() {
                    self.buffers_released_behind_producer = true;
                    slot
                } else {
                    return false;
                };
                self.clear_buffer_slot(slot);
                self.unused_slots.push_back(slot);
            }
        }
        true
    }

    /// ### English
    /// Drops the slot's buffer and resets its bookkeeping. Set membership is the caller's job.
    ///
    /// ### 中文
    /// 丢弃槽位的缓冲区并重置记账字段。集合归属由调用方负责。
    pub(crate) fn clear_buffer_slot(&mut self, slot: usize) {
        bq_trace!(self.consumer_name, "clear_buffer_slot: slot {slot}");
        let entry = &mut self.slots[slot];
        entry.graphic_buffer = None;
        entry.buffer_state.reset();
        entry.request_buffer_called = false;
        entry.frame_number = 0;
        entry.acquire_called = false;
        entry.needs_reallocation = true;
        entry.acquire_fence = Fence::NO_FENCE;
        entry.release_fence = Fence::NO_FENCE;
        if self.shared_buffer_slot == Some(slot) {
            self.shared_buffer_slot = None;
        }
    }

    /// ### English
    /// Frees every buffer; items still pending are marked stale.
    ///
    /// ### 中文
    /// 释放所有缓冲区；仍在待处理队列中的项被标记为过期。
    pub(crate) fn free_all_buffers(&mut self) {
        let free_slots: Vec<usize> = self.free_slots.iter().copied().collect();
        for slot in free_slots {
            self.clear_buffer_slot(slot);
        }
        while let Some(slot) = self.free_buffers.pop_front() {
            self.free_slots.insert(slot);
            self.clear_buffer_slot(slot);
        }
        while let Some(slot) = self.active_buffers.pop_first() {
            self.free_slots.insert(slot);
            self.clear_buffer_slot(slot);
        }
        for item in &mut self.queue {
            item.is_stale = true;
            // the slot is gone, so the next acquire must carry the handle again
            item.acquire_called = false;
        }
        self.shared_buffer_slot = None;
    }

    pub(crate) fn discard_free_buffers(&mut self) {
        if !self.free_buffers.is_empty() {
            self.buffers_released_behind_producer = true;
        }
        while let Some(slot) = self.free_buffers.pop_front() {
            self.free_slots.insert(slot);
            self.clear_buffer_slot(slot);
        }
    }

    pub(crate) fn take_free_buffer(&mut self) -> Option<usize> {
        self.free_buffers.pop_front()
    }

    pub(crate) fn take_free_slot(&mut self) -> Option<usize> {
        self.free_slots.pop_first()
    }

    /// ### English
    /// Puts a slot whose last owner just let go back on `free_buffers`.
    /// The shared slot stays active while shared mode lasts.
    ///
    /// ### 中文
    /// 将刚被最后一个持有者放开的槽位放回 `free_buffers`。
    /// 共享模式期间共享槽位保持在 active 集合中。
    pub(crate) fn return_slot_to_free_list(&mut self, slot: usize) {
        let entry = &mut self.slots[slot];
        if !entry.buffer_state.is_free() {
            return;
        }
        if !self.shared_buffer_mode && entry.buffer_state.is_shared() {
            entry.buffer_state.set_shared(false);
        }
        if !entry.buffer_state.is_shared() {
            let has_buffer = entry.graphic_buffer.is_some();
            self.active_buffers.remove(&slot);
            if has_buffer {
                self.free_buffers.push_back(slot);
            } else {
                self.free_slots.insert(slot);
            }
        }
    }

    pub(crate) fn dequeued_count(&self) -> usize {
        self.active_buffers
            .iter()
            .filter(|&&slot| self.slots[slot].buffer_state.is_dequeued())
            .count()
    }

    pub(crate) fn acquired_count(&self) -> usize {
        self.active_buffers
            .iter()
            .filter(|&&slot| self.slots[slot].buffer_state.is_acquired())
            .count()
    }

    /// ### English
    /// Marks `slot` as the shared buffer, dropping the flag from any other slot.
    ///
    /// ### 中文
    /// 将 `slot` 标记为共享缓冲区，并清除其它槽位上的该标记。
    pub(crate) fn latch_shared_slot(&mut self, slot: usize) {
        for (index, entry) in self.slots.iter_mut().enumerate() {
            if index != slot {
                entry.buffer_state.set_shared(false);
            }
        }
        self.shared_buffer_slot = Some(slot);
        self.slots[slot].buffer_state.set_shared(true);
    }
}
