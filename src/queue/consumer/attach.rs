use std::sync::Arc;

use super::BufferQueueConsumer;
use crate::buffer::GraphicBuffer;
use crate::error::{QueueError, Result};
use crate::fence::Fence;
use crate::macros::{bq_debug, bq_error};
use crate::queue::NUM_BUFFER_SLOTS;

impl BufferQueueConsumer {
    /// ### English
    /// Removes an acquired buffer from the queue; the slot becomes empty and free.
    ///
    /// ### 中文
    /// 将一个 acquired 缓冲区移出队列；该槽位变为空闲空槽位。
    pub fn detach_buffer(&self, slot: usize) -> Result<()> {
        let mut state = self.core.lock();
        if state.is_abandoned {
            bq_error!(state.consumer_name, "detach_buffer: queue abandoned");
            return Err(QueueError::NoInit);
        }
        if state.shared_buffer_mode || state.shared_buffer_slot == Some(slot) {
            bq_error!(state.consumer_name, "detach_buffer: cannot detach a buffer in shared buffer mode");
            return Err(QueueError::BadValue);
        }
        if slot >= NUM_BUFFER_SLOTS {
            bq_error!(state.consumer_name, "detach_buffer: slot {slot} out of range");
            return Err(QueueError::BadValue);
        }
        // a slot still flagged shared may be queued or dequeued at the same time
        let entry = &state.slots[slot];
        if !entry.buffer_state.is_acquired() || entry.buffer_state.is_shared() {
            bq_error!(
                state.consumer_name,
                "detach_buffer: slot {slot} is not owned by the consumer (state = {})",
                entry.buffer_state.label()
            );
            return Err(QueueError::BadValue);
        }

        state.slots[slot].buffer_state.detach_consumer();
        state.active_buffers.remove(&slot);
        state.free_slots.insert(slot);
        state.clear_buffer_slot(slot);
        self.core.signal_dequeue_condition();
        self.core.validate(&state);
        bq_debug!(state.consumer_name, "detach_buffer: slot {slot}");
        Ok(())
    }

    /// ### English
    /// Attaches a buffer as ACQUIRED, preferring an empty slot over evicting a free buffer.
    ///
    /// The buffer's generation must equal the queue's; the queue generation is then bumped and the
    /// buffer restamped, so buffers from before the attach no longer match. The producer sees the
    /// slot with `BUFFER_NEEDS_REALLOCATION` on its next dequeue.
    ///
    /// ### 中文
    /// 以 ACQUIRED 状态 attach 一个缓冲区，优先使用空槽位而非驱逐空闲缓冲区。
    ///
    /// 缓冲区的 generation 必须等于队列的 generation；随后队列 generation 递增并重新写入该缓冲区，
    /// 因此 attach 之前的缓冲区将不再匹配。生产者下次 dequeue 到该槽位时会看到 `BUFFER_NEEDS_REALLOCATION`。
    pub fn attach_buffer(&self, buffer: Arc<GraphicBuffer>) -> Result<usize> {
        let mut state = self.core.lock();
        if state.is_abandoned {
            bq_error!(state.consumer_name, "attach_buffer: queue abandoned");
            return Err(QueueError::NoInit);
        }
        if state.shared_buffer_mode {
            bq_error!(state.consumer_name, "attach_buffer: cannot attach a buffer in shared buffer mode");
            return Err(QueueError::BadValue);
        }
        if buffer.generation_number() != state.generation_number {
            bq_error!(
                state.consumer_name,
                "attach_buffer: generation number mismatch [buffer {}] [queue {}]",
                buffer.generation_number(),
                state.generation_number
            );
            return Err(QueueError::BadValue);
        }
        let acquired = state.acquired_count();
        if acquired >= state.max_acquired_buffer_count + 1 {
            bq_error!(
                state.consumer_name,
                "attach_buffer: max acquired buffer count reached: {acquired} (max {})",
                state.max_acquired_buffer_count
            );
            return Err(QueueError::InvalidOperation);
        }

        let Some(slot) = state.take_free_slot().or_else(|| state.take_free_buffer()) else {
            bq_error!(state.consumer_name, "attach_buffer: could not find a free buffer slot");
            return Err(QueueError::NoMemory);
        };

        state.generation_number = state.generation_number.wrapping_add(1);
        buffer.set_generation_number(state.generation_number);
        state.active_buffers.insert(slot);
        let entry = &mut state.slots[slot];
        entry.graphic_buffer = Some(buffer);
        entry.buffer_state.attach_consumer();
        entry.needs_reallocation = true;
        entry.request_buffer_called = false;
        entry.acquire_fence = Fence::NO_FENCE;
        entry.release_fence = Fence::NO_FENCE;
        entry.frame_number = 0;
        // attached buffers always travel with their handle on the next acquire
        entry.acquire_called = false;
        self.core.validate(&state);
        bq_debug!(state.consumer_name, "attach_buffer: slot {slot}");
        Ok(slot)
    }

    /// ### English
    /// Frees every buffer sitting on the free list. The next dequeue reports `RELEASE_ALL_BUFFERS`.
    ///
    /// ### 中文
    /// 释放空闲列表上的所有缓冲区。下一次 dequeue 会报告 `RELEASE_ALL_BUFFERS`。
    pub fn discard_free_buffers(&self) -> Result<()> {
        let mut state = self.core.lock();
        if state.is_abandoned {
            return Err(QueueError::NoInit);
        }
        state.discard_free_buffers();
        self.core.validate(&state);
        Ok(())
    }

    /// ### English
    /// Bit mask of slots whose buffer the consumer must drop from its import cache.
    ///
    /// ### 中文
    /// 消费者需要从导入缓存中丢弃其缓冲区的槽位位掩码。
    pub fn get_released_buffers(&self) -> Result<u64> {
        let state = self.core.lock();
        if state.is_abandoned {
            bq_error!(state.consumer_name, "get_released_buffers: queue abandoned");
            return Err(QueueError::NoInit);
        }
        let mut mask = state
            .slots
            .iter()
            .enumerate()
            .filter(|(_, entry)| !entry.acquire_called)
            .fold(0u64, |mask, (slot, _)| mask | (1u64 << slot));
        // queued items already acquired once will come back without a handle
        for item in state.queue.iter().filter(|item| item.acquire_called) {
            if let Some(slot) = item.slot {
                mask &= !(1u64 << slot);
            }
        }
        bq_debug!(state.consumer_name, "get_released_buffers: {mask:#x}");
        Ok(mask)
    }
}
