use std::sync::Arc;

use super::BufferQueueProducer;
use super::dequeue::{FreeSlotCaller, dequeue_deadline};
use crate::buffer::GraphicBuffer;
use crate::error::{QueueError, Result};
use crate::fence::Fence;
use crate::flags::DequeueFlags;
use crate::macros::{bq_debug, bq_error};
use crate::queue::NUM_BUFFER_SLOTS;
use crate::queue::item::DequeuedBuffer;

impl BufferQueueProducer {
    /// ### English
    /// Takes the buffer of a dequeued (and requested) slot out of the queue; the slot becomes empty.
    ///
    /// ### 中文
    /// 将 dequeued（且已 request）槽位的缓冲区移出队列；该槽位变为空槽位。
    pub fn detach_buffer(&self, slot: usize) -> Result<()> {
        let state = self.core.lock();
        let mut state = self.core.wait_while_allocating(state);
        if state.is_abandoned {
            bq_error!(state.consumer_name, "detach_buffer: queue abandoned");
            return Err(QueueError::NoInit);
        }
        if state.connected_api.is_none() {
            bq_error!(state.consumer_name, "detach_buffer: producer not connected");
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
        let entry = &state.slots[slot];
        if !entry.buffer_state.is_dequeued() || entry.buffer_state.is_shared() {
            bq_error!(
                state.consumer_name,
                "detach_buffer: slot {slot} is not owned by the producer (state = {})",
                entry.buffer_state.label()
            );
            return Err(QueueError::BadValue);
        }
        if !entry.request_buffer_called {
            bq_error!(state.consumer_name, "detach_buffer: buffer in slot {slot} has not been requested");
            return Err(QueueError::BadValue);
        }

        state.slots[slot].buffer_state.detach_producer();
        state.active_buffers.remove(&slot);
        state.free_slots.insert(slot);
        state.clear_buffer_slot(slot);
        self.core.signal_dequeue_condition();
        self.core.validate(&state);
        bq_debug!(state.consumer_name, "detach_buffer: slot {slot}");
        Ok(())
    }

    /// ### English
    /// Detaches the oldest free buffer together with its release fence.
    /// `NoMemory` when no free slot holds a buffer.
    ///
    /// ### 中文
    /// 分离最早的空闲缓冲区及其 release fence。若没有持有缓冲区的空闲槽位，返回 `NoMemory`。
    pub fn detach_next_buffer(&self) -> Result<(Arc<GraphicBuffer>, Fence)> {
        let state = self.core.lock();
        let mut state = self.core.wait_while_allocating(state);
        if state.is_abandoned {
            bq_error!(state.consumer_name, "detach_next_buffer: queue abandoned");
            return Err(QueueError::NoInit);
        }
        if state.connected_api.is_none() {
            bq_error!(state.consumer_name, "detach_next_buffer: producer not connected");
            return Err(QueueError::NoInit);
        }
        if state.shared_buffer_mode {
            bq_error!(
                state.consumer_name,
                "detach_next_buffer: cannot detach a buffer in shared buffer mode"
            );
            return Err(QueueError::BadValue);
        }
        let Some(slot) = state.take_free_buffer() else {
            bq_debug!(state.consumer_name, "detach_next_buffer: no free buffers");
            return Err(QueueError::NoMemory);
        };

        let entry = &state.slots[slot];
        let buffer = entry.graphic_buffer.clone();
        let fence = entry.release_fence.clone();
        state.free_slots.insert(slot);
        state.clear_buffer_slot(slot);
        self.core.signal_dequeue_condition();
        self.core.validate(&state);

        match buffer {
            Some(buffer) => Ok((buffer, fence)),
            None => {
                bq_error!(state.consumer_name, "detach_next_buffer: free slot {slot} had no buffer");
                Err(QueueError::NoMemory)
            }
        }
    }

    /// ### English
    /// Places a foreign buffer into a slot the producer then owns as DEQUEUED.
    ///
    /// The buffer's generation must match the queue's. The result always carries
    /// `BUFFER_NEEDS_REALLOCATION`, a `NO_FENCE` fence and age 0.
    ///
    /// ### 中文
    /// 将外部缓冲区放入一个槽位，该槽位随后以 DEQUEUED 状态归生产者所有。
    ///
    /// 缓冲区的 generation 必须与队列一致。结果总是带有 `BUFFER_NEEDS_REALLOCATION`、`NO_FENCE` 与年龄 0。
    pub fn attach_buffer(&self, buffer: Arc<GraphicBuffer>) -> Result<DequeuedBuffer> {
        let state = self.core.lock();
        if state.is_abandoned {
            bq_error!(state.consumer_name, "attach_buffer: queue abandoned");
            return Err(QueueError::NoInit);
        }
        if state.connected_api.is_none() {
            bq_error!(state.consumer_name, "attach_buffer: producer not connected");
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

        let deadline = dequeue_deadline(&state);
        let state = self.core.wait_while_allocating(state);
        let (mut state, slot) = self.wait_for_free_slot(state, FreeSlotCaller::Attach, deadline)?;

        let entry = &mut state.slots[slot];
        entry.graphic_buffer = Some(buffer);
        entry.buffer_state.attach_producer();
        entry.acquire_fence = Fence::NO_FENCE;
        entry.release_fence = Fence::NO_FENCE;
        entry.request_buffer_called = true;
        entry.acquire_called = false;
        entry.needs_reallocation = false;
        state.active_buffers.insert(slot);
        self.core.validate(&state);
        bq_debug!(state.consumer_name, "attach_buffer: slot {slot}");

        Ok(DequeuedBuffer {
            slot,
            fence: Fence::NO_FENCE,
            flags: DequeueFlags::BUFFER_NEEDS_REALLOCATION,
            buffer_age: 0,
        })
    }
}
