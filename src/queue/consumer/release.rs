use super::BufferQueueConsumer;
use crate::error::{QueueError, Result};
use crate::fence::Fence;
use crate::macros::{bq_error, bq_trace};
use crate::queue::NUM_BUFFER_SLOTS;

impl BufferQueueConsumer {
    /// ### English
    /// Gives an acquired slot back to the producer side.
    ///
    /// #### Parameters
    /// - `slot`: Slot of the acquired item.
    /// - `frame_number`: Frame number of the acquired item. When the slot has since been given a
    ///   different buffer the frame numbers differ and the call fails with `StaleBufferSlot`
    ///   without touching the slot.
    /// - `release_fence`: Signals once the consumer finished reading; handed to the next dequeue.
    ///
    /// ### 中文
    /// 将 acquired 槽位归还给生产者一侧。
    ///
    /// #### 参数
    /// - `slot`：acquired 项的槽位。
    /// - `frame_number`：acquired 项的帧号。若槽位此后已换成其它缓冲区，帧号将不一致，
    ///   调用以 `StaleBufferSlot` 失败且不改动该槽位。
    /// - `release_fence`：消费者读取完成后 signal；交给下一次 dequeue。
    pub fn release_buffer(&self, slot: usize, frame_number: u64, release_fence: Fence) -> Result<()> {
        let listener = {
            let mut state = self.core.lock();
            if state.is_abandoned {
                bq_error!(state.consumer_name, "release_buffer: queue abandoned");
                return Err(QueueError::NoInit);
            }
            if slot >= NUM_BUFFER_SLOTS {
                bq_error!(state.consumer_name, "release_buffer: slot {slot} out of range");
                return Err(QueueError::BadValue);
            }
            let entry = &state.slots[slot];
            // the shared slot is queued and acquired at once, its frame number drifts
            if frame_number != entry.frame_number && !entry.buffer_state.is_shared() {
                bq_trace!(
                    state.consumer_name,
                    "release_buffer: slot {slot} is stale (frame {frame_number}, slot holds {})",
                    entry.frame_number
                );
                return Err(QueueError::StaleBufferSlot);
            }
            if !entry.buffer_state.is_acquired() {
                bq_error!(
                    state.consumer_name,
                    "release_buffer: attempted to release slot {slot} but its state was {}",
                    entry.buffer_state.label()
                );
                return Err(QueueError::BadValue);
            }

            let entry = &mut state.slots[slot];
            entry.release_fence = release_fence;
            entry.buffer_state.release();
            state.return_slot_to_free_list(slot);
            self.core.signal_dequeue_condition();
            self.core.validate(&state);
            state.connected_producer_listener.clone()
        };

        if let Some(listener) = listener {
            listener.on_buffer_released();
        }
        Ok(())
    }
}
