use super::BufferQueueConsumer;
use crate::clock::{self, Nsecs};
use crate::error::{QueueError, Result};
use crate::fence::Fence;
use crate::flags::Transform;
use crate::macros::{bq_debug, bq_error, bq_trace};
use crate::queue::item::BufferItem;

/// ### English
/// Timestamps further than this from the expected present time are treated as garbage.
///
/// ### 中文
/// 与期望呈现时间相差超过该值的时间戳视为无效值。
const MAX_REASONABLE_NSEC: Nsecs = clock::NSECS_PER_SEC;

impl BufferQueueConsumer {
    /// ### English
    /// Takes the head of the pending queue.
    ///
    /// #### Parameters
    /// - `expected_present`: When the frame will reach the screen; 0 disables timing checks. While
    ///   the next frame is already due, older non-auto-timestamped frames are dropped, and a head
    ///   scheduled for later yields `PresentLater`.
    /// - `max_frame_number`: Newest frame the consumer is ready for; 0 means no cap.
    ///
    /// #### Returns
    /// The item. `graphic_buffer` is `None` when this slot's buffer was already handed to the
    /// consumer by an earlier acquire.
    ///
    /// ### 中文
    /// 取出待处理队列的队头。
    ///
    /// #### 参数
    /// - `expected_present`：该帧将上屏的时间；0 表示不做时间检查。当下一帧已经到期时，较早的非自动时间戳帧会被丢弃；
    ///   若队头计划在更晚呈现，则返回 `PresentLater`。
    /// - `max_frame_number`：消费者已准备好的最新帧号；0 表示不限制。
    ///
    /// #### 返回
    /// 该项。若此槽位的缓冲区已在之前的 acquire 中交给消费者，则 `graphic_buffer` 为 `None`。
    pub fn acquire_buffer(&self, expected_present: Nsecs, max_frame_number: u64) -> Result<BufferItem> {
        let (item, dropped, producer_listener) = {
            let mut state = self.core.lock();
            if state.is_abandoned {
                bq_error!(state.consumer_name, "acquire_buffer: queue abandoned");
                return Err(QueueError::NoInit);
            }

            let acquired = state.acquired_count();
            if acquired >= state.max_acquired_buffer_count + 1 {
                bq_error!(
                    state.consumer_name,
                    "acquire_buffer: max acquired buffer count reached: {acquired} (max {})",
                    state.max_acquired_buffer_count
                );
                return Err(QueueError::InvalidOperation);
            }

            let shared_buffer_available =
                state.shared_buffer_mode && state.auto_refresh && state.shared_buffer_slot.is_some();
            if state.queue.is_empty() && !shared_buffer_available {
                bq_trace!(state.consumer_name, "acquire_buffer: queue is empty");
                return Err(QueueError::NoBufferAvailable);
            }

            let mut dropped = 0usize;
            if expected_present != 0 && !state.queue.is_empty() {
                while state.queue.len() > 1 && !state.queue[0].is_auto_timestamp {
                    let next = &state.queue[1];
                    // dropping the head must not leave a frame the consumer is not ready for
                    if max_frame_number != 0 && next.frame_number > max_frame_number {
                        break;
                    }
                    let desired_present = next.timestamp;
                    if desired_present < expected_present.saturating_sub(MAX_REASONABLE_NSEC)
                        || desired_present > expected_present
                    {
                        break;
                    }

                    let Some(front) = state.queue.pop_front() else {
                        break;
                    };
                    bq_trace!(
                        state.consumer_name,
                        "acquire_buffer: dropping frame {} (expected {expected_present})",
                        front.frame_number
                    );
                    if let Some(slot) = front.slot.filter(|_| !front.is_stale) {
                        state.slots[slot].buffer_state.free_queued();
                        state.return_slot_to_free_list(slot);
                        dropped += 1;
                    }
                }

                let front = &state.queue[0];
                let desired_present = front.timestamp;
                let buffer_is_due = desired_present <= expected_present
                    || desired_present > expected_present.saturating_add(MAX_REASONABLE_NSEC);
                let consumer_is_ready = max_frame_number == 0 || front.frame_number <= max_frame_number;
                if !buffer_is_due || !consumer_is_ready {
                    bq_trace!(
                        state.consumer_name,
                        "acquire_buffer: defer frame {} (desired {desired_present}, expected {expected_present})",
                        front.frame_number
                    );
                    self.core.signal_dequeue_condition();
                    self.core.validate(&state);
                    let listener = state.connected_producer_listener.clone().filter(|_| dropped > 0);
                    drop(state);
                    if let Some(listener) = listener {
                        for _ in 0..dropped {
                            listener.on_buffer_released();
                        }
                    }
                    return Err(QueueError::PresentLater);
                }
            } else if let Some(front) = state.queue.front() {
                if max_frame_number != 0 && front.frame_number > max_frame_number {
                    bq_trace!(
                        state.consumer_name,
                        "acquire_buffer: frame {} is beyond {max_frame_number}",
                        front.frame_number
                    );
                    return Err(QueueError::PresentLater);
                }
            }

            let from_queue = !state.queue.is_empty();
            let popped = state.queue.pop_front();
            let mut item = match popped {
                Some(item) => item,
                None => {
                    // rebuild the shared buffer's item from what was cached when it was last queued
                    state = self.core.wait_while_allocating(state);
                    let Some(slot) = state.shared_buffer_slot else {
                        return Err(QueueError::NoBufferAvailable);
                    };
                    let cache = state.shared_buffer_cache;
                    BufferItem {
                        graphic_buffer: state.slots[slot].graphic_buffer.clone(),
                        fence: Fence::NO_FENCE,
                        crop: cache.crop,
                        transform: cache.transform.difference(Transform::INVERSE_DISPLAY),
                        transform_to_display_inverse: cache.transform.contains(Transform::INVERSE_DISPLAY),
                        scaling_mode: cache.scaling_mode,
                        timestamp: clock::now(),
                        is_auto_timestamp: false,
                        data_space: cache.data_space,
                        frame_number: state.frame_counter,
                        slot: Some(slot),
                        droppable: false,
                        acquire_called: state.slots[slot].acquire_called,
                        queued_buffer: false,
                        is_stale: false,
                        auto_refresh: state.shared_buffer_mode && state.auto_refresh,
                    }
                }
            };

            if let Some(slot) = item.slot.filter(|_| !item.is_stale) {
                let entry = &mut state.slots[slot];
                entry.acquire_called = true;
                if from_queue {
                    entry.buffer_state.acquire();
                } else {
                    entry.buffer_state.acquire_not_in_queue();
                }
                entry.acquire_fence = Fence::NO_FENCE;
            }
            if item.acquire_called {
                item.graphic_buffer = None;
            }

            self.core.signal_dequeue_condition();
            let depth = state.queue.len();
            state.occupancy.register_occupancy_change(depth);
            bq_debug!(
                state.consumer_name,
                "acquire_buffer: slot={:?} frame={} dropped={dropped}",
                item.slot,
                item.frame_number
            );
            self.core.validate(&state);
            (item, dropped, state.connected_producer_listener.clone())
        };

        if let Some(listener) = producer_listener {
            for _ in 0..dropped {
                listener.on_buffer_released();
            }
        }
        Ok(item)
    }
}
