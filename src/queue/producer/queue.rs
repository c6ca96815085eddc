use std::mem;
use std::time::Duration;

use super::{BufferQueueProducer, queue_output};
use crate::clock;
use crate::error::{QueueError, Result};
use crate::fence::Fence;
use crate::flags::Transform;
use crate::macros::{bq_error, bq_trace};
use crate::queue::item::{BufferItem, DataSpace, QueueBufferInput, QueueBufferOutput, ScalingMode};
use crate::queue::shared_state::SharedBufferCache;
use crate::queue::{NUM_BUFFER_SLOTS, ProducerApi};

const THROTTLE_WARNING: Duration = Duration::from_secs(1);

impl BufferQueueProducer {
    /// ### English
    /// Hands a rendered slot to the consumer.
    ///
    /// When the newest pending frame is droppable it is replaced in place and its slot goes back to
    /// the free list. Listener callbacks run after the core lock is released, in the order of the
    /// `queue_buffer` calls. A GPU producer then waits for the previous frame's acquire fence.
    ///
    /// ### 中文
    /// 将渲染完成的槽位交给消费者。
    ///
    /// 若最新的待处理帧可丢弃，则原地替换之，其槽位回到空闲列表。监听器回调在释放核心锁之后、
    /// 按 `queue_buffer` 调用顺序执行。随后 GPU 生产者会等待上一帧的 acquire fence。
    pub fn queue_buffer(&self, slot: usize, input: QueueBufferInput) -> Result<QueueBufferOutput> {
        let QueueBufferInput {
            timestamp,
            is_auto_timestamp,
            data_space,
            crop,
            scaling_mode,
            transform,
            sticky_transform,
            fence,
            droppable,
        } = input;

        let (ticket, replaced, callback_item, listener, previous_fence, api, output) = {
            let mut state = self.core.lock();
            let Some(fence) = fence else {
                bq_error!(state.consumer_name, "queue_buffer: fence is NULL");
                return Err(QueueError::BadValue);
            };
            let Ok(scaling_mode) = ScalingMode::try_from(scaling_mode) else {
                bq_error!(state.consumer_name, "queue_buffer: unknown scaling mode {scaling_mode}");
                return Err(QueueError::BadValue);
            };
            if state.is_abandoned {
                bq_error!(state.consumer_name, "queue_buffer: queue abandoned");
                return Err(QueueError::NoInit);
            }
            if state.connected_api.is_none() {
                bq_error!(state.consumer_name, "queue_buffer: producer not connected");
                return Err(QueueError::NoInit);
            }
            if slot >= NUM_BUFFER_SLOTS {
                bq_error!(state.consumer_name, "queue_buffer: slot {slot} out of range");
                return Err(QueueError::BadValue);
            }
            if !state.slots[slot].buffer_state.is_dequeued() {
                bq_error!(
                    state.consumer_name,
                    "queue_buffer: slot {slot} is not owned by the producer (state = {})",
                    state.slots[slot].buffer_state.label()
                );
                return Err(QueueError::BadValue);
            }
            if !state.slots[slot].request_buffer_called {
                bq_error!(
                    state.consumer_name,
                    "queue_buffer: slot {slot} was queued without requesting its buffer"
                );
                return Err(QueueError::BadValue);
            }
            let Some(buffer) = state.slots[slot].graphic_buffer.clone() else {
                bq_error!(state.consumer_name, "queue_buffer: slot {slot} has no buffer");
                return Err(QueueError::BadValue);
            };
            let bounds = buffer.bounds();
            if crop.clipped_to(&bounds) != crop {
                bq_error!(
                    state.consumer_name,
                    "queue_buffer: crop {crop:?} is not contained in the buffer {}x{}",
                    buffer.width(),
                    buffer.height()
                );
                return Err(QueueError::BadValue);
            }

            if state.shared_buffer_mode && state.shared_buffer_slot.is_none() {
                state.latch_shared_slot(slot);
            }
            let is_shared_slot = state.shared_buffer_mode && state.shared_buffer_slot == Some(slot);
            let data_space = if data_space == DataSpace::Unknown {
                state.default_data_space
            } else {
                data_space
            };
            let timestamp = if is_auto_timestamp {
                clock::now()
            } else {
                timestamp
            };

            state.frame_counter += 1;
            let frame_number = state.frame_counter;
            let entry = &mut state.slots[slot];
            entry.acquire_fence = fence.clone();
            entry.buffer_state.queue();
            entry.frame_number = frame_number;
            let acquire_called = entry.acquire_called;

            let item = BufferItem {
                graphic_buffer: Some(buffer),
                fence: fence.clone(),
                crop,
                transform: transform.difference(Transform::INVERSE_DISPLAY),
                transform_to_display_inverse: transform.contains(Transform::INVERSE_DISPLAY),
                scaling_mode,
                timestamp,
                is_auto_timestamp,
                data_space,
                frame_number,
                slot: Some(slot),
                droppable: droppable
                    || state.async_mode
                    || state.dequeue_buffer_cannot_block
                    || is_shared_slot,
                acquire_called,
                queued_buffer: true,
                is_stale: false,
                auto_refresh: state.shared_buffer_mode && state.auto_refresh,
            };

            state.producer.sticky_transform = sticky_transform;
            state.producer.last_queued_crop = crop;
            state.producer.last_queued_transform = transform;
            if state.shared_buffer_mode {
                state.shared_buffer_cache = SharedBufferCache {
                    crop,
                    transform,
                    scaling_mode,
                    data_space,
                };
            }

            let callback_item = BufferItem {
                graphic_buffer: None,
                slot: None,
                ..item.clone()
            };

            let mut replaced = false;
            let last = state
                .queue
                .back()
                .map(|last| (last.droppable, last.is_stale, last.slot));
            match last {
                Some((true, is_stale, last_slot)) => {
                    if let Some(last_slot) = last_slot.filter(|_| !is_stale) {
                        state.slots[last_slot].buffer_state.free_queued();
                        state.return_slot_to_free_list(last_slot);
                    }
                    if let Some(back) = state.queue.back_mut() {
                        *back = item;
                    }
                    replaced = true;
                }
                _ => state.queue.push_back(item),
            }

            state.buffer_has_been_queued = true;
            state.last_queued_slot = Some(slot);
            self.core.signal_dequeue_condition();

            let output = queue_output(&state);
            let depth = state.queue.len();
            state.occupancy.register_occupancy_change(depth);

            let ticket = state.producer.next_callback_ticket;
            state.producer.next_callback_ticket += 1;
            let previous_fence = mem::replace(&mut state.producer.last_queue_fence, fence);
            bq_trace!(
                state.consumer_name,
                "queue_buffer: slot={slot} frame={frame_number} replaced={replaced} depth={depth}"
            );
            self.core.validate(&state);

            (
                ticket,
                replaced,
                callback_item,
                state.consumer_listener.clone(),
                previous_fence,
                state.connected_api,
                output,
            )
        };

        self.core.callbacks.run_in_order(ticket, || {
            if let Some(listener) = listener {
                if replaced {
                    listener.on_frame_replaced(&callback_item);
                } else {
                    listener.on_frame_available(&callback_item);
                }
            }
        });

        if api == Some(ProducerApi::Gpu) {
            // one frame of latency at most
            if let Err(err) = previous_fence.wait_forever(THROTTLE_WARNING, "Throttling GPU production") {
                log::warn!("queue_buffer: throttle wait failed: {err}");
            }
        }
        Ok(output)
    }

    /// ### English
    /// Returns a dequeued slot without queueing it. `fence` becomes the slot's release fence.
    /// Refused in shared-buffer mode.
    ///
    /// ### 中文
    /// 不入队而直接归还一个 dequeued 槽位。`fence` 成为该槽位的 release fence。共享缓冲模式下拒绝。
    pub fn cancel_buffer(&self, slot: usize, fence: Fence) -> Result<()> {
        let mut state = self.core.lock();
        if state.is_abandoned {
            bq_error!(state.consumer_name, "cancel_buffer: queue abandoned");
            return Err(QueueError::NoInit);
        }
        if state.connected_api.is_none() {
            bq_error!(state.consumer_name, "cancel_buffer: producer not connected");
            return Err(QueueError::NoInit);
        }
        if state.shared_buffer_mode {
            bq_error!(state.consumer_name, "cancel_buffer: cannot cancel a buffer in shared buffer mode");
            return Err(QueueError::BadValue);
        }
        if slot >= NUM_BUFFER_SLOTS {
            bq_error!(state.consumer_name, "cancel_buffer: slot {slot} out of range");
            return Err(QueueError::BadValue);
        }
        if !state.slots[slot].buffer_state.is_dequeued() {
            bq_error!(
                state.consumer_name,
                "cancel_buffer: slot {slot} is not owned by the producer (state = {})",
                state.slots[slot].buffer_state.label()
            );
            return Err(QueueError::BadValue);
        }

        state.slots[slot].buffer_state.cancel();
        state.slots[slot].release_fence = fence;
        state.return_slot_to_free_list(slot);
        self.core.signal_dequeue_condition();
        self.core.validate(&state);
        Ok(())
    }
}
