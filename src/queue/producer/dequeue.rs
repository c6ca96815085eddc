use std::sync::{Arc, MutexGuard};
use std::time::Instant;

use dpi::PhysicalSize;

use super::BufferQueueProducer;
use crate::buffer::{GraphicBuffer, PixelFormat};
use crate::error::{QueueError, Result};
use crate::fence::Fence;
use crate::flags::{BufferUsage, DequeueFlags};
use crate::macros::{bq_debug, bq_error, bq_trace};
use crate::queue::NUM_BUFFER_SLOTS;
use crate::queue::item::DequeuedBuffer;
use crate::queue::shared_state::CoreState;

pub(super) fn dequeue_deadline(state: &CoreState) -> Option<Instant> {
    state
        .producer
        .dequeue_timeout
        .and_then(|timeout| Instant::now().checked_add(timeout))
}

/// ### English
/// Which operation is looking for a slot; decides the free-list preference.
///
/// ### 中文
/// 正在查找槽位的操作；决定空闲列表的优先顺序。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum FreeSlotCaller {
    Dequeue,
    Attach,
}

impl FreeSlotCaller {
    fn name(self) -> &'static str {
        match self {
            FreeSlotCaller::Dequeue => "dequeue_buffer",
            FreeSlotCaller::Attach => "attach_buffer",
        }
    }
}

impl BufferQueueProducer {
    /// ### English
    /// Finds a slot for `caller`, waiting on the dequeue condition while none is available.
    ///
    /// Dequeue prefers slots that already hold a buffer; attach prefers empty slots so no buffer is
    /// thrown away. A latched shared slot is always returned in shared mode.
    ///
    /// ### 中文
    /// 为 `caller` 查找槽位；无可用槽位时在 dequeue 条件上等待。
    ///
    /// dequeue 优先选择已有缓冲区的槽位；attach 优先选择空槽位，以免丢弃缓冲区。共享模式下总是返回已锁定的共享槽位。
    pub(super) fn wait_for_free_slot<'a>(
        &self,
        mut state: MutexGuard<'a, CoreState>,
        caller: FreeSlotCaller,
        deadline: Option<Instant>,
    ) -> Result<(MutexGuard<'a, CoreState>, usize)> {
        loop {
            if state.is_abandoned {
                bq_error!(state.consumer_name, "{}: queue abandoned", caller.name());
                return Err(QueueError::NoInit);
            }
            if state.connected_api.is_none() {
                bq_error!(state.consumer_name, "{}: producer not connected", caller.name());
                return Err(QueueError::NoInit);
            }

            let dequeued = state.dequeued_count();
            let acquired = state.acquired_count();
            if state.buffer_has_been_queued && dequeued >= state.max_dequeued_buffer_count {
                bq_error!(
                    state.consumer_name,
                    "{}: attempting to exceed the max dequeued buffer count ({})",
                    caller.name(),
                    state.max_dequeued_buffer_count
                );
                return Err(QueueError::InvalidOperation);
            }

            // consumer fell behind: do not let the producer run further ahead
            let too_many_buffers = state.queue.len() > state.max_buffer_count();
            let found = if too_many_buffers {
                bq_trace!(
                    state.consumer_name,
                    "{}: queue depth {} over budget",
                    caller.name(),
                    state.queue.len()
                );
                None
            } else if let Some(slot) = state
                .shared_buffer_slot
                .filter(|_| state.shared_buffer_mode && caller == FreeSlotCaller::Dequeue)
            {
                Some(slot)
            } else if dequeued >= state.max_dequeued_buffer_count {
                None
            } else {
                match caller {
                    FreeSlotCaller::Dequeue => match state.take_free_buffer() {
                        Some(slot) => Some(slot),
                        None if state.allow_allocation => state.take_free_slot(),
                        None => None,
                    },
                    FreeSlotCaller::Attach => {
                        state.take_free_slot().or_else(|| state.take_free_buffer())
                    }
                }
            };

            if let Some(slot) = found {
                return Ok((state, slot));
            }

            if (state.async_mode || state.dequeue_buffer_cannot_block)
                && acquired <= state.max_acquired_buffer_count
            {
                bq_debug!(state.consumer_name, "{}: would block", caller.name());
                return Err(QueueError::WouldBlock);
            }

            let (next, expired) = self.core.wait_for_dequeue_signal(state, deadline);
            state = next;
            if expired {
                bq_debug!(state.consumer_name, "{}: timed out", caller.name());
                return Err(QueueError::TimedOut);
            }
        }
    }

    /// ### English
    /// Takes a slot for rendering.
    ///
    /// #### Parameters
    /// - `width` / `height`: Requested size; both zero means the consumer default, exactly one zero is
    ///   `BadValue`.
    /// - `format`: `PixelFormat::UNKNOWN` means the consumer default.
    /// - `usage`: OR-ed with the consumer usage bits.
    ///
    /// #### Returns
    /// The slot, the release fence to wait on before writing, result flags and the buffer age.
    /// `BUFFER_NEEDS_REALLOCATION` means `request_buffer` must be called before drawing.
    ///
    /// ### 中文
    /// 取得一个用于渲染的槽位。
    ///
    /// #### 参数
    /// - `width` / `height`：请求的尺寸；两者都为 0 表示使用消费者默认值，仅一个为 0 则返回 `BadValue`。
    /// - `format`：`PixelFormat::UNKNOWN` 表示使用消费者默认值。
    /// - `usage`：会与消费者 usage 位按位或。
    ///
    /// #### 返回
    /// 槽位、写入前需等待的 release fence、结果标志与缓冲区年龄。
    /// 若含 `BUFFER_NEEDS_REALLOCATION`，绘制前必须调用 `request_buffer`。
    pub fn dequeue_buffer(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
        usage: BufferUsage,
    ) -> Result<DequeuedBuffer> {
        let state = self.core.lock();
        if state.is_abandoned {
            bq_error!(state.consumer_name, "dequeue_buffer: queue abandoned");
            return Err(QueueError::NoInit);
        }
        if state.connected_api.is_none() {
            bq_error!(state.consumer_name, "dequeue_buffer: producer not connected");
            return Err(QueueError::NoInit);
        }
        if (width == 0) != (height == 0) {
            bq_error!(state.consumer_name, "dequeue_buffer: invalid size {width}x{height}");
            return Err(QueueError::BadValue);
        }

        // one deadline for the whole call, however often the slot search restarts
        let deadline = dequeue_deadline(&state);
        let mut state = self.core.wait_while_allocating(state);
        let format = if format == PixelFormat::UNKNOWN {
            state.default_format
        } else {
            format
        };
        let usage = usage | state.consumer_usage_bits;
        let size = if width == 0 && height == 0 {
            state.default_size
        } else {
            PhysicalSize::new(width, height)
        };

        let slot = loop {
            let (next, slot) = self.wait_for_free_slot(state, FreeSlotCaller::Dequeue, deadline)?;
            state = next;
            let mismatch = state.slots[slot]
                .graphic_buffer
                .as_ref()
                .is_some_and(|buffer| buffer.needs_reallocation(size, format, usage));
            let is_shared = state.shared_buffer_mode && state.shared_buffer_slot == Some(slot);
            if mismatch && is_shared {
                bq_error!(state.consumer_name, "dequeue_buffer: cannot reallocate the shared buffer");
                return Err(QueueError::BadValue);
            }
            if mismatch && !state.allow_allocation {
                // drop the unusable buffer and look again
                state.free_slots.insert(slot);
                state.clear_buffer_slot(slot);
                continue;
            }
            break slot;
        };

        if state.shared_buffer_slot != Some(slot) {
            state.active_buffers.insert(slot);
        }
        if state.shared_buffer_mode && state.shared_buffer_slot.is_none() {
            state.latch_shared_slot(slot);
        }
        let is_shared = state.shared_buffer_mode && state.shared_buffer_slot == Some(slot);

        let mut flags = DequeueFlags::empty();
        let frame_counter = state.frame_counter;
        let entry = &mut state.slots[slot];
        let attached_by_consumer = entry.needs_reallocation;
        entry.needs_reallocation = false;
        entry.buffer_state.dequeue();

        let needs_allocation = entry
            .graphic_buffer
            .as_ref()
            .is_none_or(|buffer| buffer.needs_reallocation(size, format, usage));
        let fence = if is_shared {
            Fence::NO_FENCE
        } else {
            entry.release_fence.clone()
        };
        entry.release_fence = Fence::NO_FENCE;

        let buffer_age = if needs_allocation {
            entry.acquire_called = false;
            entry.graphic_buffer = None;
            entry.request_buffer_called = false;
            entry.frame_number = 0;
            flags |= DequeueFlags::BUFFER_NEEDS_REALLOCATION;
            0
        } else {
            (frame_counter + 1).saturating_sub(entry.frame_number)
        };
        state.buffer_age = buffer_age;

        if needs_allocation {
            state.is_allocating = true;
            let name = state.consumer_name.clone();
            drop(state);

            let allocated = self
                .core
                .allocator
                .create_graphic_buffer(size, format, usage, &name);

            state = self.core.lock();
            self.core.finish_allocating(&mut state);
            let buffer = match allocated {
                Ok(buffer) if !state.is_abandoned => buffer,
                Ok(_) => {
                    bq_error!(state.consumer_name, "dequeue_buffer: queue abandoned while allocating");
                    self.abort_dequeue(&mut state, slot);
                    return Err(QueueError::NoInit);
                }
                Err(err) => {
                    bq_error!(state.consumer_name, "dequeue_buffer: allocation failed: {err}");
                    self.abort_dequeue(&mut state, slot);
                    return Err(err);
                }
            };
            buffer.set_generation_number(state.generation_number);
            state.slots[slot].graphic_buffer = Some(buffer);
        }

        if attached_by_consumer {
            flags |= DequeueFlags::BUFFER_NEEDS_REALLOCATION;
            state.buffer_age = 0;
        }
        if state.buffers_released_behind_producer {
            flags |= DequeueFlags::RELEASE_ALL_BUFFERS;
            state.buffers_released_behind_producer = false;
        }

        let buffer_age = state.buffer_age;
        bq_trace!(
            state.consumer_name,
            "dequeue_buffer: slot={slot} flags={:#x} age={buffer_age}",
            flags.bits()
        );
        self.core.validate(&state);
        Ok(DequeuedBuffer {
            slot,
            fence,
            flags,
            buffer_age,
        })
    }

    fn abort_dequeue(&self, state: &mut CoreState, slot: usize) {
        state.active_buffers.remove(&slot);
        state.free_slots.insert(slot);
        state.clear_buffer_slot(slot);
        self.core.validate(state);
        self.core.signal_dequeue_condition();
    }

    /// ### English
    /// Hands the buffer of a dequeued slot to the producer. Required after
    /// `BUFFER_NEEDS_REALLOCATION` and before `queue_buffer`.
    ///
    /// ### 中文
    /// 将 dequeued 槽位的缓冲区交给生产者。在 `BUFFER_NEEDS_REALLOCATION` 之后、`queue_buffer` 之前必须调用。
    pub fn request_buffer(&self, slot: usize) -> Result<Arc<GraphicBuffer>> {
        let mut state = self.core.lock();
        if state.is_abandoned {
            bq_error!(state.consumer_name, "request_buffer: queue abandoned");
            return Err(QueueError::NoInit);
        }
        if state.connected_api.is_none() {
            bq_error!(state.consumer_name, "request_buffer: producer not connected");
            return Err(QueueError::NoInit);
        }
        if slot >= NUM_BUFFER_SLOTS {
            bq_error!(state.consumer_name, "request_buffer: slot {slot} out of range");
            return Err(QueueError::BadValue);
        }
        let entry = &mut state.slots[slot];
        if !entry.buffer_state.is_dequeued() {
            let label = entry.buffer_state.label();
            bq_error!(
                state.consumer_name,
                "request_buffer: slot {slot} is not owned by the producer (state = {label})"
            );
            return Err(QueueError::BadValue);
        }
        let Some(buffer) = entry.graphic_buffer.clone() else {
            bq_error!(state.consumer_name, "request_buffer: slot {slot} has no buffer");
            return Err(QueueError::BadValue);
        };
        entry.request_buffer_called = true;
        Ok(buffer)
    }
}
