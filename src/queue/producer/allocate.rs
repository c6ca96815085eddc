use dpi::PhysicalSize;

use super::BufferQueueProducer;
use crate::buffer::PixelFormat;
use crate::flags::BufferUsage;
use crate::macros::{bq_debug, bq_error, bq_trace};
use crate::queue::shared_state::CoreState;

impl BufferQueueProducer {
    /// ### English
    /// Fills every empty slot ahead of time so later dequeues do not allocate.
    ///
    /// Zero sizes and `PixelFormat::UNKNOWN` fall back to the consumer defaults. Allocation runs with
    /// the lock released; the buffers are dropped if the default geometry changed meanwhile, if shared
    /// mode latched a slot or if the queue was abandoned.
    ///
    /// ### 中文
    /// 预先填充所有空槽位，使之后的 dequeue 无需分配。
    ///
    /// 尺寸为 0 与 `PixelFormat::UNKNOWN` 时回退到消费者默认值。分配在释放锁后进行；若期间默认几何发生变化、
    /// 共享模式锁定了槽位或队列被放弃，则丢弃这些缓冲区。
    pub fn allocate_buffers(&self, width: u32, height: u32, format: PixelFormat, usage: BufferUsage) {
        let (count, request, name) = {
            let state = self.core.lock();
            let mut state = self.core.wait_while_allocating(state);
            if state.is_abandoned {
                return;
            }
            if !state.allow_allocation {
                bq_error!(state.consumer_name, "allocate_buffers: allocation is not allowed");
                return;
            }
            if state.shared_buffer_slot.is_some() {
                bq_debug!(state.consumer_name, "allocate_buffers: shared buffer is latched");
                return;
            }
            let count = state.free_slots.len();
            if count == 0 {
                return;
            }
            let request = Self::allocation_request(&state, width, height, format, usage);
            state.is_allocating = true;
            (count, request, state.consumer_name.clone())
        };

        let (size, alloc_format, alloc_usage) = request;
        let mut buffers = Vec::with_capacity(count);
        for _ in 0..count {
            match self
                .core
                .allocator
                .create_graphic_buffer(size, alloc_format, alloc_usage, &name)
            {
                Ok(buffer) => buffers.push(buffer),
                Err(err) => {
                    bq_error!(
                        name,
                        "allocate_buffers: failed to allocate buffer ({}x{}, format {:?}, usage {:#x}): {err}",
                        size.width,
                        size.height,
                        alloc_format,
                        alloc_usage.bits()
                    );
                    break;
                }
            }
        }

        let mut state = self.core.lock();
        self.core.finish_allocating(&mut state);
        if state.is_abandoned || state.shared_buffer_slot.is_some() {
            bq_debug!(state.consumer_name, "allocate_buffers: dropping {} buffers", buffers.len());
            return;
        }
        if Self::allocation_request(&state, width, height, format, usage) != request {
            bq_debug!(
                state.consumer_name,
                "allocate_buffers: size/format/usage changed while allocating, dropping buffers"
            );
            return;
        }

        for buffer in buffers {
            let Some(slot) = state.take_free_slot() else {
                bq_trace!(state.consumer_name, "allocate_buffers: no free slots, dropping buffer");
                continue;
            };
            state.clear_buffer_slot(slot);
            buffer.set_generation_number(state.generation_number);
            state.slots[slot].graphic_buffer = Some(buffer);
            state.free_buffers.push_front(slot);
            bq_trace!(state.consumer_name, "allocate_buffers: allocated slot {slot}");
        }
        self.core.validate(&state);
        self.core.signal_dequeue_condition();
    }

    fn allocation_request(
        state: &CoreState,
        width: u32,
        height: u32,
        format: PixelFormat,
        usage: BufferUsage,
    ) -> (PhysicalSize<u32>, PixelFormat, BufferUsage) {
        let size = if width == 0 || height == 0 {
            state.default_size
        } else {
            PhysicalSize::new(width, height)
        };
        let format = if format == PixelFormat::UNKNOWN {
            state.default_format
        } else {
            format
        };
        (size, format, usage | state.consumer_usage_bits)
    }
}
