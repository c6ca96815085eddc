//! ### English
//! Producer handle: the drawing client's side of the queue.
//!
//! Operations are split by concern, one file per group (`connect`, `dequeue`, `queue`, `attach`,
//! `allocate`, `query`); this file keeps the handle and the plain setters.
//!
//! ### 中文
//! 生产者句柄：队列中绘制客户端一侧。
//!
//! 操作按关注点拆分，每组一个文件（`connect`、`dequeue`、`queue`、`attach`、`allocate`、`query`）；
//! 本文件只保留句柄本身与简单的 setter。
mod allocate;
mod attach;
mod connect;
mod dequeue;
mod query;
mod queue;

use std::sync::Arc;
use std::time::Duration;

pub use query::{LastQueuedBuffer, NativeWindowQuery};

use crate::error::{QueueError, Result};
use crate::macros::{bq_debug, bq_error};
use crate::queue::item::QueueBufferOutput;
use crate::queue::shared_state::{BufferQueueCore, CoreState};
use crate::queue::{NUM_BUFFER_SLOTS, SidebandStream};

/// ### English
/// Cheap clonable handle used by the drawing client. Every clone talks to the same core.
///
/// ### 中文
/// 供绘制客户端使用的可廉价克隆句柄。所有克隆都指向同一个核心。
#[derive(Clone)]
pub struct BufferQueueProducer {
    core: Arc<BufferQueueCore>,
}

fn queue_output(state: &CoreState) -> QueueBufferOutput {
    QueueBufferOutput {
        width: state.default_size.width,
        height: state.default_size.height,
        transform_hint: state.transform_hint,
        num_pending_buffers: u32::try_from(state.queue.len()).unwrap_or(u32::MAX),
        next_frame_number: state.frame_counter + 1,
    }
}

impl BufferQueueProducer {
    pub(crate) fn from_core(core: Arc<BufferQueueCore>) -> Self {
        Self { core }
    }

    /// ### English
    /// Sets how many buffers the producer may hold dequeued at once.
    ///
    /// Fails with `BadValue` when more buffers are currently dequeued, when shared mode has latched a
    /// slot, or when the resulting buffer count would not fit.
    ///
    /// ### 中文
    /// 设置生产者可同时持有的 dequeued 缓冲区数量。
    ///
    /// 当前 dequeued 数量更多、共享模式已锁定槽位，或结果缓冲区数量无法容纳时，返回 `BadValue`。
    pub fn set_max_dequeued_buffer_count(&self, max_dequeued: usize) -> Result<()> {
        let listener = {
            let state = self.core.lock();
            let mut state = self.core.wait_while_allocating(state);
            if state.is_abandoned {
                bq_error!(state.consumer_name, "set_max_dequeued_buffer_count: queue abandoned");
                return Err(QueueError::NoInit);
            }
            if max_dequeued == state.max_dequeued_buffer_count {
                return Ok(());
            }

            let dequeued = state.dequeued_count();
            if dequeued > max_dequeued {
                bq_error!(
                    state.consumer_name,
                    "set_max_dequeued_buffer_count: {dequeued} buffers are dequeued, requested max {max_dequeued}"
                );
                return Err(QueueError::BadValue);
            }

            let buffer_count = state.min_undequeued_buffer_count() + max_dequeued;
            if max_dequeued == 0 || buffer_count > NUM_BUFFER_SLOTS {
                bq_error!(
                    state.consumer_name,
                    "set_max_dequeued_buffer_count: buffer count {buffer_count} out of range"
                );
                return Err(QueueError::BadValue);
            }
            if let Some(slot) = state.shared_buffer_slot {
                bq_error!(
                    state.consumer_name,
                    "set_max_dequeued_buffer_count: shared slot {slot} is latched"
                );
                return Err(QueueError::BadValue);
            }
            if buffer_count < state.min_max_buffer_count() || buffer_count > state.max_buffer_count {
                bq_error!(
                    state.consumer_name,
                    "set_max_dequeued_buffer_count: buffer count {buffer_count} outside [{}, {}]",
                    state.min_max_buffer_count(),
                    state.max_buffer_count
                );
                return Err(QueueError::BadValue);
            }

            let delta = state.budget_delta(
                state.max_acquired_buffer_count,
                max_dequeued,
                state.async_mode || state.dequeue_buffer_cannot_block,
                state.max_buffer_count,
            );
            if !state.adjust_available_slots(delta) {
                return Err(QueueError::BadValue);
            }
            state.max_dequeued_buffer_count = max_dequeued;
            self.core.validate(&state);
            self.core.signal_dequeue_condition();
            bq_debug!(state.consumer_name, "set_max_dequeued_buffer_count: {max_dequeued}");

            if delta < 0 {
                state.consumer_listener.clone()
            } else {
                None
            }
        };
        if let Some(listener) = listener {
            listener.on_buffers_released();
        }
        Ok(())
    }

    /// ### English
    /// Async mode: dequeue never blocks and every queued frame is droppable. Needs one extra slot.
    ///
    /// ### 中文
    /// 异步模式：dequeue 永不阻塞，且每个入队帧都可被丢弃。需要额外一个槽位。
    pub fn set_async_mode(&self, async_mode: bool) -> Result<()> {
        let state = self.core.lock();
        let mut state = self.core.wait_while_allocating(state);
        if state.is_abandoned {
            bq_error!(state.consumer_name, "set_async_mode: queue abandoned");
            return Err(QueueError::NoInit);
        }
        if async_mode == state.async_mode {
            return Ok(());
        }
        let extra = async_mode || state.dequeue_buffer_cannot_block;
        let needed = state.max_acquired_buffer_count
            + state.max_dequeued_buffer_count
            + usize::from(extra);
        if needed > state.max_buffer_count {
            bq_error!(
                state.consumer_name,
                "set_async_mode: {needed} buffers needed, max buffer count is {}",
                state.max_buffer_count
            );
            return Err(QueueError::BadValue);
        }
        let delta = state.budget_delta(
            state.max_acquired_buffer_count,
            state.max_dequeued_buffer_count,
            extra,
            state.max_buffer_count,
        );
        if !state.adjust_available_slots(delta) {
            bq_error!(state.consumer_name, "set_async_mode: could not adjust the slot budget");
            return Err(QueueError::BadValue);
        }
        state.async_mode = async_mode;
        self.core.validate(&state);
        self.core.signal_dequeue_condition();
        Ok(())
    }

    /// ### English
    /// Bounds how long a blocking dequeue may wait. `Some` also turns off the non-blocking policy
    /// picked at connect; `None` waits without a deadline.
    ///
    /// ### 中文
    /// 限制阻塞 dequeue 的最长等待时间。`Some` 同时关闭 connect 时选择的非阻塞策略；`None` 表示无截止时间。
    pub fn set_dequeue_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        let mut state = self.core.lock();
        if state.is_abandoned {
            return Err(QueueError::NoInit);
        }
        let delta = state.budget_delta(
            state.max_acquired_buffer_count,
            state.max_dequeued_buffer_count,
            state.async_mode,
            state.max_buffer_count,
        );
        if !state.adjust_available_slots(delta) {
            bq_error!(state.consumer_name, "set_dequeue_timeout: could not adjust the slot budget");
            return Err(QueueError::BadValue);
        }
        state.producer.dequeue_timeout = timeout;
        state.dequeue_buffer_cannot_block = false;
        self.core.validate(&state);
        Ok(())
    }

    /// ### English
    /// When off, dequeue only hands out buffers that already fit and never calls the allocator.
    ///
    /// ### 中文
    /// 关闭时，dequeue 只交出已匹配的缓冲区，从不调用分配器。
    pub fn allow_allocation(&self, allow: bool) {
        let mut state = self.core.lock();
        state.allow_allocation = allow;
    }

    pub fn set_generation_number(&self, generation: u32) {
        let mut state = self.core.lock();
        state.generation_number = generation;
    }

    pub fn consumer_name(&self) -> String {
        self.core.lock().consumer_name.clone()
    }

    /// ### English
    /// Enables or leaves shared-buffer mode.
    ///
    /// Leaving the mode does not free the latched slot: it loses its shared flag once it is free,
    /// right away if it already is. Enabling again re-latches a slot that still carries the flag.
    ///
    /// ### 中文
    /// 开启或退出共享缓冲模式。
    ///
    /// 退出时不会释放已锁定的槽位：该槽位在空闲时失去共享标记（若已空闲则立即失去）。
    /// 再次开启时会重新锁定仍带有共享标记的槽位。
    pub fn set_shared_buffer_mode(&self, shared: bool) -> Result<()> {
        let mut state = self.core.lock();
        if state.is_abandoned {
            return Err(QueueError::NoInit);
        }
        state.shared_buffer_mode = shared;
        if shared {
            let flagged = (0..NUM_BUFFER_SLOTS).find(|&slot| state.slots[slot].buffer_state.is_shared());
            if let Some(slot) = flagged {
                state.shared_buffer_slot = Some(slot);
            }
        } else if let Some(slot) = state.shared_buffer_slot.take() {
            state.return_slot_to_free_list(slot);
        }
        bq_debug!(state.consumer_name, "set_shared_buffer_mode: {shared}");
        self.core.validate(&state);
        self.core.signal_dequeue_condition();
        Ok(())
    }

    pub fn set_auto_refresh(&self, auto_refresh: bool) -> Result<()> {
        let mut state = self.core.lock();
        if state.is_abandoned {
            return Err(QueueError::NoInit);
        }
        state.auto_refresh = auto_refresh;
        Ok(())
    }

    /// ### English
    /// Replaces the sideband stream and tells the consumer.
    ///
    /// ### 中文
    /// 替换 sideband 流并通知消费者。
    pub fn set_sideband_stream(&self, stream: Option<SidebandStream>) -> Result<()> {
        let listener = {
            let mut state = self.core.lock();
            if state.is_abandoned {
                bq_error!(state.consumer_name, "set_sideband_stream: queue abandoned");
                return Err(QueueError::NoInit);
            }
            state.sideband_stream = stream;
            state.consumer_listener.clone()
        };
        if let Some(listener) = listener {
            listener.on_sideband_stream_changed();
        }
        Ok(())
    }
}
