use super::BufferQueueConsumer;
use crate::error::{QueueError, Result};
use crate::macros::{bq_debug, bq_error};
use crate::queue::{MAX_MAX_ACQUIRED_BUFFERS, NUM_BUFFER_SLOTS};

impl BufferQueueConsumer {
    /// ### English
    /// Sets how many buffers the consumer may hold acquired at once (`1..=MAX_MAX_ACQUIRED_BUFFERS`).
    ///
    /// ### 中文
    /// 设置消费者可同时持有的 acquired 缓冲区数量（`1..=MAX_MAX_ACQUIRED_BUFFERS`）。
    pub fn set_max_acquired_buffer_count(&self, max_acquired: usize) -> Result<()> {
        let listener = {
            let state = self.core.lock();
            let mut state = self.core.wait_while_allocating(state);
            if state.is_abandoned {
                bq_error!(state.consumer_name, "set_max_acquired_buffer_count: queue abandoned");
                return Err(QueueError::NoInit);
            }
            if !(1..=MAX_MAX_ACQUIRED_BUFFERS).contains(&max_acquired) {
                bq_error!(state.consumer_name, "set_max_acquired_buffer_count: invalid count {max_acquired}");
                return Err(QueueError::BadValue);
            }
            if max_acquired == state.max_acquired_buffer_count {
                return Ok(());
            }

            let acquired = state.acquired_count();
            if acquired > max_acquired {
                bq_error!(
                    state.consumer_name,
                    "set_max_acquired_buffer_count: {acquired} buffers are acquired, requested max {max_acquired}"
                );
                return Err(QueueError::BadValue);
            }

            let extra = state.async_mode || state.dequeue_buffer_cannot_block;
            let needed = max_acquired + state.max_dequeued_buffer_count + usize::from(extra);
            if needed > state.max_buffer_count {
                bq_error!(
                    state.consumer_name,
                    "set_max_acquired_buffer_count: {needed} buffers needed, max buffer count is {}",
                    state.max_buffer_count
                );
                return Err(QueueError::BadValue);
            }

            let delta = state.budget_delta(
                max_acquired,
                state.max_dequeued_buffer_count,
                extra,
                state.max_buffer_count,
            );
            if !state.adjust_available_slots(delta) {
                bq_error!(state.consumer_name, "set_max_acquired_buffer_count: could not adjust the slot budget");
                return Err(QueueError::BadValue);
            }
            state.max_acquired_buffer_count = max_acquired;
            self.core.validate(&state);
            self.core.signal_dequeue_condition();
            bq_debug!(state.consumer_name, "set_max_acquired_buffer_count: {max_acquired}");
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
    /// Caps the total number of slots the queue may use. Only allowed while no producer is connected.
    ///
    /// ### 中文
    /// 限制队列可使用的槽位总数。仅在没有生产者连接时允许。
    pub fn set_max_buffer_count(&self, max_buffer_count: usize) -> Result<()> {
        let state = self.core.lock();
        let mut state = self.core.wait_while_allocating(state);
        if state.is_abandoned {
            bq_error!(state.consumer_name, "set_max_buffer_count: queue abandoned");
            return Err(QueueError::NoInit);
        }
        if !(1..=NUM_BUFFER_SLOTS).contains(&max_buffer_count) {
            bq_error!(state.consumer_name, "set_max_buffer_count: invalid count {max_buffer_count}");
            return Err(QueueError::BadValue);
        }
        if state.connected_api.is_some() {
            bq_error!(state.consumer_name, "set_max_buffer_count: producer is already connected");
            return Err(QueueError::InvalidOperation);
        }
        if max_buffer_count < state.max_acquired_buffer_count {
            bq_error!(
                state.consumer_name,
                "set_max_buffer_count: {max_buffer_count} is below max acquired {}",
                state.max_acquired_buffer_count
            );
            return Err(QueueError::BadValue);
        }

        let delta = state.budget_delta(
            state.max_acquired_buffer_count,
            state.max_dequeued_buffer_count,
            state.async_mode || state.dequeue_buffer_cannot_block,
            max_buffer_count,
        );
        if !state.adjust_available_slots(delta) {
            bq_error!(state.consumer_name, "set_max_buffer_count: could not adjust the slot budget");
            return Err(QueueError::BadValue);
        }
        state.max_buffer_count = max_buffer_count;
        self.core.validate(&state);
        Ok(())
    }
}
