use std::sync::Arc;

use super::{BufferQueueProducer, queue_output};
use crate::error::{QueueError, Result};
use crate::listener::ProducerListener;
use crate::macros::{bq_debug, bq_error, bq_warn};
use crate::queue::ProducerApi;
use crate::queue::death;
use crate::queue::item::QueueBufferOutput;

impl BufferQueueProducer {
    /// ### English
    /// Connects a producer client.
    ///
    /// #### Parameters
    /// - `listener`: Optional release notifications; its `death_notice` (if any) is watched and
    ///   triggers an implicit `disconnect`.
    /// - `api`: Client kind; `ProducerApi::Gpu` enables the queue-time throttle.
    /// - `producer_controlled_by_app`: Together with an app-controlled consumer (and no dequeue
    ///   timeout) this makes dequeue non-blocking.
    ///
    /// ### 中文
    /// 连接一个生产者客户端。
    ///
    /// #### 参数
    /// - `listener`：可选的释放通知；若提供 `death_notice` 则会被监视，并触发隐式 `disconnect`。
    /// - `api`：客户端类型；`ProducerApi::Gpu` 会启用 queue 时的节流。
    /// - `producer_controlled_by_app`：与由应用控制的消费者一起（且未设置 dequeue 超时）时，dequeue 变为非阻塞。
    pub fn connect(
        &self,
        listener: Option<Arc<dyn ProducerListener>>,
        api: ProducerApi,
        producer_controlled_by_app: bool,
    ) -> Result<QueueBufferOutput> {
        let state = self.core.lock();
        let mut state = self.core.wait_while_allocating(state);
        if state.is_abandoned {
            bq_error!(state.consumer_name, "connect: queue abandoned");
            return Err(QueueError::NoInit);
        }
        if state.consumer_listener.is_none() {
            bq_error!(state.consumer_name, "connect: no consumer is connected");
            return Err(QueueError::NoInit);
        }
        if let Some(connected) = state.connected_api {
            bq_error!(
                state.consumer_name,
                "connect: already connected (cur={connected:?} req={api:?})"
            );
            return Err(QueueError::InvalidOperation);
        }

        let cannot_block = state.producer.dequeue_timeout.is_none()
            && state.consumer_controlled_by_app
            && producer_controlled_by_app;
        let delta = state.budget_delta(
            state.max_acquired_buffer_count,
            state.max_dequeued_buffer_count,
            state.async_mode || cannot_block,
            state.max_buffer_count,
        );
        if !state.adjust_available_slots(delta) {
            bq_error!(state.consumer_name, "connect: could not adjust the slot budget");
            return Err(QueueError::BadValue);
        }

        state.connection_id += 1;
        let connection_id = state.connection_id;
        state.death_watch = None;
        if let Some(notice) = listener.as_ref().and_then(|listener| listener.death_notice()) {
            match death::watch(Arc::downgrade(&self.core), notice, api, connection_id) {
                Ok(watch) => state.death_watch = Some(watch),
                Err(err) => {
                    bq_warn!(state.consumer_name, "connect: failed to watch producer death: {err}")
                }
            }
        }
        state.connected_producer_listener = listener;
        state.connected_api = Some(api);
        state.buffer_has_been_queued = false;
        state.dequeue_buffer_cannot_block = cannot_block;
        state.allow_allocation = true;
        self.core.validate(&state);

        bq_debug!(
            state.consumer_name,
            "connect: api={api:?} producer_controlled_by_app={producer_controlled_by_app} cannot_block={cannot_block}"
        );
        Ok(queue_output(&state))
    }

    /// ### English
    /// Disconnects `api`, freeing every buffer and clearing shared-mode latching.
    ///
    /// Succeeds on an abandoned queue. `NoInit` when nothing is connected, `BadValue` when another
    /// api is.
    ///
    /// ### 中文
    /// 断开 `api`，释放全部缓冲区并清除共享模式的锁定。
    ///
    /// 队列已被放弃时直接成功。未连接时返回 `NoInit`，连接的是其它 api 时返回 `BadValue`。
    pub fn disconnect(&self, api: ProducerApi) -> Result<()> {
        self.disconnect_connection(api, None)
    }

    /// ### English
    /// Implicit disconnect run by the death watcher; ignored once the connection was replaced.
    ///
    /// ### 中文
    /// 由死亡监视线程执行的隐式断开；若该连接已被替换则忽略。
    pub(crate) fn disconnect_dead_producer(&self, api: ProducerApi, connection_id: u64) {
        match self.disconnect_connection(api, Some(connection_id)) {
            Ok(()) => log::debug!("disconnect_dead_producer: producer {api:?} gone"),
            Err(err) => log::debug!("disconnect_dead_producer: {err}"),
        }
    }

    fn disconnect_connection(&self, api: ProducerApi, connection_id: Option<u64>) -> Result<()> {
        let listener = {
            let state = self.core.lock();
            let mut state = self.core.wait_while_allocating(state);
            if state.is_abandoned {
                // consumer already tore everything down
                return Ok(());
            }
            if connection_id.is_some_and(|id| id != state.connection_id) {
                return Ok(());
            }
            match state.connected_api {
                None => {
                    bq_error!(state.consumer_name, "disconnect: not connected (req={api:?})");
                    return Err(QueueError::NoInit);
                }
                Some(connected) if connected != api => {
                    bq_error!(
                        state.consumer_name,
                        "disconnect: still connected to another api (cur={connected:?} req={api:?})"
                    );
                    return Err(QueueError::BadValue);
                }
                Some(_) => {}
            }

            state.free_all_buffers();
            state.connected_producer_listener = None;
            state.connected_api = None;
            state.sideband_stream = None;
            state.shared_buffer_slot = None;
            state.death_watch = None;
            self.core.signal_dequeue_condition();
            self.core.validate(&state);
            bq_debug!(state.consumer_name, "disconnect: api={api:?}");
            state.consumer_listener.clone()
        };

        if let Some(listener) = listener {
            listener.on_buffers_released();
            listener.on_disconnect();
        }
        Ok(())
    }
}
