//! ### English
//! Consumer handle: the compositor / sampler side of the queue.
//!
//! ### 中文
//! 消费者句柄：队列中合成器 / 采样器一侧。
mod acquire;
mod attach;
mod limits;
mod release;

use std::sync::Arc;

use dpi::PhysicalSize;

use crate::buffer::PixelFormat;
use crate::error::{QueueError, Result};
use crate::flags::BufferUsage;
use crate::listener::ConsumerListener;
use crate::macros::{bq_debug, bq_error};
use crate::queue::item::DataSpace;
use crate::queue::occupancy::OccupancySegment;
use crate::queue::shared_state::BufferQueueCore;
use crate::queue::slot::SlotState;
use crate::queue::{NUM_BUFFER_SLOTS, SidebandStream};

/// ### English
/// Cheap clonable handle used by the compositor or sampler.
///
/// ### 中文
/// 供合成器或采样器使用的可廉价克隆句柄。
#[derive(Clone)]
pub struct BufferQueueConsumer {
    core: Arc<BufferQueueCore>,
}

/// ### English
/// Point-in-time copy of the slot sets, for diagnostics and tests.
///
/// ### 中文
/// 槽位集合的时间点拷贝，用于诊断与测试。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub slot_states: Vec<SlotState>,
    pub free_slots: Vec<usize>,
    /// ### English
    /// Oldest first.
    ///
    /// ### 中文
    /// 最早者在前。
    pub free_buffers: Vec<usize>,
    pub active_buffers: Vec<usize>,
    /// ### English
    /// Slot of every pending item, head first (`None` for stale items).
    ///
    /// ### 中文
    /// 每个待处理项的槽位，队头在前（过期项为 `None`）。
    pub pending: Vec<Option<usize>>,
    pub shared_slot: Option<usize>,
    pub frame_counter: u64,
    pub generation_number: u32,
    pub violations: Vec<String>,
}

impl BufferQueueConsumer {
    pub(crate) fn from_core(core: Arc<BufferQueueCore>) -> Self {
        Self { core }
    }

    /// ### English
    /// Installs the consumer listener. A producer can only connect after this.
    ///
    /// ### 中文
    /// 安装消费者监听器。生产者只能在此之后连接。
    pub fn consumer_connect(
        &self,
        listener: Arc<dyn ConsumerListener>,
        controlled_by_app: bool,
    ) -> Result<()> {
        let mut state = self.core.lock();
        if state.is_abandoned {
            bq_error!(state.consumer_name, "consumer_connect: queue abandoned");
            return Err(QueueError::NoInit);
        }
        state.consumer_listener = Some(listener);
        state.consumer_controlled_by_app = controlled_by_app;
        bq_debug!(state.consumer_name, "consumer_connect: controlled_by_app={controlled_by_app}");
        Ok(())
    }

    /// ### English
    /// Disconnects the consumer, abandoning the queue. `BadValue` when no listener is installed,
    /// `NoInit` once the queue is already abandoned.
    ///
    /// ### 中文
    /// 断开消费者并放弃队列。若未安装监听器，返回 `BadValue`；队列已被放弃时返回 `NoInit`。
    pub fn consumer_disconnect(&self) -> Result<()> {
        {
            let state = self.core.lock();
            if state.is_abandoned {
                bq_error!(state.consumer_name, "consumer_disconnect: queue abandoned");
                return Err(QueueError::NoInit);
            }
            if state.consumer_listener.is_none() {
                bq_error!(state.consumer_name, "consumer_disconnect: no consumer is connected");
                return Err(QueueError::BadValue);
            }
        }
        self.abandon();
        Ok(())
    }

    /// ### English
    /// Moves the queue to its terminal state: every buffer is freed, pending items are dropped,
    /// waiters wake up and every later operation fails with `NoInit`.
    ///
    /// ### 中文
    /// 使队列进入终止状态：释放所有缓冲区、丢弃待处理项、唤醒等待者，之后所有操作都以 `NoInit` 失败。
    pub fn abandon(&self) {
        let mut state = self.core.lock();
        if state.is_abandoned {
            return;
        }
        state.is_abandoned = true;
        state.consumer_listener = None;
        state.free_all_buffers();
        state.queue.clear();
        state.death_watch = None;
        self.core.signal_dequeue_condition();
        self.core.validate(&state);
        bq_debug!(state.consumer_name, "abandon");
    }

    pub fn is_abandoned(&self) -> bool {
        self.core.lock().is_abandoned
    }

    pub fn set_default_buffer_size(&self, width: u32, height: u32) -> Result<()> {
        let mut state = self.core.lock();
        if state.is_abandoned {
            return Err(QueueError::NoInit);
        }
        if width == 0 || height == 0 {
            bq_error!(state.consumer_name, "set_default_buffer_size: invalid size {width}x{height}");
            return Err(QueueError::BadValue);
        }
        state.default_size = PhysicalSize::new(width, height);
        Ok(())
    }

    pub fn set_default_buffer_format(&self, format: PixelFormat) -> Result<()> {
        let mut state = self.core.lock();
        if state.is_abandoned {
            return Err(QueueError::NoInit);
        }
        state.default_format = format;
        Ok(())
    }

    pub fn set_default_buffer_data_space(&self, data_space: DataSpace) -> Result<()> {
        let mut state = self.core.lock();
        if state.is_abandoned {
            return Err(QueueError::NoInit);
        }
        state.default_data_space = data_space;
        Ok(())
    }

    pub fn set_consumer_usage_bits(&self, usage: BufferUsage) -> Result<()> {
        let mut state = self.core.lock();
        if state.is_abandoned {
            return Err(QueueError::NoInit);
        }
        state.consumer_usage_bits = usage;
        Ok(())
    }

    pub fn set_transform_hint(&self, hint: u32) -> Result<()> {
        let mut state = self.core.lock();
        if state.is_abandoned {
            return Err(QueueError::NoInit);
        }
        state.transform_hint = hint;
        Ok(())
    }

    pub fn set_generation_number(&self, generation: u32) {
        self.core.lock().generation_number = generation;
    }

    pub fn generation_number(&self) -> u32 {
        self.core.lock().generation_number
    }

    pub fn set_consumer_name(&self, name: impl Into<String>) {
        self.core.lock().consumer_name = name.into();
    }

    pub fn get_sideband_stream(&self) -> Option<SidebandStream> {
        self.core.lock().sideband_stream.clone()
    }

    /// ### English
    /// Drains recorded occupancy segments, newest first.
    ///
    /// ### 中文
    /// 取出已记录的占用段，最新的在前。
    pub fn get_occupancy_history(&self, force_flush: bool) -> Vec<OccupancySegment> {
        self.core.lock().occupancy.take_segment_history(force_flush)
    }

    pub fn dump(&self, prefix: &str) -> String {
        self.core.lock().dump(prefix)
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let state = self.core.lock();
        QueueSnapshot {
            slot_states: (0..NUM_BUFFER_SLOTS).map(|slot| state.slots[slot].state()).collect(),
            free_slots: state.free_slots.iter().copied().collect(),
            free_buffers: state.free_buffers.iter().copied().collect(),
            active_buffers: state.active_buffers.iter().copied().collect(),
            pending: state
                .queue
                .iter()
                .map(|item| item.slot.filter(|_| !item.is_stale))
                .collect(),
            shared_slot: state.shared_buffer_slot,
            frame_counter: state.frame_counter,
            generation_number: state.generation_number,
            violations: state.consistency_violations(),
        }
    }
}
