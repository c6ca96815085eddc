//! ### English
//! Core state shared by the producer and consumer handles.
//!
//! Everything lives in [`CoreState`] behind one mutex. Two condition variables hang off it: the
//! dequeue condition (a slot may have become available) and the allocating condition (an unlocked
//! allocation finished).
//!
//! ### 中文
//! 生产者与消费者句柄共享的核心状态。
//!
//! 所有字段都位于单个互斥锁保护的 [`CoreState`] 中。其上挂有两个条件变量：dequeue 条件（可能有槽位可用）
//! 与 allocating 条件（锁外分配已完成）。
mod dump;
mod slots;
mod state;
mod validate;

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

pub(crate) use state::{CoreState, SharedBufferCache};

use crate::buffer::GraphicBufferAlloc;
use crate::config::BufferQueueConfig;
use crate::macros::bq_error;

use super::callback::CallbackTickets;

pub(crate) struct BufferQueueCore {
    pub(crate) allocator: Arc<dyn GraphicBufferAlloc>,
    state: Mutex<CoreState>,
    dequeue_condition: Condvar,
    allocating_condition: Condvar,
    /// ### English
    /// Ordering gate for listener callbacks (separate lock, taken after `state`).
    ///
    /// ### 中文
    /// 监听器回调的顺序闸门（独立的锁，在 `state` 之后获取）。
    pub(crate) callbacks: CallbackTickets,
    validate_consistency: bool,
}

impl BufferQueueCore {
    pub(crate) fn new(allocator: Arc<dyn GraphicBufferAlloc>, config: BufferQueueConfig) -> Arc<Self> {
        let validate_consistency = config.validate_consistency;
        let explicit_name = config.consumer_name.clone();
        let core = Arc::new(Self {
            allocator,
            state: Mutex::new(CoreState::new(&config)),
            dequeue_condition: Condvar::new(),
            allocating_condition: Condvar::new(),
            callbacks: CallbackTickets::new(),
            validate_consistency,
        });
        if explicit_name.is_none() {
            let name = format!("unnamed-{}-{:p}", std::process::id(), Arc::as_ptr(&core));
            core.lock().consumer_name = name;
        }
        core
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, CoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// ### English
    /// Blocks until no unlocked allocation is in flight.
    ///
    /// ### 中文
    /// 阻塞直到没有进行中的锁外分配。
    pub(crate) fn wait_while_allocating<'a>(
        &self,
        mut state: MutexGuard<'a, CoreState>,
    ) -> MutexGuard<'a, CoreState> {
        while state.is_allocating {
            state = self
                .allocating_condition
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state
    }

    pub(crate) fn finish_allocating(&self, state: &mut CoreState) {
        state.is_allocating = false;
        self.allocating_condition.notify_all();
    }

    /// ### English
    /// Waits on the dequeue condition, until `deadline` if given.
    /// Returns the relocked state and whether the deadline passed.
    ///
    /// ### 中文
    /// 在 dequeue 条件上等待（若给定 `deadline` 则最多等到该时刻）。
    /// 返回重新加锁后的状态以及是否已超过截止时间。
    pub(crate) fn wait_for_dequeue_signal<'a>(
        &self,
        state: MutexGuard<'a, CoreState>,
        deadline: Option<Instant>,
    ) -> (MutexGuard<'a, CoreState>, bool) {
        match deadline {
            None => (
                self.dequeue_condition
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
                false,
            ),
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return (state, true);
                }
                let (state, _) = self
                    .dequeue_condition
                    .wait_timeout(state, remaining)
                    .unwrap_or_else(PoisonError::into_inner);
                let expired = Instant::now() >= deadline;
                (state, expired)
            }
        }
    }

    pub(crate) fn signal_dequeue_condition(&self) {
        self.dequeue_condition.notify_all();
    }

    /// ### English
    /// Checks every slot invariant when enabled. Violations panic in debug builds and are logged in
    /// release builds.
    ///
    /// ### 中文
    /// 启用时检查所有槽位不变量。debug 构建下违规会 panic，release 构建下仅记录日志。
    pub(crate) fn validate(&self, state: &CoreState) {
        if !self.validate_consistency {
            return;
        }
        let violations = state.consistency_violations();
        if violations.is_empty() {
            return;
        }
        for violation in &violations {
            bq_error!(state.consumer_name, "validate_consistency: {violation}");
        }
        if cfg!(debug_assertions) {
            panic!(
                "[{}] buffer queue invariants violated: {}",
                state.consumer_name,
                violations.join("; ")
            );
        }
    }
}
