//! ### English
//! Ticket gate that runs listener callbacks in the order their tickets were minted.
//!
//! Tickets are minted under the core lock; callbacks run under this gate's own lock with the core
//! lock released (lock order: core, then callback).
//!
//! ### 中文
//! 按票号铸造顺序执行监听器回调的票号闸门。
//!
//! 票号在核心锁内铸造；回调在本闸门自己的锁内执行，此时核心锁已释放（加锁顺序：core 先于 callback）。

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

pub(crate) struct CallbackTickets {
    current: Mutex<u64>,
    condition: Condvar,
}

impl CallbackTickets {
    pub(crate) fn new() -> Self {
        Self {
            current: Mutex::new(0),
            condition: Condvar::new(),
        }
    }

    /// ### English
    /// Waits for `ticket`'s turn, runs `callback`, then admits the next ticket.
    ///
    /// ### 中文
    /// 等待轮到 `ticket`，执行 `callback`，然后放行下一个票号。
    pub(crate) fn run_in_order<F: FnOnce()>(&self, ticket: u64, callback: F) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        while *current != ticket {
            current = self
                .condition
                .wait(current)
                .unwrap_or_else(PoisonError::into_inner);
        }
        let _turn = Turn {
            current,
            condition: &self.condition,
        };
        callback();
    }
}

/// Admits the next ticket when dropped, including while unwinding out of a panicking callback.
struct Turn<'a> {
    current: MutexGuard<'a, u64>,
    condition: &'a Condvar,
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        *self.current += 1;
        self.condition.notify_all();
    }
}
