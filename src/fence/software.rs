use std::fmt;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::{Fence, FenceSource, SignalTime};
use crate::clock::{self, Nsecs};
use crate::error::{QueueError, Result};

/// ### English
/// In-process fence signalled explicitly by whoever finished the work.
///
/// ### 中文
/// 由完成工作的一方显式 signal 的进程内 fence。
pub struct SoftwareFence {
    name: String,
    signaled_at: Mutex<Option<Nsecs>>,
    condition: Condvar,
}

impl SoftwareFence {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            signaled_at: Mutex::new(None),
            condition: Condvar::new(),
        })
    }

    pub fn signal(&self) {
        self.signal_at(clock::now());
    }

    /// ### English
    /// Signals with an explicit timestamp. Later calls are ignored.
    ///
    /// ### 中文
    /// 以显式时间戳 signal。之后的调用会被忽略。
    pub fn signal_at(&self, time: Nsecs) {
        let mut signaled_at = self
            .signaled_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if signaled_at.is_none() {
            *signaled_at = Some(time);
            self.condition.notify_all();
        }
    }

    pub fn fence(self: &Arc<Self>) -> Fence {
        Fence::new(self.clone())
    }
}

impl FenceSource for SoftwareFence {
    fn signal_time(&self) -> SignalTime {
        match *self
            .signaled_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
        {
            Some(time) => SignalTime::Signaled(time),
            None => SignalTime::Pending,
        }
    }

    fn wait(&self, timeout: Option<Duration>) -> Result<()> {
        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        let mut signaled_at = self
            .signaled_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while signaled_at.is_none() {
            signaled_at = match deadline {
                None => self
                    .condition
                    .wait(signaled_at)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(QueueError::TimedOut);
                    }
                    self.condition
                        .wait_timeout(signaled_at, remaining)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for SoftwareFence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftwareFence")
            .field("name", &self.name)
            .field("signal_time", &self.signal_time())
            .finish()
    }
}
