use std::time::{Duration, Instant};

use super::{Fence, FenceSource, SignalTime};
use crate::error::Result;

#[derive(Debug)]
pub(super) struct MergedFence {
    name: String,
    first: Fence,
    second: Fence,
}

impl MergedFence {
    pub(super) fn new(name: &str, first: Fence, second: Fence) -> Self {
        Self {
            name: name.to_string(),
            first,
            second,
        }
    }
}

impl FenceSource for MergedFence {
    fn signal_time(&self) -> SignalTime {
        match (self.first.signal_time(), self.second.signal_time()) {
            (SignalTime::Invalid, _) | (_, SignalTime::Invalid) => SignalTime::Invalid,
            (SignalTime::Pending, _) | (_, SignalTime::Pending) => SignalTime::Pending,
            (SignalTime::Signaled(a), SignalTime::Signaled(b)) => SignalTime::Signaled(a.max(b)),
        }
    }

    fn wait(&self, timeout: Option<Duration>) -> Result<()> {
        let Some((timeout, deadline)) =
            timeout.and_then(|timeout| Some((timeout, Instant::now().checked_add(timeout)?)))
        else {
            self.first.wait_unbounded()?;
            return self.second.wait_unbounded();
        };
        self.first.wait(timeout)?;
        self.second
            .wait(deadline.saturating_duration_since(Instant::now()))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
