//! ### English
//! GPU completion fences.
//!
//! A [`Fence`] is a cheap clonable handle; the underlying [`FenceSource`] decides when it signals.
//! `Fence::NO_FENCE` stands for "no pending work": it is always signalled and reports an invalid
//! signal time.
//!
//! ### 中文
//! GPU 完成 fence。
//!
//! [`Fence`] 是可廉价克隆的句柄；底层 [`FenceSource`] 决定何时 signal。
//! `Fence::NO_FENCE` 表示“没有待完成的工作”：始终视为已 signal，signal 时间无效。
mod merged;
mod software;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub use software::SoftwareFence;

use crate::clock::Nsecs;
use crate::error::{QueueError, Result};
use merged::MergedFence;

/// ### English
/// Result of polling a fence for its signal time.
///
/// ### 中文
/// 轮询 fence signal 时间的结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalTime {
    /// ### English
    /// No fence, or the fence is in an error state.
    ///
    /// ### 中文
    /// 没有 fence，或 fence 处于错误状态。
    Invalid,
    /// ### English
    /// Not signalled yet.
    ///
    /// ### 中文
    /// 尚未 signal。
    Pending,
    /// ### English
    /// Signalled at the given monotonic time.
    ///
    /// ### 中文
    /// 已在给定单调时间 signal。
    Signaled(Nsecs),
}

/// ### English
/// Backend of a fence (sync file, timeline point, software event...).
///
/// ### 中文
/// fence 的后端实现（sync 文件、timeline 点、软件事件等）。
pub trait FenceSource: Send + Sync + fmt::Debug {
    fn signal_time(&self) -> SignalTime;

    /// ### English
    /// Blocks until signalled. `None` waits forever; an elapsed timeout yields `TimedOut`.
    ///
    /// ### 中文
    /// 阻塞直到 signal。`None` 表示无限等待；超时返回 `TimedOut`。
    fn wait(&self, timeout: Option<Duration>) -> Result<()>;

    fn name(&self) -> &str {
        "fence"
    }
}

/// ### English
/// Reference-counted fence handle.
///
/// ### 中文
/// 引用计数的 fence 句柄。
#[derive(Clone, Default)]
pub struct Fence {
    source: Option<Arc<dyn FenceSource>>,
}

impl Fence {
    pub const NO_FENCE: Fence = Fence { source: None };

    pub fn new(source: Arc<dyn FenceSource>) -> Self {
        Self {
            source: Some(source),
        }
    }

    /// ### English
    /// A fence that already signalled now; for callers with no GPU work to wait on.
    ///
    /// ### 中文
    /// 当前时刻已 signal 的 fence；供没有 GPU 工作可等待的调用方使用。
    pub fn signaled() -> Self {
        let fence = SoftwareFence::new("signaled");
        fence.signal();
        fence.fence()
    }

    pub fn signaled_at(time: Nsecs) -> Self {
        let fence = SoftwareFence::new("signaled");
        fence.signal_at(time);
        fence.fence()
    }

    pub fn is_valid(&self) -> bool {
        self.source.is_some()
    }

    pub fn signal_time(&self) -> SignalTime {
        match &self.source {
            Some(source) => source.signal_time(),
            None => SignalTime::Invalid,
        }
    }

    /// ### English
    /// True when waiting would not block. `NO_FENCE` always counts as signalled.
    ///
    /// ### 中文
    /// 等待不会阻塞时返回 true。`NO_FENCE` 始终视为已 signal。
    pub fn has_signaled(&self) -> bool {
        !matches!(self.signal_time(), SignalTime::Pending)
    }

    pub fn wait(&self, timeout: Duration) -> Result<()> {
        match &self.source {
            Some(source) => source.wait(Some(timeout)),
            None => Ok(()),
        }
    }

    pub(crate) fn wait_unbounded(&self) -> Result<()> {
        match &self.source {
            Some(source) => source.wait(None),
            None => Ok(()),
        }
    }

    /// ### English
    /// Waits without a deadline, logging an error once `warning_timeout` elapses.
    ///
    /// ### 中文
    /// 无截止时间地等待；超过 `warning_timeout` 后记录一次错误日志。
    pub fn wait_forever(&self, warning_timeout: Duration, log_name: &str) -> Result<()> {
        let Some(source) = &self.source else {
            return Ok(());
        };
        match source.wait(Some(warning_timeout)) {
            Err(QueueError::TimedOut) => {
                log::error!(
                    "{log_name}: fence {} didn't signal in {} ms",
                    source.name(),
                    warning_timeout.as_millis()
                );
                source.wait(None)
            }
            other => other,
        }
    }

    /// ### English
    /// Fence that signals once both inputs signalled, at the later of the two times.
    ///
    /// ### 中文
    /// 两个输入都 signal 后才 signal 的 fence，signal 时间取两者中较晚者。
    pub fn merge(name: &str, first: &Fence, second: &Fence) -> Fence {
        match (&first.source, &second.source) {
            (None, _) => second.clone(),
            (_, None) => first.clone(),
            (Some(_), Some(_)) => Fence::new(Arc::new(MergedFence::new(
                name,
                first.clone(),
                second.clone(),
            ))),
        }
    }

    /// ### English
    /// Identity comparison: both are `NO_FENCE`, or both point at the same source.
    ///
    /// ### 中文
    /// 身份比较：两者均为 `NO_FENCE`，或指向同一个来源。
    pub fn same_as(&self, other: &Fence) -> bool {
        match (&self.source, &other.source) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Fence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            None => f.write_str("Fence::NO_FENCE"),
            Some(source) => write!(f, "Fence({}, {:?})", source.name(), source.signal_time()),
        }
    }
}
