//! ### English
//! Monotonic nanosecond time base shared by fences, queue timestamps and occupancy tracking.
//!
//! ### 中文
//! fence、队列时间戳与占用统计共用的单调纳秒时间基准。

use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// ### English
/// Nanoseconds on the crate's monotonic clock.
///
/// ### 中文
/// crate 单调时钟上的纳秒值。
pub type Nsecs = i64;

pub const NSECS_PER_MS: Nsecs = 1_000_000;
pub const NSECS_PER_SEC: Nsecs = 1_000_000_000;

fn epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

/// ### English
/// Current monotonic time. Never returns 0, so callers may keep 0 as "unset".
///
/// ### 中文
/// 当前单调时间。永不返回 0，调用方可继续用 0 表示“未设置”。
pub fn now() -> Nsecs {
    duration_to_nsecs(epoch().elapsed()).saturating_add(1)
}

#[inline]
pub fn duration_to_nsecs(duration: Duration) -> Nsecs {
    Nsecs::try_from(duration.as_nanos()).unwrap_or(Nsecs::MAX)
}

#[inline]
pub const fn ms_to_nsecs(ms: i64) -> Nsecs {
    ms * NSECS_PER_MS
}
