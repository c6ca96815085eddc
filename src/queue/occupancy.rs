//! ### English
//! Rolling statistics of pending-queue depth over time.
//!
//! Activity is cut into segments separated by idle gaps longer than 100 ms. Only segments with more
//! than three frames are kept, since short bursts say little about double vs. triple buffering.
//!
//! ### 中文
//! 待处理队列深度随时间变化的滚动统计。
//!
//! 活动按超过 100 ms 的空闲间隔切分为若干段。仅保留超过 3 帧的段，因为短暂突发不足以说明双缓冲/三缓冲的情况。

use std::collections::{BTreeMap, VecDeque};

use crate::clock::{self, Nsecs};

const MAX_HISTORY: usize = 10;
const NEW_SEGMENT_DELAY: Nsecs = clock::ms_to_nsecs(100);
const LONG_SEGMENT_THRESHOLD: usize = 3;

/// ### English
/// One recorded stretch of queue activity.
///
/// ### 中文
/// 一段已记录的队列活动。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OccupancySegment {
    pub total_time: Nsecs,
    pub num_frames: usize,
    /// ### English
    /// Time-weighted average queue depth.
    ///
    /// ### 中文
    /// 按时间加权的平均队列深度。
    pub occupancy_average: f32,
    pub used_third_buffer: bool,
}

#[derive(Debug, Default)]
struct PendingSegment {
    total_time: Nsecs,
    num_frames: usize,
    occupancy_times: BTreeMap<usize, Nsecs>,
}

#[derive(Debug, Default)]
pub(crate) struct OccupancyTracker {
    pending: PendingSegment,
    history: VecDeque<OccupancySegment>,
    last_occupancy: usize,
    last_change_time: Nsecs,
}

impl OccupancyTracker {
    pub(crate) fn register_occupancy_change(&mut self, occupancy: usize) {
        self.register_at(clock::now(), occupancy);
    }

    fn register_at(&mut self, now: Nsecs, occupancy: usize) {
        let delta = now - self.last_change_time;
        if delta > NEW_SEGMENT_DELAY {
            self.record_pending_segment();
        } else {
            self.pending.total_time += delta;
            *self
                .pending
                .occupancy_times
                .entry(self.last_occupancy)
                .or_default() += delta;
        }
        if occupancy > self.last_occupancy {
            self.pending.num_frames += 1;
        }
        self.last_occupancy = occupancy;
        self.last_change_time = now;
    }

    fn record_pending_segment(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        if pending.num_frames <= LONG_SEGMENT_THRESHOLD || pending.total_time <= 0 {
            return;
        }
        let mut occupancy_average = 0.0f32;
        let mut used_third_buffer = false;
        for (&occupancy, &time) in &pending.occupancy_times {
            let ratio = time as f32 / pending.total_time as f32;
            occupancy_average += ratio * occupancy as f32;
            used_third_buffer |= occupancy > 1;
        }
        self.history.push_front(OccupancySegment {
            total_time: pending.total_time,
            num_frames: pending.num_frames,
            occupancy_average,
            used_third_buffer,
        });
        self.history.truncate(MAX_HISTORY);
    }

    /// ### English
    /// Drains recorded segments, newest first. `force_flush` closes the in-progress segment first.
    ///
    /// ### 中文
    /// 取出已记录的段（最新的在前）。`force_flush` 会先结束正在进行的段。
    pub(crate) fn take_segment_history(&mut self, force_flush: bool) -> Vec<OccupancySegment> {
        if force_flush {
            self.record_pending_segment();
        }
        self.history.drain(..).collect()
    }
}
