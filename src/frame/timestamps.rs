use crate::clock::Nsecs;
use crate::fence::{Fence, SignalTime};

/// ### English
/// Timeline of one frame of one layer. Fence-derived fields stay `None` until their fence signals.
///
/// ### 中文
/// 某个图层某一帧的时间线。由 fence 推导的字段在其 fence signal 之前保持为 `None`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameTimestamps {
    pub frame_number: u64,
    /// ### English
    /// When the producer queued the frame; 0 when the layer was composited by the GPU.
    ///
    /// ### 中文
    /// 生产者 queue 该帧的时间；若图层由 GPU 合成则为 0。
    pub posted_time: Nsecs,
    pub requested_present_time: Nsecs,
    pub acquire_time: Option<Nsecs>,
    pub refresh_start_time: Nsecs,
    pub gpu_composition_done_time: Option<Nsecs>,
    pub display_retire_time: Option<Nsecs>,
    pub release_time: Option<Nsecs>,
}

/// ### English
/// What the compositor knows about one layer when a refresh starts.
///
/// ### 中文
/// 刷新开始时合成器所掌握的单个图层信息。
#[derive(Debug, Clone, Default)]
pub struct LayerFenceData {
    pub layer_id: i32,
    pub name: String,
    pub frame_number: u64,
    pub gpu_composition: bool,
    pub posted_time: Nsecs,
    pub requested_present_time: Nsecs,
    pub acquire_fence: Fence,
    /// ### English
    /// Release fence of this layer's previous frame; it belongs to the previous record.
    ///
    /// ### 中文
    /// 该图层上一帧的 release fence；归属于上一条记录。
    pub previous_release_fence: Fence,
}

/// ### English
/// A fence not yet turned into a timestamp.
///
/// ### 中文
/// 尚未转换为时间戳的 fence。
#[derive(Debug, Clone, Default)]
pub(crate) struct PendingTime {
    fence: Option<Fence>,
    time: Option<Nsecs>,
}

impl PendingTime {
    pub(crate) fn new(fence: Fence) -> Self {
        Self {
            fence: fence.is_valid().then_some(fence),
            time: None,
        }
    }

    /// ### English
    /// Polls the fence; a signalled fence is dropped after its time is copied.
    ///
    /// ### 中文
    /// 轮询 fence；已 signal 的 fence 在复制其时间后被丢弃。
    pub(crate) fn resolve(&mut self) {
        let Some(fence) = &self.fence else {
            return;
        };
        match fence.signal_time() {
            SignalTime::Signaled(time) => {
                self.time = Some(time);
                self.fence = None;
            }
            SignalTime::Invalid => self.fence = None,
            SignalTime::Pending => {}
        }
    }

    pub(crate) fn time(&self) -> Option<Nsecs> {
        self.time
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.fence.is_some()
    }
}
