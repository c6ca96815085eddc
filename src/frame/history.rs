use std::collections::BTreeMap;
use std::fmt::Write;

use super::timestamps::{FrameTimestamps, LayerFenceData, PendingTime};
use crate::clock::Nsecs;
use crate::fence::Fence;

/// ### English
/// Number of refresh cycles kept.
///
/// ### 中文
/// 保留的刷新周期数。
pub const MAX_FRAME_HISTORY: usize = 8;

#[derive(Debug, Clone, Default)]
struct LayerRecord {
    name: String,
    frame_number: u64,
    gpu_composition: bool,
    posted_time: Nsecs,
    requested_present_time: Nsecs,
    acquire: PendingTime,
    release: PendingTime,
}

#[derive(Debug, Clone, Default)]
struct FrameRecord {
    frame_id: u64,
    layers: BTreeMap<i32, LayerRecord>,
    refresh_start_time: Nsecs,
    gpu_composition_done: PendingTime,
    display_retire: PendingTime,
}

/// ### English
/// Ring of the last [`MAX_FRAME_HISTORY`] refresh cycles.
///
/// Frame ids come from a counter owned by the history, so separate displays or tests never share
/// one. Not synchronised; wrap it in a mutex when the compositor and listener run on different
/// threads.
///
/// ### 中文
/// 最近 [`MAX_FRAME_HISTORY`] 个刷新周期的环形缓冲。
///
/// 帧 id 来自历史记录自身持有的计数器，因此不同的显示器或测试不会共享。本身不做同步；
/// 当合成器与监听器运行在不同线程时，请用互斥锁包裹。
#[derive(Debug, Default)]
pub struct FrameHistory {
    frames: [FrameRecord; MAX_FRAME_HISTORY],
    offset: usize,
    frame_counter: u64,
}

impl FrameHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// ### English
    /// Records a new refresh cycle, overwriting the oldest.
    ///
    /// #### Parameters
    /// - `refresh_start_time`: When composition of this refresh began.
    /// - `retire_fence`: Signals when the *previous* refresh left the screen, so it is stored on the
    ///   previous record.
    /// - `layers`: Per-layer state at refresh start.
    /// - `gpu_done_fence`: GPU composition completion; ignored unless some layer was GPU composited.
    ///
    /// ### 中文
    /// 记录一个新的刷新周期，覆盖最早的一条。
    ///
    /// #### 参数
    /// - `refresh_start_time`：本次刷新开始合成的时间。
    /// - `retire_fence`：在*上一次*刷新离开屏幕时 signal，因此存放在上一条记录上。
    /// - `layers`：刷新开始时各图层的状态。
    /// - `gpu_done_fence`：GPU 合成完成 fence；仅当有图层由 GPU 合成时才记录。
    pub fn add_frame(
        &mut self,
        refresh_start_time: Nsecs,
        retire_fence: Fence,
        layers: &[LayerFenceData],
        gpu_done_fence: Fence,
    ) {
        let previous = (self.offset + MAX_FRAME_HISTORY - 1) % MAX_FRAME_HISTORY;
        let mut records = BTreeMap::new();
        let mut any_gpu_composition = false;

        for layer in layers {
            any_gpu_composition |= layer.gpu_composition;
            records.insert(
                layer.layer_id,
                LayerRecord {
                    name: layer.name.clone(),
                    frame_number: layer.frame_number,
                    gpu_composition: layer.gpu_composition,
                    posted_time: if layer.gpu_composition {
                        0
                    } else {
                        layer.posted_time
                    },
                    requested_present_time: layer.requested_present_time,
                    acquire: PendingTime::new(layer.acquire_fence.clone()),
                    release: PendingTime::default(),
                },
            );
            if let Some(record) = self.frames[previous].layers.get_mut(&layer.layer_id) {
                record.release = PendingTime::new(layer.previous_release_fence.clone());
            }
        }

        self.frames[previous].display_retire = PendingTime::new(retire_fence);
        self.frames[self.offset] = FrameRecord {
            frame_id: self.frame_counter,
            layers: records,
            refresh_start_time,
            gpu_composition_done: if any_gpu_composition {
                PendingTime::new(gpu_done_fence)
            } else {
                PendingTime::default()
            },
            display_retire: PendingTime::default(),
        };
        self.frame_counter += 1;
        self.offset = (self.offset + 1) % MAX_FRAME_HISTORY;
    }

    /// ### English
    /// Converts every signalled fence into its timestamp. Unsignalled fences are kept.
    ///
    /// ### 中文
    /// 将所有已 signal 的 fence 转换为时间戳。未 signal 的 fence 会被保留。
    pub fn resolve(&mut self) {
        for frame in &mut self.frames {
            frame.display_retire.resolve();
            frame.gpu_composition_done.resolve();
            for layer in frame.layers.values_mut() {
                layer.acquire.resolve();
                layer.release.resolve();
            }
        }
    }

    /// ### English
    /// Timeline of `frame_number` on layer `layer_id`, or `None` once it fell out of the ring.
    ///
    /// ### 中文
    /// 图层 `layer_id` 上 `frame_number` 的时间线；若已滑出环形缓冲则为 `None`。
    pub fn get_frame_timestamps(&mut self, layer_id: i32, frame_number: u64) -> Option<FrameTimestamps> {
        self.resolve();
        self.frames.iter().find_map(|frame| {
            let layer = frame
                .layers
                .get(&layer_id)
                .filter(|layer| layer.frame_number == frame_number)?;
            Some(FrameTimestamps {
                frame_number,
                posted_time: layer.posted_time,
                requested_present_time: layer.requested_present_time,
                acquire_time: layer.acquire.time(),
                refresh_start_time: frame.refresh_start_time,
                gpu_composition_done_time: frame.gpu_composition_done.time(),
                display_retire_time: frame.display_retire.time(),
                release_time: layer.release.time(),
            })
        })
    }

    /// ### English
    /// One block per recorded refresh, oldest first.
    ///
    /// ### 中文
    /// 每个已记录的刷新一块，最早的在前。
    pub fn dump(&mut self) -> String {
        self.resolve();
        let mut out = String::new();
        for step in 0..MAX_FRAME_HISTORY {
            let frame = &self.frames[(self.offset + step) % MAX_FRAME_HISTORY];
            if frame.layers.is_empty() && frame.refresh_start_time == 0 {
                continue;
            }
            let _ = writeln!(
                out,
                "frame {} refresh_start={} gpu_done={} retire={}",
                frame.frame_id,
                frame.refresh_start_time,
                describe(&frame.gpu_composition_done),
                describe(&frame.display_retire),
            );
            for (layer_id, layer) in &frame.layers {
                let _ = writeln!(
                    out,
                    "  layer {layer_id} '{}' frame={} gpu={} posted={} requested={} acquire={} release={}",
                    layer.name,
                    layer.frame_number,
                    layer.gpu_composition,
                    layer.posted_time,
                    layer.requested_present_time,
                    describe(&layer.acquire),
                    describe(&layer.release),
                );
            }
        }
        out
    }
}

fn describe(time: &PendingTime) -> String {
    match time.time() {
        Some(time) => time.to_string(),
        None if time.is_pending() => "pending".to_string(),
        None => "-".to_string(),
    }
}
