//! ### English
//! Records exchanged between producer and consumer: pending-queue items, queue inputs / outputs and
//! the geometry / colour tags they carry.
//!
//! ### 中文
//! 生产者与消费者之间交换的记录：待处理队列项、queue 输入/输出，以及其携带的几何 / 颜色标记。

use std::sync::Arc;

use dpi::PhysicalSize;

use crate::buffer::GraphicBuffer;
use crate::clock::Nsecs;
use crate::error::QueueError;
use crate::fence::Fence;
use crate::flags::{DequeueFlags, Transform};

/// ### English
/// Integer rectangle, right / bottom exclusive.
///
/// ### 中文
/// 整数矩形，right / bottom 为开区间。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    /// ### English
    /// "No crop": passes crop validation and means the whole buffer.
    ///
    /// ### 中文
    /// “不裁剪”：可通过 crop 校验，表示整个缓冲区。
    pub const INVALID: Rect = Rect::new(0, 0, -1, -1);
    pub const EMPTY: Rect = Rect::new(0, 0, 0, 0);

    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_size(size: PhysicalSize<u32>) -> Self {
        Self::new(
            0,
            0,
            i32::try_from(size.width).unwrap_or(i32::MAX),
            i32::try_from(size.height).unwrap_or(i32::MAX),
        )
    }

    pub const fn width(&self) -> i32 {
        self.right - self.left
    }

    pub const fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub const fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    pub const fn is_valid(&self) -> bool {
        self.width() >= 0 && self.height() >= 0
    }

    /// ### English
    /// Edge-wise clip against `bounds`. The result may be empty or inverted; crop validation compares
    /// it with the original rectangle.
    ///
    /// ### 中文
    /// 按边裁剪到 `bounds`。结果可能为空或反向；crop 校验会将其与原矩形比较。
    pub fn clipped_to(&self, bounds: &Rect) -> Rect {
        Rect::new(
            self.left.max(bounds.left),
            self.top.max(bounds.top),
            self.right.min(bounds.right),
            self.bottom.min(bounds.bottom),
        )
    }

    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let clipped = self.clipped_to(other);
        (!clipped.is_empty()).then_some(clipped)
    }
}

/// ### English
/// How the consumer maps a buffer onto its window. The integer values are stable.
///
/// ### 中文
/// 消费者将缓冲区映射到窗口的方式。整数值保持稳定。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum ScalingMode {
    #[default]
    Freeze = 0,
    ScaleToWindow = 1,
    ScaleCrop = 2,
    NoScaleCrop = 3,
}

impl TryFrom<u32> for ScalingMode {
    type Error = QueueError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ScalingMode::Freeze),
            1 => Ok(ScalingMode::ScaleToWindow),
            2 => Ok(ScalingMode::ScaleCrop),
            3 => Ok(ScalingMode::NoScaleCrop),
            _ => Err(QueueError::BadValue),
        }
    }
}

/// ### English
/// Colour space tag carried by a frame. `Unknown` on queue is replaced by the consumer default.
///
/// ### 中文
/// 帧携带的色彩空间标记。queue 时的 `Unknown` 会被替换为消费者默认值。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataSpace {
    #[default]
    Unknown,
    Srgb,
    SrgbLinear,
    DisplayP3,
    Bt601,
    Bt709,
    Bt2020,
    Jfif,
    Other(u32),
}

impl DataSpace {
    /// ### English
    /// Packed standard / transfer / range value, as reported by `NativeWindowQuery::DefaultDataSpace`.
    ///
    /// ### 中文
    /// 打包后的 standard / transfer / range 数值，即 `NativeWindowQuery::DefaultDataSpace` 报告的值。
    pub const fn raw(self) -> u32 {
        match self {
            DataSpace::Unknown => 0,
            DataSpace::Srgb => 0x0881_0000,
            DataSpace::SrgbLinear => 0x0841_0000,
            DataSpace::DisplayP3 => 0x088A_0000,
            DataSpace::Bt601 => 0x10C2_0000,
            DataSpace::Bt709 => 0x10C1_0000,
            DataSpace::Bt2020 => 0x08C6_0000,
            DataSpace::Jfif => 0x08C2_0000,
            DataSpace::Other(raw) => raw,
        }
    }
}

/// ### English
/// One queued frame as seen by the consumer.
///
/// ### 中文
/// 消费者看到的一帧已入队数据。
#[derive(Debug, Clone, Default)]
pub struct BufferItem {
    /// ### English
    /// Buffer handle; `None` when the consumer already received this slot's buffer in an earlier
    /// acquire and is expected to have cached it.
    ///
    /// ### 中文
    /// 缓冲区句柄；若消费者在之前的 acquire 中已收到该槽位缓冲区（应自行缓存），则为 `None`。
    pub graphic_buffer: Option<Arc<GraphicBuffer>>,
    /// ### English
    /// Acquire fence: signalled once the producer's rendering completed.
    ///
    /// ### 中文
    /// acquire fence：生产者渲染完成后 signal。
    pub fence: Fence,
    pub crop: Rect,
    /// ### English
    /// Transform with `INVERSE_DISPLAY` removed.
    ///
    /// ### 中文
    /// 已移除 `INVERSE_DISPLAY` 的变换。
    pub transform: Transform,
    pub transform_to_display_inverse: bool,
    pub scaling_mode: ScalingMode,
    /// ### English
    /// Desired present time.
    ///
    /// ### 中文
    /// 期望的呈现时间。
    pub timestamp: Nsecs,
    pub is_auto_timestamp: bool,
    pub data_space: DataSpace,
    pub frame_number: u64,
    pub slot: Option<usize>,
    /// ### English
    /// A newer queued frame may overwrite this one before it is acquired.
    ///
    /// ### 中文
    /// 在被 acquire 之前，较新的入队帧可以覆盖此帧。
    pub droppable: bool,
    pub acquire_called: bool,
    /// ### English
    /// False when the item was recreated from the shared-buffer cache rather than queued.
    ///
    /// ### 中文
    /// 若该项由共享缓冲区缓存重建而非实际入队，则为 false。
    pub queued_buffer: bool,
    /// ### English
    /// The slot was freed while this item waited in the queue.
    ///
    /// ### 中文
    /// 该项在队列中等待期间其槽位已被释放。
    pub is_stale: bool,
    pub auto_refresh: bool,
}

/// ### English
/// Arguments of `BufferQueueProducer::queue_buffer`.
///
/// ### 中文
/// `BufferQueueProducer::queue_buffer` 的参数。
#[derive(Debug, Clone)]
pub struct QueueBufferInput {
    pub timestamp: Nsecs,
    pub is_auto_timestamp: bool,
    pub data_space: DataSpace,
    pub crop: Rect,
    /// ### English
    /// Raw scaling-mode integer; validated against [`ScalingMode`] on queue.
    ///
    /// ### 中文
    /// 原始 scaling-mode 整数；queue 时按 [`ScalingMode`] 校验。
    pub scaling_mode: u32,
    pub transform: Transform,
    pub sticky_transform: u32,
    /// ### English
    /// Acquire fence. `None` is rejected; pass `Fence::signaled()` when nothing is pending.
    ///
    /// ### 中文
    /// acquire fence。`None` 会被拒绝；无待完成工作时请传入 `Fence::signaled()`。
    pub fence: Option<Fence>,
    pub droppable: bool,
}

impl QueueBufferInput {
    pub fn new(fence: Fence) -> Self {
        Self {
            timestamp: 0,
            is_auto_timestamp: true,
            data_space: DataSpace::Unknown,
            crop: Rect::INVALID,
            scaling_mode: ScalingMode::Freeze as u32,
            transform: Transform::empty(),
            sticky_transform: 0,
            fence: Some(fence),
            droppable: false,
        }
    }

    pub fn with_timestamp(mut self, timestamp: Nsecs) -> Self {
        self.timestamp = timestamp;
        self.is_auto_timestamp = false;
        self
    }

    pub fn with_crop(mut self, crop: Rect) -> Self {
        self.crop = crop;
        self
    }

    pub fn with_scaling_mode(mut self, mode: ScalingMode) -> Self {
        self.scaling_mode = mode as u32;
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_data_space(mut self, data_space: DataSpace) -> Self {
        self.data_space = data_space;
        self
    }

    pub fn with_droppable(mut self, droppable: bool) -> Self {
        self.droppable = droppable;
        self
    }
}

/// ### English
/// Snapshot returned by `connect` and `queue_buffer`.
///
/// ### 中文
/// `connect` 与 `queue_buffer` 返回的快照。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueBufferOutput {
    pub width: u32,
    pub height: u32,
    pub transform_hint: u32,
    pub num_pending_buffers: u32,
    pub next_frame_number: u64,
}

/// ### English
/// Result of a successful dequeue.
///
/// ### 中文
/// dequeue 成功的结果。
#[derive(Debug, Clone)]
pub struct DequeuedBuffer {
    pub slot: usize,
    /// ### English
    /// Release fence left by the consumer (or by cancel); wait before writing.
    ///
    /// ### 中文
    /// 消费者（或 cancel）留下的 release fence；写入前需等待。
    pub fence: Fence,
    pub flags: DequeueFlags,
    /// ### English
    /// Frames since this slot's content was last queued; 0 when the content is undefined.
    ///
    /// ### 中文
    /// 自该槽位内容上次入队以来经过的帧数；内容未定义时为 0。
    pub buffer_age: u64,
}
