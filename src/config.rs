//! ### English
//! Construction-time settings of a buffer queue.
//!
//! ### 中文
//! 缓冲队列的构造期配置。

use dpi::PhysicalSize;

use crate::buffer::PixelFormat;
use crate::flags::BufferUsage;
use crate::queue::DataSpace;

/// ### English
/// Initial core values. Every field can also be changed later through the consumer handle.
///
/// ### 中文
/// 核心初始值。每个字段之后也可通过 consumer 句柄修改。
#[derive(Debug, Clone)]
pub struct BufferQueueConfig {
    /// ### English
    /// Name used in logs and as the allocator debug name. `None` derives `unnamed-<pid>-<addr>`.
    ///
    /// ### 中文
    /// 用于日志以及分配器调试名。`None` 时自动生成 `unnamed-<pid>-<addr>`。
    pub consumer_name: Option<String>,
    pub default_size: PhysicalSize<u32>,
    pub default_format: PixelFormat,
    pub default_data_space: DataSpace,
    pub consumer_usage_bits: BufferUsage,
    pub max_acquired_buffer_count: usize,
    pub max_dequeued_buffer_count: usize,
    /// ### English
    /// Walk every slot invariant after each mutation. Defaults to on in debug builds.
    ///
    /// ### 中文
    /// 每次修改后遍历所有槽位不变量。debug 构建下默认开启。
    pub validate_consistency: bool,
}

impl Default for BufferQueueConfig {
    fn default() -> Self {
        Self {
            consumer_name: None,
            default_size: PhysicalSize::new(1, 1),
            default_format: PixelFormat::RGBA_8888,
            default_data_space: DataSpace::Unknown,
            consumer_usage_bits: BufferUsage::empty(),
            max_acquired_buffer_count: 1,
            max_dequeued_buffer_count: 1,
            validate_consistency: cfg!(debug_assertions),
        }
    }
}

impl BufferQueueConfig {
    pub fn with_consumer_name(mut self, name: impl Into<String>) -> Self {
        self.consumer_name = Some(name.into());
        self
    }

    pub fn with_default_size(mut self, width: u32, height: u32) -> Self {
        self.default_size = PhysicalSize::new(width, height);
        self
    }

    pub fn with_default_format(mut self, format: PixelFormat) -> Self {
        self.default_format = format;
        self
    }

    pub fn with_default_data_space(mut self, data_space: DataSpace) -> Self {
        self.default_data_space = data_space;
        self
    }

    pub fn with_consumer_usage_bits(mut self, usage: BufferUsage) -> Self {
        self.consumer_usage_bits = usage;
        self
    }

    pub fn with_max_acquired_buffer_count(mut self, count: usize) -> Self {
        self.max_acquired_buffer_count = count;
        self
    }

    pub fn with_max_dequeued_buffer_count(mut self, count: usize) -> Self {
        self.max_dequeued_buffer_count = count;
        self
    }

    pub fn with_validate_consistency(mut self, validate: bool) -> Self {
        self.validate_consistency = validate;
        self
    }
}
