use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use dpi::PhysicalSize;

use crate::buffer::PixelFormat;
use crate::flags::BufferUsage;
use crate::queue::Rect;

/// ### English
/// Allocator-assigned identity of a buffer. Two handles with the same id are the same memory.
///
/// ### 中文
/// 分配器分配的缓冲区标识。id 相同即为同一块内存。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u64);

/// ### English
/// One backing image buffer.
///
/// Geometry is immutable once allocated. The generation number is stamped by the queue that
/// owns the buffer and checked on attach.
///
/// ### 中文
/// 一个后备图像缓冲区。
///
/// 分配后几何属性不可变。generation 由持有它的队列写入，并在 attach 时校验。
pub struct GraphicBuffer {
    id: BufferId,
    size: PhysicalSize<u32>,
    stride: u32,
    format: PixelFormat,
    usage: BufferUsage,
    generation: AtomicU32,
    pixels: Mutex<Vec<u8>>,
}

impl GraphicBuffer {
    /// ### English
    /// Creates a buffer with zero-filled CPU storage sized for `format`
    /// (empty storage when the format is opaque).
    ///
    /// ### 中文
    /// 创建一个按 `format` 计算大小、内容清零的 CPU 存储缓冲区（格式不透明时存储为空）。
    pub fn new(
        id: BufferId,
        size: PhysicalSize<u32>,
        format: PixelFormat,
        usage: BufferUsage,
    ) -> Self {
        let len = format
            .bytes_per_pixel()
            .map_or(0, |bpp| size.width as usize * size.height as usize * bpp);
        Self::with_storage(id, size, size.width, format, usage, vec![0; len])
    }

    /// ### English
    /// Wraps externally provided storage.
    ///
    /// ### 中文
    /// 包装外部提供的存储。
    pub fn with_storage(
        id: BufferId,
        size: PhysicalSize<u32>,
        stride: u32,
        format: PixelFormat,
        usage: BufferUsage,
        pixels: Vec<u8>,
    ) -> Self {
        Self {
            id,
            size,
            stride,
            format,
            usage,
            generation: AtomicU32::new(0),
            pixels: Mutex::new(pixels),
        }
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    pub fn generation_number(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn set_generation_number(&self, generation: u32) {
        self.generation.store(generation, Ordering::Release);
    }

    /// ### English
    /// Whole-buffer rectangle, used to validate crops.
    ///
    /// ### 中文
    /// 整个缓冲区的矩形，用于校验 crop。
    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.size)
    }

    /// ### English
    /// True when this buffer cannot serve a request for the given geometry / usage.
    /// Usage only forces reallocation when the request needs bits this buffer lacks.
    ///
    /// ### 中文
    /// 当本缓冲区无法满足给定几何 / usage 请求时返回 true。
    /// 仅当请求需要本缓冲区缺少的 usage 位时才因 usage 触发重新分配。
    pub fn needs_reallocation(
        &self,
        size: PhysicalSize<u32>,
        format: PixelFormat,
        usage: BufferUsage,
    ) -> bool {
        self.size != size || self.format != format || !self.usage.contains(usage)
    }

    /// ### English
    /// Locks the CPU-visible pixel storage. Callers must own the buffer (DEQUEUED or ACQUIRED) and
    /// have waited on its fence.
    ///
    /// ### 中文
    /// 锁定 CPU 可见的像素存储。调用方必须拥有该缓冲区（DEQUEUED 或 ACQUIRED）并已等待其 fence。
    pub fn lock_pixels(&self) -> MutexGuard<'_, Vec<u8>> {
        self.pixels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for GraphicBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphicBuffer")
            .field("id", &self.id)
            .field("size", &(self.size.width, self.size.height))
            .field("stride", &self.stride)
            .field("format", &self.format)
            .field("usage", &self.usage)
            .field("generation", &self.generation_number())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_matches_format() {
        let buffer = GraphicBuffer::new(
            BufferId(1),
            PhysicalSize::new(4, 2),
            PixelFormat::RGBA_8888,
            BufferUsage::empty(),
        );
        assert_eq!(buffer.lock_pixels().len(), 32);
        assert_eq!(buffer.bounds(), Rect::new(0, 0, 4, 2));
    }

    #[test]
    fn reallocation_only_for_missing_usage_bits() {
        let buffer = GraphicBuffer::new(
            BufferId(1),
            PhysicalSize::new(8, 8),
            PixelFormat::RGBA_8888,
            BufferUsage::HW_TEXTURE | BufferUsage::HW_RENDER,
        );
        let size = PhysicalSize::new(8, 8);
        assert!(!buffer.needs_reallocation(size, PixelFormat::RGBA_8888, BufferUsage::HW_TEXTURE));
        assert!(buffer.needs_reallocation(size, PixelFormat::RGBA_8888, BufferUsage::SW_READ_OFTEN));
        assert!(buffer.needs_reallocation(size, PixelFormat::RGB_565, BufferUsage::empty()));
        assert!(buffer.needs_reallocation(
            PhysicalSize::new(8, 9),
            PixelFormat::RGBA_8888,
            BufferUsage::empty()
        ));
    }
}
