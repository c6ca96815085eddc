use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use dpi::PhysicalSize;

use crate::buffer::{BufferId, GraphicBuffer, PixelFormat};
use crate::error::{QueueError, Result};
use crate::flags::BufferUsage;

/// ### English
/// Creates backing buffers on demand. Called with the queue lock released.
///
/// ### 中文
/// 按需创建后备缓冲区。调用时队列锁已释放。
pub trait GraphicBufferAlloc: Send + Sync {
    /// ### English
    /// Allocates one buffer. Failures are returned verbatim from `dequeue_buffer`.
    ///
    /// #### Parameters
    /// - `size`: Buffer size in pixels.
    /// - `format`: Pixel format (never `UNKNOWN`).
    /// - `usage`: Producer usage OR-ed with the consumer usage bits.
    /// - `debug_name`: Consumer name, for diagnostics.
    ///
    /// ### 中文
    /// 分配一个缓冲区。失败会由 `dequeue_buffer` 原样返回。
    ///
    /// #### 参数
    /// - `size`：缓冲区像素尺寸。
    /// - `format`：像素格式（不会是 `UNKNOWN`）。
    /// - `usage`：生产者 usage 与消费者 usage 位的按位或。
    /// - `debug_name`：consumer 名称，用于诊断。
    fn create_graphic_buffer(
        &self,
        size: PhysicalSize<u32>,
        format: PixelFormat,
        usage: BufferUsage,
        debug_name: &str,
    ) -> Result<Arc<GraphicBuffer>>;
}

/// ### English
/// System-memory allocator. Ids come from a counter owned by the allocator instance.
///
/// ### 中文
/// 系统内存分配器。id 来自分配器实例自身持有的计数器。
#[derive(Debug)]
pub struct HeapBufferAllocator {
    next_id: AtomicU64,
    allocations: AtomicUsize,
    max_bytes_per_buffer: usize,
}

impl HeapBufferAllocator {
    const DEFAULT_MAX_BYTES: usize = 256 << 20;

    pub fn new() -> Self {
        Self::with_max_bytes(Self::DEFAULT_MAX_BYTES)
    }

    /// ### English
    /// Allocator refusing (`NoMemory`) any buffer larger than `max_bytes_per_buffer`.
    ///
    /// ### 中文
    /// 拒绝（`NoMemory`）任何超过 `max_bytes_per_buffer` 的缓冲区的分配器。
    pub fn with_max_bytes(max_bytes_per_buffer: usize) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            allocations: AtomicUsize::new(0),
            max_bytes_per_buffer,
        }
    }

    /// ### English
    /// Number of successful allocations so far.
    ///
    /// ### 中文
    /// 迄今为止成功分配的次数。
    pub fn allocation_count(&self) -> usize {
        self.allocations.load(Ordering::Acquire)
    }
}

impl Default for HeapBufferAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicBufferAlloc for HeapBufferAllocator {
    fn create_graphic_buffer(
        &self,
        size: PhysicalSize<u32>,
        format: PixelFormat,
        usage: BufferUsage,
        debug_name: &str,
    ) -> Result<Arc<GraphicBuffer>> {
        let bytes = (size.width as usize)
            .checked_mul(size.height as usize)
            .and_then(|px| px.checked_mul(format.bytes_per_pixel().unwrap_or(0)));
        match bytes {
            Some(bytes) if bytes <= self.max_bytes_per_buffer => {}
            _ => {
                log::error!(
                    "[{debug_name}] allocator: refusing {}x{} format {:?}",
                    size.width,
                    size.height,
                    format
                );
                return Err(QueueError::NoMemory);
            }
        }
        let id = BufferId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.allocations.fetch_add(1, Ordering::AcqRel);
        Ok(Arc::new(GraphicBuffer::new(id, size, format, usage)))
    }
}
