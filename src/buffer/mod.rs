//! ### English
//! Backing buffers handed around by the queue, and the allocator contract that creates them.
//! The queue only holds references; pixel memory belongs to the allocator's buffers.
//!
//! ### 中文
//! 队列中流转的后备缓冲区，以及创建它们的分配器契约。
//! 队列只持有引用；像素内存归分配器创建的缓冲区所有。
mod allocator;
mod format;
mod graphic_buffer;

pub use allocator::{GraphicBufferAlloc, HeapBufferAllocator};
pub use format::PixelFormat;
pub use graphic_buffer::{BufferId, GraphicBuffer};
