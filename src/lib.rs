//! ### English
//! `buffer_queue` crate root.
//! A slot-based producer / consumer buffer exchange: a drawing client dequeues buffers, renders into
//! them and queues them; a compositor acquires, samples and releases them. The engine lives under
//! `queue`; fences, buffers, listeners and frame history are the contracts around it.
//!
//! ### 中文
//! `buffer_queue` 的 crate 根。
//! 基于槽位的生产者 / 消费者缓冲区交换：绘制客户端 dequeue 缓冲区、渲染并 queue；合成器 acquire、采样并 release。
//! 引擎位于 `queue` 模块；fence、缓冲区、监听器与帧历史是围绕它的契约。

mod macros;

pub mod buffer;
pub mod clock;
pub mod config;
pub mod error;
pub mod fence;
pub mod flags;
pub mod frame;
pub mod import;
pub mod listener;
pub mod queue;

pub use buffer::{BufferId, GraphicBuffer, GraphicBufferAlloc, HeapBufferAllocator, PixelFormat};
pub use config::BufferQueueConfig;
pub use error::{QueueError, Result};
pub use fence::{Fence, SignalTime, SoftwareFence};
pub use flags::{BufferUsage, DequeueFlags, Transform};
pub use listener::{ConsumerListener, ProducerListener};
pub use queue::{
    BufferItem, BufferQueue, BufferQueueConsumer, BufferQueueProducer, QueueBufferInput,
    QueueBufferOutput,
};
