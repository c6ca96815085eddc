//! ### English
//! Presentation timeline of past frames: when a frame was posted, latched, composited, retired and
//! released.
//!
//! The compositor records one [`FrameHistory`] entry per refresh; the producer asks for a frame
//! through `BufferQueueProducer::frame_timestamps`, which the consumer listener answers from here.
//!
//! ### 中文
//! 过往帧的呈现时间线：帧何时被提交、锁存、合成、退役以及释放。
//!
//! 合成器每次刷新记录一条 [`FrameHistory`]；生产者通过 `BufferQueueProducer::frame_timestamps` 查询某一帧，
//! 消费者监听器从这里给出答案。
mod history;
mod timestamps;

pub use history::{FrameHistory, MAX_FRAME_HISTORY};
pub use timestamps::{FrameTimestamps, LayerFenceData};
