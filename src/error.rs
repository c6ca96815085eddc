//! ### English
//! Error kinds returned by every queue operation.
//!
//! ### 中文
//! 所有队列操作返回的错误类型。

use thiserror::Error;

/// ### English
/// Distinguishable failure kinds of producer / consumer operations.
///
/// `PresentLater`, `NoBufferAvailable` and `StaleBufferSlot` are consumer flow-control results
/// rather than contract violations.
///
/// ### 中文
/// 生产者 / 消费者操作可区分的失败类型。
///
/// `PresentLater`、`NoBufferAvailable` 与 `StaleBufferSlot` 属于消费者侧流控结果，而非契约违规。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum QueueError {
    #[error("buffer queue has been abandoned or the producer is not connected")]
    NoInit,
    #[error("invalid argument")]
    BadValue,
    #[error("operation not allowed in the current queue state")]
    InvalidOperation,
    #[error("operation would block")]
    WouldBlock,
    #[error("timed out")]
    TimedOut,
    #[error("out of buffers or buffer memory")]
    NoMemory,
    #[error("buffer is not due for presentation yet")]
    PresentLater,
    #[error("no buffer available to acquire")]
    NoBufferAvailable,
    #[error("released slot no longer holds the acquired buffer")]
    StaleBufferSlot,
}

impl QueueError {
    /// ### English
    /// Stable integer code for this error kind (negative errno style, positive for consumer
    /// flow-control results).
    ///
    /// ### 中文
    /// 该错误类型的稳定整数码（负 errno 风格；消费者流控结果为正数）。
    pub const fn status_code(self) -> i32 {
        match self {
            QueueError::NoInit => -19,
            QueueError::BadValue => -22,
            QueueError::InvalidOperation => -38,
            QueueError::WouldBlock => -11,
            QueueError::TimedOut => -110,
            QueueError::NoMemory => -12,
            QueueError::PresentLater => 1,
            QueueError::NoBufferAvailable => 2,
            QueueError::StaleBufferSlot => 3,
        }
    }
}

pub type Result<T, E = QueueError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_distinct() {
        let all = [
            QueueError::NoInit,
            QueueError::BadValue,
            QueueError::InvalidOperation,
            QueueError::WouldBlock,
            QueueError::TimedOut,
            QueueError::NoMemory,
            QueueError::PresentLater,
            QueueError::NoBufferAvailable,
            QueueError::StaleBufferSlot,
        ];
        let mut codes: Vec<i32> = all.iter().map(|e| e.status_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }
}
