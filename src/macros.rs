//! ### English
//! Logging helpers that prefix every message with the queue's consumer name.
//!
//! ### 中文
//! 为每条日志加上队列 consumer 名称前缀的辅助宏。

macro_rules! bq_error {
    ($name:expr, $($arg:tt)+) => {
        log::error!("[{}] {}", $name, format_args!($($arg)+))
    };
}

macro_rules! bq_warn {
    ($name:expr, $($arg:tt)+) => {
        log::warn!("[{}] {}", $name, format_args!($($arg)+))
    };
}

macro_rules! bq_debug {
    ($name:expr, $($arg:tt)+) => {
        log::debug!("[{}] {}", $name, format_args!($($arg)+))
    };
}

macro_rules! bq_trace {
    ($name:expr, $($arg:tt)+) => {
        log::trace!("[{}] {}", $name, format_args!($($arg)+))
    };
}

pub(crate) use {bq_debug, bq_error, bq_trace, bq_warn};
