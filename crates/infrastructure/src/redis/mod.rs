//! Redis Stream 持久化日志模块

pub mod error;
pub mod stream_log;

// 重新导出
pub use error::*;
pub use stream_log::*;
