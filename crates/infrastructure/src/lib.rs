//! 基础设施层实现。
//!
//! 提供应用层 `DurableLog` 接口的 Redis Stream 适配器。

pub mod redis;

pub use crate::redis::{RedisError, RedisResult, RedisStreamLog};
