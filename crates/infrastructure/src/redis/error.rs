//! Redis 错误类型定义

use application::LogError;
use thiserror::Error;

/// Redis 操作错误
#[derive(Error, Debug)]
pub enum RedisError {
    /// 连接错误
    #[error("Redis 连接错误: {message}")]
    ConnectionError { message: String },

    /// 命令执行错误
    #[error("Redis 命令错误: {message}")]
    CommandError { message: String },

    /// 返回值格式不符合预期
    #[error("Redis 响应格式错误: {message}")]
    ProtocolError { message: String },

    /// 配置错误
    #[error("配置错误: {message}")]
    ConfigError { message: String },
}

/// Redis 结果类型
pub type RedisResult<T> = Result<T, RedisError>;

impl From<redis::RedisError> for RedisError {
    fn from(err: redis::RedisError) -> Self {
        match err.kind() {
            redis::ErrorKind::InvalidClientConfig => RedisError::ConfigError {
                message: err.to_string(),
            },
            redis::ErrorKind::TypeError => RedisError::ProtocolError {
                message: err.to_string(),
            },
            redis::ErrorKind::ResponseError | redis::ErrorKind::ExtensionError => {
                RedisError::CommandError {
                    message: err.to_string(),
                }
            }
            _ => RedisError::ConnectionError {
                message: err.to_string(),
            },
        }
    }
}

impl From<RedisError> for LogError {
    fn from(err: RedisError) -> Self {
        match err {
            RedisError::ProtocolError { message } => LogError::Serialization(message),
            other => LogError::Connection(other.to_string()),
        }
    }
}
