use domain::DomainError;
use thiserror::Error;

use crate::log::LogError;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("log store error: {0}")]
    Log(#[from] LogError),
    /// 控制面 RPC 不可达或返回了非业务性的失败
    #[error("transport error: {0}")]
    Transport(String),
    #[error("failed to join room: {0}")]
    JoinRejected(String),
    #[error("failed to leave room: {0}")]
    LeaveRejected(String),
    #[error("not in any room")]
    NotInRoom,
    #[error("client is closed")]
    Closed,
}

impl ApplicationError {
    pub fn transport(message: impl Into<String>) -> Self {
        ApplicationError::Transport(message.into())
    }
}
