//! 领域实体定义
//!
//! 包含系统的核心实体：用户、聊天室、消息。

pub mod chatroom;
pub mod message;
pub mod user;

pub use chatroom::ChatRoom;
pub use message::Message;
pub use user::{User, UserStatus};
