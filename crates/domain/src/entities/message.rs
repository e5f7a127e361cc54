//! 消息实体定义
//!
//! 消息发布后不可变，永久写入所在房间的消息主题。

use crate::value_objects::{MessageId, RoomId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// 聊天消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub room_id: RoomId,
    pub user_id: UserId,
    /// 发送时的用户名快照
    pub username: String,
    pub content: String,
    pub timestamp: Timestamp,
}

impl Message {
    pub fn new(
        room_id: RoomId,
        user_id: UserId,
        username: impl Into<String>,
        content: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: MessageId::generate(),
            room_id,
            user_id,
            username: username.into(),
            content: content.into(),
            timestamp,
        }
    }
}
