//! 聊天室实体定义
//!
//! 成员在语义上是集合，但按加入顺序以序列形式持久化。
//! 每次变更都生成一个新的修订（`revision` 单调递增），旧修订保留在日志中。

use crate::errors::{DomainError, DomainResult};
use crate::value_objects::{RoomId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// 聊天室实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRoom {
    pub id: RoomId,
    pub name: String,
    pub description: String,
    /// 成员用户ID，保持加入顺序，不含重复
    #[serde(default)]
    pub members: Vec<UserId>,
    pub created_at: Timestamp,
    /// 乐观并发版本号，首个修订为 1
    #[serde(default)]
    pub revision: u64,
}

impl ChatRoom {
    /// 创建新的空房间（修订号 1）
    pub fn new(
        id: RoomId,
        name: impl Into<String>,
        description: impl Into<String>,
        now: Timestamp,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::invalid_argument(
                "name",
                "room name must not be empty",
            ));
        }

        Ok(Self {
            id,
            name,
            description: description.into(),
            members: Vec::new(),
            created_at: now,
            revision: 1,
        })
    }

    pub fn has_member(&self, user_id: &UserId) -> bool {
        self.members.contains(user_id)
    }

    /// 加入成员后的下一个修订；已是成员时返回 `None`
    pub fn with_member(&self, user_id: &UserId) -> Option<Self> {
        if self.has_member(user_id) {
            return None;
        }

        let mut next = self.next_revision();
        next.members.push(user_id.clone());
        Some(next)
    }

    /// 移除成员后的下一个修订，非成员时成员列表保持不变
    pub fn without_member(&self, user_id: &UserId) -> Self {
        let mut next = self.next_revision();
        next.members.retain(|member| member != user_id);
        next
    }

    fn next_revision(&self) -> Self {
        Self {
            revision: self.revision + 1,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn room() -> ChatRoom {
        ChatRoom::new(RoomId::new("r1"), "general", "General chat", Utc::now()).unwrap()
    }

    #[test]
    fn new_room_starts_empty_at_revision_one() {
        let room = room();
        assert!(room.members.is_empty());
        assert_eq!(room.revision, 1);
    }

    #[test]
    fn adding_existing_member_is_a_no_op() {
        let user = UserId::new("u1");
        let joined = room().with_member(&user).unwrap();
        assert_eq!(joined.revision, 2);
        assert_eq!(joined.members, vec![user.clone()]);
        assert!(joined.with_member(&user).is_none());
    }

    #[test]
    fn removing_member_preserves_order_of_others() {
        let (a, b, c) = (UserId::new("a"), UserId::new("b"), UserId::new("c"));
        let room = room()
            .with_member(&a)
            .and_then(|r| r.with_member(&b))
            .and_then(|r| r.with_member(&c))
            .unwrap();

        let left = room.without_member(&b);
        assert_eq!(left.members, vec![a, c]);
        assert_eq!(left.revision, room.revision + 1);
    }

    #[test]
    fn removing_non_member_bumps_revision_only() {
        let room = room();
        let left = room.without_member(&UserId::new("ghost"));
        assert_eq!(left.members, room.members);
        assert_eq!(left.revision, 2);
    }

    #[test]
    fn blank_name_is_rejected() {
        assert!(ChatRoom::new(RoomId::generate(), "", "", Utc::now()).is_err());
    }
}
