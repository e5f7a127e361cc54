//! 用户实体定义
//!
//! 用户没有独立的存储记录，每次上线/下线都会追加一条新的在线状态修订。

use crate::errors::{DomainError, DomainResult};
use crate::value_objects::{Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 用户在线状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Online,
    Offline,
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserStatus::Online => write!(f, "online"),
            UserStatus::Offline => write!(f, "offline"),
        }
    }
}

/// 用户实体（在线状态记录）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub status: UserStatus,
    pub last_seen: Timestamp,
}

impl User {
    /// 创建一条上线记录
    pub fn online(id: UserId, username: impl Into<String>, now: Timestamp) -> DomainResult<Self> {
        let username = username.into();
        Self::validate_username(&username)?;

        Ok(Self {
            id,
            username,
            status: UserStatus::Online,
            last_seen: now,
        })
    }

    /// 基于当前记录生成下线修订
    pub fn went_offline(&self, now: Timestamp) -> Self {
        Self {
            status: UserStatus::Offline,
            last_seen: now,
            ..self.clone()
        }
    }

    pub fn is_online(&self) -> bool {
        self.status == UserStatus::Online
    }

    fn validate_username(username: &str) -> DomainResult<()> {
        if username.trim().is_empty() {
            return Err(DomainError::invalid_argument(
                "username",
                "username must not be empty",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn online_then_offline_keeps_identity() {
        let user = User::online(UserId::new("u1"), "alice", Utc::now()).unwrap();
        assert!(user.is_online());

        let later = user.last_seen + chrono::Duration::seconds(5);
        let offline = user.went_offline(later);
        assert_eq!(offline.id, user.id);
        assert_eq!(offline.username, "alice");
        assert_eq!(offline.status, UserStatus::Offline);
        assert_eq!(offline.last_seen, later);
    }

    #[test]
    fn blank_username_is_rejected() {
        assert!(User::online(UserId::new("u1"), "  ", Utc::now()).is_err());
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&UserStatus::Offline).unwrap(),
            "\"offline\""
        );
    }
}
