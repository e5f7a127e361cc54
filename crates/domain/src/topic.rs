//! 持久化主题命名
//!
//! 所有状态都写入层级命名的追加日志：
//! - `users.<userId>`：用户的每一次状态修订
//! - `rooms.<roomId>`：聊天室的每一次修订
//! - `messages.<roomId>`：房间内的聊天消息
//!
//! 每个主题归属一个分区（物理流）：`users`、`rooms` 或 `messages.<roomId>`。

use std::fmt;

use crate::errors::{DomainError, DomainResult};
use crate::value_objects::{RoomId, UserId};

const USERS: &str = "users";
const ROOMS: &str = "rooms";
const MESSAGES: &str = "messages";

/// 单条记录写入的具体主题
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    User(UserId),
    Room(RoomId),
    Messages(RoomId),
}

impl Topic {
    /// 完整主题名，例如 `rooms.<roomId>`
    pub fn subject(&self) -> String {
        match self {
            Topic::User(id) => format!("{USERS}.{id}"),
            Topic::Room(id) => format!("{ROOMS}.{id}"),
            Topic::Messages(id) => format!("{MESSAGES}.{id}"),
        }
    }

    /// 主题所在的分区
    pub fn partition(&self) -> String {
        match self {
            Topic::User(_) => USERS.to_string(),
            Topic::Room(_) => ROOMS.to_string(),
            Topic::Messages(id) => format!("{MESSAGES}.{id}"),
        }
    }

    /// 从主题名解析
    pub fn parse(subject: &str) -> DomainResult<Self> {
        let (class, id) = subject
            .split_once('.')
            .filter(|(_, id)| !id.is_empty())
            .ok_or_else(|| DomainError::InvalidSubject(subject.to_string()))?;

        match class {
            USERS => Ok(Topic::User(UserId::from(id))),
            ROOMS => Ok(Topic::Room(RoomId::from(id))),
            MESSAGES => Ok(Topic::Messages(RoomId::from(id))),
            _ => Err(DomainError::InvalidSubject(subject.to_string())),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.subject())
    }
}

/// 回放或订阅时使用的主题过滤器
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TopicFilter {
    /// `users.>`
    AllUsers,
    /// `rooms.>`
    AllRooms,
    /// `messages.<roomId>`
    RoomMessages(RoomId),
}

impl TopicFilter {
    /// 过滤器的模式串
    pub fn pattern(&self) -> String {
        match self {
            TopicFilter::AllUsers => format!("{USERS}.>"),
            TopicFilter::AllRooms => format!("{ROOMS}.>"),
            TopicFilter::RoomMessages(id) => format!("{MESSAGES}.{id}"),
        }
    }

    /// 过滤器覆盖的分区，一个过滤器只落在一个分区上
    pub fn partition(&self) -> String {
        match self {
            TopicFilter::AllUsers => USERS.to_string(),
            TopicFilter::AllRooms => ROOMS.to_string(),
            TopicFilter::RoomMessages(id) => format!("{MESSAGES}.{id}"),
        }
    }

    /// 按令牌匹配主题：`*` 匹配一个令牌，`>` 匹配其后的一个或多个令牌
    pub fn matches(&self, subject: &str) -> bool {
        subject_matches(&self.pattern(), subject)
    }
}

impl fmt::Display for TopicFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern())
    }
}

fn subject_matches(pattern: &str, subject: &str) -> bool {
    let mut subject_tokens = subject.split('.');

    for token in pattern.split('.') {
        match token {
            ">" => return subject_tokens.next().is_some(),
            "*" => {
                if subject_tokens.next().is_none() {
                    return false;
                }
            }
            literal => {
                if subject_tokens.next() != Some(literal) {
                    return false;
                }
            }
        }
    }

    subject_tokens.next().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subjects_follow_hierarchical_naming() {
        let room = RoomId::new("r1");
        assert_eq!(Topic::Room(room.clone()).subject(), "rooms.r1");
        assert_eq!(Topic::Messages(room.clone()).subject(), "messages.r1");
        assert_eq!(Topic::User(UserId::new("u1")).subject(), "users.u1");

        assert_eq!(Topic::Room(room.clone()).partition(), "rooms");
        assert_eq!(Topic::Messages(room).partition(), "messages.r1");
    }

    #[test]
    fn wildcard_filters_match_only_their_class() {
        assert!(TopicFilter::AllUsers.matches("users.u1"));
        assert!(!TopicFilter::AllUsers.matches("users"));
        assert!(!TopicFilter::AllUsers.matches("rooms.r1"));
        assert!(TopicFilter::AllRooms.matches("rooms.r1"));

        let filter = TopicFilter::RoomMessages(RoomId::new("r1"));
        assert!(filter.matches("messages.r1"));
        assert!(!filter.matches("messages.r2"));
        assert!(!filter.matches("messages.r1.extra"));
    }

    #[test]
    fn single_token_wildcard() {
        assert!(subject_matches("messages.*", "messages.r1"));
        assert!(!subject_matches("messages.*", "messages.r1.x"));
        assert!(subject_matches("a.>", "a.b.c"));
    }

    #[test]
    fn parse_round_trips_subject() {
        let topic = Topic::Messages(RoomId::new("abc"));
        assert_eq!(Topic::parse(&topic.subject()).unwrap(), topic);
        assert!(Topic::parse("orders.1").is_err());
        assert!(Topic::parse("rooms.").is_err());
    }
}
