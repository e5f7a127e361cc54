//! 从追加日志重建当前状态
//!
//! 日志回放返回某类实体的全部历史修订（按发布顺序，未去重）。
//! `latest_by_id` 把它归约为"每个ID只保留最后发布的修订"的视图。

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;

use crate::entities::{ChatRoom, Message, User};
use crate::topic::Topic;

/// 可写入持久化日志的实体
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// 实体写入的主题
    fn topic(&self) -> Topic;

    /// 用于归约的实体ID
    fn entity_id(&self) -> &str;
}

impl Entity for User {
    fn topic(&self) -> Topic {
        Topic::User(self.id.clone())
    }

    fn entity_id(&self) -> &str {
        self.id.as_str()
    }
}

impl Entity for ChatRoom {
    fn topic(&self) -> Topic {
        Topic::Room(self.id.clone())
    }

    fn entity_id(&self) -> &str {
        self.id.as_str()
    }
}

impl Entity for Message {
    fn topic(&self) -> Topic {
        Topic::Messages(self.room_id.clone())
    }

    fn entity_id(&self) -> &str {
        self.id.as_str()
    }
}

/// 最后发布者胜出：保留每个ID的最后一个修订，顺序按该ID首次出现的位置
pub fn latest_by_id<T: Entity>(history: Vec<T>) -> Vec<T> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut latest: Vec<T> = Vec::new();

    for revision in history {
        match slots.get(revision.entity_id()) {
            Some(&slot) => latest[slot] = revision,
            None => {
                slots.insert(revision.entity_id().to_string(), latest.len());
                latest.push(revision);
            }
        }
    }

    latest
}
