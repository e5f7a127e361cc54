//! 持久化日志抽象
//!
//! `DurableLog` 是后端无关的原始接口（主题 + 字节负载），
//! `LogStore` 在其上提供按实体类型的 JSON 读写：
//! - `append`：序列化并发布，不等待订阅者投递
//! - `replay_all`：从最早保留的记录读到空闲超时为止，返回全部历史修订（未去重）
//! - `read_recent`：同样的机制，但按条数截止
//! - `subscribe_room`：房间消息的实时订阅

use std::sync::Arc;

use async_trait::async_trait;
use domain::{ChatRoom, Entity, Message, RoomId, Topic, TopicFilter, User};
use futures_util::stream::{BoxStream, StreamExt};
use thiserror::Error;
use tracing::{debug, warn};

/// 日志中的一条原始记录
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub subject: String,
    pub payload: Vec<u8>,
}

/// 实时订阅流，丢弃即取消订阅
pub type LiveFeed = BoxStream<'static, LogEntry>;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("log connection error: {0}")]
    Connection(String),
    #[error("publish to {subject} failed: {message}")]
    Publish { subject: String, message: String },
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("revision conflict on {subject}: expected {expected}, found {actual}")]
    Conflict {
        subject: String,
        expected: u64,
        actual: u64,
    },
}

impl From<serde_json::Error> for LogError {
    fn from(err: serde_json::Error) -> Self {
        LogError::Serialization(err.to_string())
    }
}

#[async_trait]
pub trait DurableLog: Send + Sync {
    /// 追加一条记录，要么整体成功要么失败
    async fn append(&self, topic: &Topic, payload: Vec<u8>) -> Result<(), LogError>;

    /// 比较后追加：仅当主题当前修订号等于 `expected_revision` 时写入，返回新修订号
    async fn append_versioned(
        &self,
        topic: &Topic,
        payload: Vec<u8>,
        expected_revision: u64,
    ) -> Result<u64, LogError>;

    /// 从最早保留的位置按发布顺序读取，直到空闲超时或达到 `limit`
    async fn replay(
        &self,
        filter: &TopicFilter,
        limit: Option<usize>,
    ) -> Result<Vec<LogEntry>, LogError>;

    /// 订阅调用返回之后发布的记录
    async fn subscribe(&self, filter: &TopicFilter) -> Result<LiveFeed, LogError>;
}

/// 按实体类型封装的日志存储
#[derive(Clone)]
pub struct LogStore {
    log: Arc<dyn DurableLog>,
}

impl LogStore {
    pub fn new(log: Arc<dyn DurableLog>) -> Self {
        Self { log }
    }

    pub async fn append<T: Entity>(&self, entity: &T) -> Result<(), LogError> {
        let payload = serde_json::to_vec(entity)?;
        self.log.append(&entity.topic(), payload).await
    }

    /// 写入房间的新修订，要求日志中的上一个修订号恰好是 `room.revision - 1`
    pub async fn append_room(&self, room: &ChatRoom) -> Result<(), LogError> {
        let payload = serde_json::to_vec(room)?;
        let expected = room.revision.saturating_sub(1);
        let stored = self
            .log
            .append_versioned(&room.topic(), payload, expected)
            .await?;

        debug!(room_id = %room.id, revision = stored, "房间修订已写入");
        Ok(())
    }

    /// 回放全部历史修订，格式错误的记录会被跳过
    pub async fn replay_all<T: Entity>(&self, filter: &TopicFilter) -> Result<Vec<T>, LogError> {
        let entries = self.log.replay(filter, None).await?;
        Ok(decode_entries(filter, entries))
    }

    pub async fn users(&self) -> Result<Vec<User>, LogError> {
        self.replay_all(&TopicFilter::AllUsers).await
    }

    pub async fn rooms(&self) -> Result<Vec<ChatRoom>, LogError> {
        self.replay_all(&TopicFilter::AllRooms).await
    }

    /// 读取房间主题最早保留的 `limit` 条消息
    pub async fn read_recent(
        &self,
        room_id: &RoomId,
        limit: usize,
    ) -> Result<Vec<Message>, LogError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let filter = TopicFilter::RoomMessages(room_id.clone());
        let entries = self.log.replay(&filter, Some(limit)).await?;
        Ok(decode_entries(&filter, entries))
    }

    /// 订阅房间消息，无法解析的投递被直接丢弃
    pub async fn subscribe_room(
        &self,
        room_id: &RoomId,
    ) -> Result<BoxStream<'static, Message>, LogError> {
        let feed = self
            .log
            .subscribe(&TopicFilter::RoomMessages(room_id.clone()))
            .await?;

        let messages = feed.filter_map(|entry| async move {
            match serde_json::from_slice::<Message>(&entry.payload) {
                Ok(message) => Some(message),
                Err(e) => {
                    debug!(subject = %entry.subject, error = %e, "丢弃无法解析的实时消息");
                    None
                }
            }
        });

        Ok(messages.boxed())
    }
}

fn decode_entries<T: Entity>(filter: &TopicFilter, entries: Vec<LogEntry>) -> Vec<T> {
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_slice::<T>(&entry.payload) {
            Ok(entity) => Some(entity),
            Err(e) => {
                warn!(
                    filter = %filter,
                    subject = %entry.subject,
                    error = %e,
                    "跳过无法解析的日志记录"
                );
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLog;
    use chrono::Utc;
    use domain::UserId;
    use std::time::Duration;

    fn store() -> (Arc<MemoryLog>, LogStore) {
        let log = Arc::new(MemoryLog::new());
        (log.clone(), LogStore::new(log))
    }

    #[tokio::test]
    async fn replay_returns_every_revision_in_publish_order() {
        let (_, store) = store();
        let user = User::online(UserId::new("u1"), "alice", Utc::now()).unwrap();
        store.append(&user).await.unwrap();
        store.append(&user.went_offline(Utc::now())).await.unwrap();

        let history = store.users().await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].is_online());
        assert!(!history[1].is_online());
    }

    #[tokio::test]
    async fn malformed_records_are_skipped_during_replay() {
        let (log, store) = store();
        let user = User::online(UserId::new("u1"), "alice", Utc::now()).unwrap();
        log.append(&Topic::User(UserId::new("bad")), b"{not json".to_vec())
            .await
            .unwrap();
        store.append(&user).await.unwrap();

        let users = store.users().await.unwrap();
        assert_eq!(users, vec![user]);
    }

    #[tokio::test]
    async fn stale_room_revision_is_rejected() {
        let (_, store) = store();
        let room = ChatRoom::new(RoomId::new("r1"), "general", "", Utc::now()).unwrap();
        store.append_room(&room).await.unwrap();

        let first = room.with_member(&UserId::new("a")).unwrap();
        let second = room.with_member(&UserId::new("b")).unwrap();
        store.append_room(&first).await.unwrap();

        let err = store.append_room(&second).await.unwrap_err();
        assert!(matches!(
            err,
            LogError::Conflict {
                expected: 1,
                actual: 2,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn read_recent_is_bounded_by_count() {
        let (_, store) = store();
        let room_id = RoomId::new("r1");
        for i in 0..5 {
            let message = Message::new(
                room_id.clone(),
                UserId::new("u1"),
                "alice",
                format!("m{i}"),
                Utc::now(),
            );
            store.append(&message).await.unwrap();
        }

        let history = store.read_recent(&room_id, 3).await.unwrap();
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m0", "m1", "m2"]);
        assert!(store.read_recent(&room_id, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn room_subscription_drops_malformed_deliveries() {
        let (log, store) = store();
        let room_id = RoomId::new("r1");
        let mut feed = store.subscribe_room(&room_id).await.unwrap();

        log.append(&Topic::Messages(room_id.clone()), b"garbage".to_vec())
            .await
            .unwrap();
        let message = Message::new(room_id, UserId::new("u1"), "alice", "hello", Utc::now());
        store.append(&message).await.unwrap();

        let received = tokio::time::timeout(Duration::from_secs(1), feed.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, message);
    }
}
