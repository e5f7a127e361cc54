//! 内存实现的持久化日志（用于测试和单进程运行）
//!
//! 实时订阅按游标读取保留的记录，订阅者落后时只会延迟，不会丢失记录。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use domain::{Topic, TopicFilter};
use futures_util::stream::{self, StreamExt};
use tokio::sync::{watch, RwLock};

use crate::log::{DurableLog, LiveFeed, LogEntry, LogError};

#[derive(Default)]
struct MemoryInner {
    entries: Vec<LogEntry>,
    revisions: HashMap<String, u64>,
}

pub struct MemoryLog {
    inner: Arc<RwLock<MemoryInner>>,
    /// 当前记录总数，每次写入后更新以唤醒订阅者
    appended: watch::Sender<usize>,
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLog {
    pub fn new() -> Self {
        let (appended, _) = watch::channel(0);
        Self {
            inner: Arc::new(RwLock::new(MemoryInner::default())),
            appended,
        }
    }

    /// 当前保留的记录总数
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn publish(&self, inner: &mut MemoryInner, entry: LogEntry) {
        inner.entries.push(entry);
        self.appended.send_replace(inner.entries.len());
    }
}

struct FeedCursor {
    inner: Arc<RwLock<MemoryInner>>,
    appended: watch::Receiver<usize>,
    filter: TopicFilter,
    position: usize,
}

impl FeedCursor {
    /// 从游标处找下一条匹配记录，没有则把游标移到末尾
    async fn advance(&mut self) -> Option<LogEntry> {
        let inner = self.inner.read().await;
        let pending = inner.entries.get(self.position..).unwrap_or_default();
        match pending
            .iter()
            .position(|entry| self.filter.matches(&entry.subject))
        {
            Some(offset) => {
                self.position += offset + 1;
                Some(pending[offset].clone())
            }
            None => {
                self.position = inner.entries.len();
                None
            }
        }
    }
}

#[async_trait]
impl DurableLog for MemoryLog {
    async fn append(&self, topic: &Topic, payload: Vec<u8>) -> Result<(), LogError> {
        let mut inner = self.inner.write().await;
        let entry = LogEntry {
            subject: topic.subject(),
            payload,
        };
        self.publish(&mut inner, entry);
        Ok(())
    }

    async fn append_versioned(
        &self,
        topic: &Topic,
        payload: Vec<u8>,
        expected_revision: u64,
    ) -> Result<u64, LogError> {
        let mut inner = self.inner.write().await;
        let subject = topic.subject();
        let actual = inner.revisions.get(&subject).copied().unwrap_or(0);
        if actual != expected_revision {
            return Err(LogError::Conflict {
                subject,
                expected: expected_revision,
                actual,
            });
        }

        let next = expected_revision + 1;
        inner.revisions.insert(subject.clone(), next);
        self.publish(&mut inner, LogEntry { subject, payload });
        Ok(next)
    }

    async fn replay(
        &self,
        filter: &TopicFilter,
        limit: Option<usize>,
    ) -> Result<Vec<LogEntry>, LogError> {
        let inner = self.inner.read().await;
        Ok(inner
            .entries
            .iter()
            .filter(|entry| filter.matches(&entry.subject))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn subscribe(&self, filter: &TopicFilter) -> Result<LiveFeed, LogError> {
        // 持有读锁固定起点，保证返回后的每次写入都能被看到
        let inner = self.inner.read().await;
        let cursor = FeedCursor {
            inner: Arc::clone(&self.inner),
            appended: self.appended.subscribe(),
            filter: filter.clone(),
            position: inner.entries.len(),
        };
        drop(inner);

        let feed = stream::unfold(cursor, |mut cursor| async move {
            loop {
                if let Some(entry) = cursor.advance().await {
                    return Some((entry, cursor));
                }
                // 日志被释放时结束订阅
                if cursor.appended.changed().await.is_err() {
                    return None;
                }
            }
        });

        Ok(feed.boxed())
    }
}
