//! 基于 Redis Stream 的持久化日志
//!
//! 每个分区（`users`、`rooms`、`messages.<roomId>`）对应一个流，
//! 键名为 `<prefix>:<partition>`，每条记录包含 `subject` 和 `payload` 两个字段。
//!
//! - 追加：`XADD`
//! - 回放：从 `0-0` 开始 `XREAD BLOCK`，一个空闲超时内没有新记录即视为读尽
//! - 订阅：先用 `XREVRANGE` 固定起点，再循环 `XREAD BLOCK`
//! - 比较后追加：Lua 脚本在修订号哈希 `<prefix>:revisions` 上做 CAS

use std::collections::{HashMap, VecDeque};

use application::{DurableLog, LiveFeed, LogEntry, LogError};
use async_trait::async_trait;
use config::BrokerConfig;
use domain::{Topic, TopicFilter};
use futures_util::stream::{self, StreamExt};
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamRangeReply, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, Client, Script, Value};
use tracing::{debug, info, warn};

use super::error::{RedisError, RedisResult};

const SUBJECT_FIELD: &str = "subject";
const PAYLOAD_FIELD: &str = "payload";
const STREAM_START: &str = "0-0";

/// 订阅读取失败后的重试间隔
const APPEND_VERSIONED_SCRIPT: &str = r#"
local stream_key = KEYS[1]
local revisions_key = KEYS[2]
local subject = ARGV[1]
local expected = tonumber(ARGV[2])

-- 修订号不匹配时拒绝写入
local current = tonumber(redis.call('HGET', revisions_key, subject) or '0')
if current ~= expected then
    return {0, current}
end

redis.call('XADD', stream_key, '*', 'subject', subject, 'payload', ARGV[3])
local next_revision = redis.call('HINCRBY', revisions_key, subject, 1)
return {1, next_revision}
"#;

pub struct RedisStreamLog {
    client: Client,
    writer: MultiplexedConnection,
    config: BrokerConfig,
    append_versioned: Script,
}

impl RedisStreamLog {
    /// 连接 Redis；连接失败直接返回错误，不做重试
    pub async fn connect(config: &BrokerConfig) -> RedisResult<Self> {
        let client = Client::open(config.url.as_str()).map_err(|e| RedisError::ConfigError {
            message: format!("创建 Redis 客户端失败: {}", e),
        })?;
        let writer = client.get_multiplexed_async_connection().await?;

        info!(url = %config.url, prefix = %config.stream_prefix, "Redis 持久化日志已连接");

        Ok(Self {
            client,
            writer,
            config: config.clone(),
            append_versioned: Script::new(APPEND_VERSIONED_SCRIPT),
        })
    }

    fn stream_key(&self, partition: &str) -> String {
        stream_key(&self.config.stream_prefix, partition)
    }

    fn revisions_key(&self) -> String {
        format!("{}:revisions", self.config.stream_prefix)
    }

    fn read_options(&self, count: usize) -> StreamReadOptions {
        StreamReadOptions::default()
            .count(count)
            .block(self.config.replay_idle_timeout().as_millis() as usize)
    }

    /// 阻塞读取使用独立连接，避免阻塞共享的写连接
    async fn reader(&self) -> Result<MultiplexedConnection, LogError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| RedisError::from(e).into())
    }
}

/// 分区名到流键名，`.` 替换为 `:`
pub fn stream_key(prefix: &str, partition: &str) -> String {
    format!("{}:{}", prefix, partition.replace('.', ":"))
}

fn string_field(fields: &HashMap<String, Value>, key: &str) -> Option<String> {
    match fields.get(key) {
        Some(Value::BulkString(bytes)) => String::from_utf8(bytes.clone()).ok(),
        Some(Value::SimpleString(text)) => Some(text.clone()),
        _ => None,
    }
}

fn bytes_field(fields: &HashMap<String, Value>, key: &str) -> Option<Vec<u8>> {
    match fields.get(key) {
        Some(Value::BulkString(bytes)) => Some(bytes.clone()),
        Some(Value::SimpleString(text)) => Some(text.clone().into_bytes()),
        _ => None,
    }
}

/// 解析流记录字段，缺少字段时返回 `None`
fn decode_fields(fields: &HashMap<String, Value>) -> Option<LogEntry> {
    Some(LogEntry {
        subject: string_field(fields, SUBJECT_FIELD)?,
        payload: bytes_field(fields, PAYLOAD_FIELD)?,
    })
}

/// 把一次 XREAD 的结果追加到 `out`，返回读到的最后一个记录ID
fn collect_reply(
    reply: StreamReadReply,
    filter: &TopicFilter,
    out: &mut impl Extend<LogEntry>,
) -> Option<String> {
    let mut last_id = None;
    for stream_key in reply.keys {
        for record in stream_key.ids {
            match decode_fields(&record.map) {
                Some(entry) if filter.matches(&entry.subject) => out.extend(Some(entry)),
                Some(_) => {}
                None => warn!(record_id = %record.id, "流记录缺少 subject/payload 字段，跳过"),
            }
            last_id = Some(record.id);
        }
    }
    last_id
}

struct FeedState {
    conn: MultiplexedConnection,
    key: String,
    filter: TopicFilter,
    last_id: String,
    options: StreamReadOptions,
    pending: VecDeque<LogEntry>,
}

impl FeedState {
    async fn read_batch(&mut self) -> Result<(), redis::RedisError> {
        let reply: Option<StreamReadReply> = self
            .conn
            .xread_options(&[&self.key], &[&self.last_id], &self.options)
            .await?;

        if let Some(reply) = reply {
            if let Some(last_id) = collect_reply(reply, &self.filter, &mut self.pending) {
                self.last_id = last_id;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DurableLog for RedisStreamLog {
    async fn append(&self, topic: &Topic, payload: Vec<u8>) -> Result<(), LogError> {
        let key = self.stream_key(&topic.partition());
        let subject = topic.subject();
        let mut conn = self.writer.clone();

        let record_id: String = conn
            .xadd(
                &key,
                "*",
                &[
                    (SUBJECT_FIELD, subject.as_bytes()),
                    (PAYLOAD_FIELD, payload.as_slice()),
                ],
            )
            .await
            .map_err(|e| LogError::Publish {
                subject: subject.clone(),
                message: RedisError::from(e).to_string(),
            })?;

        debug!(stream = %key, subject = %subject, record_id = %record_id, "记录已追加");
        Ok(())
    }

    async fn append_versioned(
        &self,
        topic: &Topic,
        payload: Vec<u8>,
        expected_revision: u64,
    ) -> Result<u64, LogError> {
        let key = self.stream_key(&topic.partition());
        let subject = topic.subject();
        let mut conn = self.writer.clone();

        let result: Vec<i64> = self
            .append_versioned
            .key(&key)
            .key(self.revisions_key())
            .arg(&subject)
            .arg(expected_revision)
            .arg(payload)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| LogError::Publish {
                subject: subject.clone(),
                message: RedisError::from(e).to_string(),
            })?;

        let &[applied, revision] = result.as_slice() else {
            return Err(RedisError::ProtocolError {
                message: format!("比较后追加脚本返回了意外的结果: {:?}", result),
            }
            .into());
        };
        let revision = u64::try_from(revision).unwrap_or_default();

        if applied == 0 {
            return Err(LogError::Conflict {
                subject,
                expected: expected_revision,
                actual: revision,
            });
        }

        debug!(stream = %key, subject = %subject, revision, "版本化记录已追加");
        Ok(revision)
    }

    async fn replay(
        &self,
        filter: &TopicFilter,
        limit: Option<usize>,
    ) -> Result<Vec<LogEntry>, LogError> {
        let key = self.stream_key(&filter.partition());
        let mut conn = self.reader().await?;
        let mut last_id = STREAM_START.to_string();
        let mut entries: Vec<LogEntry> = Vec::new();

        loop {
            let remaining = limit.map(|limit| limit.saturating_sub(entries.len()));
            if remaining == Some(0) {
                break;
            }
            let count = remaining.map_or(self.config.replay_batch_size, |remaining| {
                remaining.min(self.config.replay_batch_size)
            });

            let reply: Option<StreamReadReply> = conn
                .xread_options(&[&key], &[&last_id], &self.read_options(count))
                .await
                .map_err(RedisError::from)?;

            // 空闲超时内没有新记录，视为已读尽
            let Some(reply) = reply else {
                break;
            };
            match collect_reply(reply, filter, &mut entries) {
                Some(id) => last_id = id,
                None => break,
            }
        }

        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        debug!(stream = %key, filter = %filter, count = entries.len(), "回放完成");
        Ok(entries)
    }

    async fn subscribe(&self, filter: &TopicFilter) -> Result<LiveFeed, LogError> {
        let key = self.stream_key(&filter.partition());
        let mut conn = self.reader().await?;

        // 固定起点：只投递订阅返回之后写入的记录
        let latest: StreamRangeReply = conn
            .xrevrange_count(&key, "+", "-", 1)
            .await
            .map_err(RedisError::from)?;
        let last_id = latest
            .ids
            .first()
            .map(|record| record.id.clone())
            .unwrap_or_else(|| STREAM_START.to_string());

        debug!(stream = %key, filter = %filter, start = %last_id, "实时订阅已建立");

        let state = FeedState {
            conn,
            key,
            filter: filter.clone(),
            last_id,
            options: self.read_options(self.config.replay_batch_size),
            pending: VecDeque::new(),
        };

        let feed = stream::unfold(state, |mut state| async move {
            loop {
                if let Some(entry) = state.pending.pop_front() {
                    return Some((entry, state));
                }
                // 连接失败时结束订阅，由调用方决定是否重新订阅
                if let Err(e) = state.read_batch().await {
                    warn!(stream = %state.key, error = %e, "读取实时记录失败，订阅结束");
                    return None;
                }
            }
        });

        Ok(feed.boxed())
    }
}
