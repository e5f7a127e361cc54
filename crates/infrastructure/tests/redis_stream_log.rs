//! Redis Stream 持久化日志集成测试
//!
//! 需要本地 Redis 实例，设置 REDIS_INTEGRATION_TEST 后运行。

use std::sync::Arc;
use std::time::Duration;

use application::{
    ChatService, ChatServiceDependencies, ControlPlane, DurableLog, JoinRoomRequest,
    ListRoomsRequest, LogError, LogStore, SystemClock,
};
use chrono::Utc;
use config::BrokerConfig;
use domain::{Message, RoomId, Topic, TopicFilter, UserId};
use futures_util::StreamExt;
use infrastructure::RedisStreamLog;
use uuid::Uuid;

fn integration_enabled() -> bool {
    std::env::var("REDIS_INTEGRATION_TEST").is_ok()
}

/// 每个测试使用独立前缀，互不干扰
fn test_config() -> BrokerConfig {
    BrokerConfig {
        url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
        stream_prefix: format!("chat-test-{}", Uuid::new_v4()),
        replay_idle_timeout_ms: 200,
        replay_batch_size: 2,
    }
}

#[tokio::test]
async fn test_replay_reads_every_batch_in_order() {
    if !integration_enabled() {
        return;
    }

    let log = RedisStreamLog::connect(&test_config()).await.unwrap();
    for i in 0..5 {
        log.append(&Topic::User(UserId::new(format!("u{i}"))), vec![b'0' + i])
            .await
            .unwrap();
    }

    let entries = log.replay(&TopicFilter::AllUsers, None).await.unwrap();
    let subjects: Vec<_> = entries.iter().map(|e| e.subject.as_str()).collect();
    assert_eq!(subjects, vec!["users.u0", "users.u1", "users.u2", "users.u3", "users.u4"]);

    let limited = log.replay(&TopicFilter::AllUsers, Some(3)).await.unwrap();
    assert_eq!(limited.len(), 3);
}

#[tokio::test]
async fn test_empty_partition_replays_as_empty() {
    if !integration_enabled() {
        return;
    }

    let log = RedisStreamLog::connect(&test_config()).await.unwrap();
    let entries = log.replay(&TopicFilter::AllRooms, None).await.unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn test_versioned_append_rejects_stale_revision() {
    if !integration_enabled() {
        return;
    }

    let log = RedisStreamLog::connect(&test_config()).await.unwrap();
    let topic = Topic::Room(RoomId::new("r1"));

    assert_eq!(log.append_versioned(&topic, b"a".to_vec(), 0).await.unwrap(), 1);
    assert_eq!(log.append_versioned(&topic, b"b".to_vec(), 1).await.unwrap(), 2);

    let err = log
        .append_versioned(&topic, b"c".to_vec(), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, LogError::Conflict { actual: 2, .. }));

    let entries = log.replay(&TopicFilter::AllRooms, None).await.unwrap();
    assert_eq!(entries.len(), 2);
}

#[tokio::test]
async fn test_subscription_only_sees_later_messages() {
    if !integration_enabled() {
        return;
    }

    let log = Arc::new(RedisStreamLog::connect(&test_config()).await.unwrap());
    let store = LogStore::new(log.clone());
    let room_id = RoomId::new("r1");

    let before = Message::new(room_id.clone(), UserId::new("u1"), "alice", "before", Utc::now());
    store.append(&before).await.unwrap();

    let mut feed = store.subscribe_room(&room_id).await.unwrap();
    let after = Message::new(room_id.clone(), UserId::new("u1"), "alice", "after", Utc::now());
    store.append(&after).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(2), feed.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received, after);
}

#[tokio::test]
async fn test_service_seeds_and_joins_over_redis() {
    if !integration_enabled() {
        return;
    }

    let log = Arc::new(RedisStreamLog::connect(&test_config()).await.unwrap());
    let service = ChatService::new(ChatServiceDependencies {
        store: LogStore::new(log),
        clock: Arc::new(SystemClock),
    });

    let rooms = service
        .list_rooms(ListRoomsRequest::default())
        .await
        .unwrap()
        .rooms;
    assert_eq!(rooms.len(), 2);

    let joined = service
        .join_room(JoinRoomRequest {
            room_id: rooms[0].id.clone(),
            user_id: UserId::new("u1"),
        })
        .await
        .unwrap();
    assert!(joined.success);
    assert_eq!(joined.room.unwrap().members, vec![UserId::new("u1")]);
}

#[tokio::test]
async fn test_subscription_ends_when_stream_becomes_unreadable() {
    if !integration_enabled() {
        return;
    }

    let config = test_config();
    let log = RedisStreamLog::connect(&config).await.unwrap();
    let filter = TopicFilter::RoomMessages(RoomId::new("r1"));
    let mut feed = log.subscribe(&filter).await.unwrap();

    // 键被覆盖为字符串后 XREAD 返回 WRONGTYPE
    let key = infrastructure::redis::stream_key(&config.stream_prefix, &filter.partition());
    let client = redis::Client::open(config.url.as_str()).unwrap();
    let mut conn = client.get_multiplexed_async_connection().await.unwrap();
    redis::cmd("SET")
        .arg(&key)
        .arg("not-a-stream")
        .query_async::<()>(&mut conn)
        .await
        .unwrap();

    let next = tokio::time::timeout(Duration::from_secs(2), feed.next())
        .await
        .unwrap();
    assert!(next.is_none());
}
