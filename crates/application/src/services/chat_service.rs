use std::sync::Arc;

use async_trait::async_trait;
use domain::{latest_by_id, ChatRoom, RoomId, User};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::{
    clock::Clock,
    control::ControlPlane,
    dto::{
        JoinRoomRequest, JoinRoomResponse, LeaveRoomRequest, LeaveRoomResponse, ListRoomsRequest,
        ListRoomsResponse, ListUsersRequest, ListUsersResponse,
    },
    error::ApplicationError,
    log::{LogError, LogStore},
};

pub const ROOM_NOT_FOUND: &str = "Room not found";
pub const SAVE_FAILED: &str = "Failed to save room";

/// 房间修订冲突时的最大读-改-写次数
const MAX_MUTATION_ATTEMPTS: usize = 3;

/// 房间列表为空时自动创建的房间
const SEED_ROOMS: [(&str, &str); 2] = [
    ("general", "General discussion"),
    ("random", "Off-topic chat"),
];

pub struct ChatServiceDependencies {
    pub store: LogStore,
    pub clock: Arc<dyn Clock>,
}

/// 实例内缓存，只记录本实例自动创建的房间，不是权威状态
#[derive(Default)]
struct ServiceCache {
    seeded_rooms: Vec<ChatRoom>,
    /// 上次播种中途失败，下次列出房间时补齐剩余的默认房间
    seeding_incomplete: bool,
}

enum MutationOutcome {
    NotFound,
    Unchanged(ChatRoom),
    Saved(ChatRoom),
    SaveFailed,
}

/// 控制面服务
///
/// 每次调用都回放日志；查询共享读锁，播种和成员变更独占写锁。
pub struct ChatService {
    deps: ChatServiceDependencies,
    cache: RwLock<ServiceCache>,
}

impl ChatService {
    pub fn new(deps: ChatServiceDependencies) -> Self {
        Self {
            deps,
            cache: RwLock::new(ServiceCache::default()),
        }
    }

    async fn current_users(&self) -> Result<Vec<User>, ApplicationError> {
        Ok(latest_by_id(self.deps.store.users().await?))
    }

    /// 回放得到的房间视图；回放为空时退回到本实例播种的房间
    async fn current_rooms(&self, cache: &ServiceCache) -> Result<Vec<ChatRoom>, ApplicationError> {
        let rooms = latest_by_id(self.deps.store.rooms().await?);
        if rooms.is_empty() && !cache.seeded_rooms.is_empty() {
            debug!("回放结果为空，使用本实例播种的房间");
            return Ok(cache.seeded_rooms.clone());
        }
        Ok(rooms)
    }

    async fn seed_rooms(&self) -> Result<Vec<ChatRoom>, ApplicationError> {
        let mut cache = self.cache.write().await;

        // 等待写锁期间可能已有其他调用完成播种
        let mut rooms = self.current_rooms(&cache).await?;
        if !rooms.is_empty() && !cache.seeding_incomplete {
            return Ok(rooms);
        }

        let now = self.deps.clock.now();
        for (name, description) in SEED_ROOMS {
            if cache.seeded_rooms.iter().any(|room| room.name == name) {
                continue;
            }
            let room = ChatRoom::new(RoomId::generate(), name, description, now)?;
            if let Err(e) = self.deps.store.append_room(&room).await {
                warn!(room = name, error = %e, "创建默认房间失败");
                cache.seeding_incomplete = true;
                return Err(e.into());
            }
            rooms.push(room.clone());
            cache.seeded_rooms.push(room);
        }

        info!(count = cache.seeded_rooms.len(), "房间列表为空，已创建默认房间");
        cache.seeding_incomplete = false;
        Ok(rooms)
    }

    /// 在写锁内对房间执行带乐观并发控制的读-改-写
    async fn mutate_room<F>(
        &self,
        room_id: &RoomId,
        change: F,
    ) -> Result<MutationOutcome, ApplicationError>
    where
        F: Fn(&ChatRoom) -> Option<ChatRoom>,
    {
        let cache = self.cache.write().await;

        for attempt in 1..=MAX_MUTATION_ATTEMPTS {
            let rooms = self.current_rooms(&cache).await?;
            let Some(current) = rooms.into_iter().find(|room| &room.id == room_id) else {
                return Ok(MutationOutcome::NotFound);
            };

            let Some(next) = change(&current) else {
                return Ok(MutationOutcome::Unchanged(current));
            };

            match self.deps.store.append_room(&next).await {
                Ok(()) => return Ok(MutationOutcome::Saved(next)),
                Err(LogError::Conflict { expected, actual, .. }) => {
                    warn!(
                        room_id = %room_id,
                        attempt,
                        expected,
                        actual,
                        "房间修订冲突，重新读取后重试"
                    );
                }
                Err(e) => {
                    error!(room_id = %room_id, error = %e, "保存房间失败");
                    return Ok(MutationOutcome::SaveFailed);
                }
            }
        }

        error!(room_id = %room_id, "房间修订冲突次数过多，放弃保存");
        Ok(MutationOutcome::SaveFailed)
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl ControlPlane for ChatService {
    async fn list_users(
        &self,
        request: ListUsersRequest,
    ) -> Result<ListUsersResponse, ApplicationError> {
        let _cache = self.cache.read().await;
        let users: Vec<User> = self
            .current_users()
            .await?
            .into_iter()
            .filter(|user| contains_ignore_case(&user.username, &request.filter))
            .collect();

        debug!(filter = %request.filter, count = users.len(), "列出用户");
        Ok(ListUsersResponse { users })
    }

    async fn list_rooms(
        &self,
        request: ListRoomsRequest,
    ) -> Result<ListRoomsResponse, ApplicationError> {
        let (rooms, seeding_incomplete) = {
            let cache = self.cache.read().await;
            (self.current_rooms(&cache).await?, cache.seeding_incomplete)
        };
        let rooms = if rooms.is_empty() || seeding_incomplete {
            self.seed_rooms().await?
        } else {
            rooms
        };

        let rooms: Vec<ChatRoom> = rooms
            .into_iter()
            .filter(|room| contains_ignore_case(&room.name, &request.filter))
            .collect();

        debug!(filter = %request.filter, count = rooms.len(), "列出房间");
        Ok(ListRoomsResponse { rooms })
    }

    async fn join_room(
        &self,
        request: JoinRoomRequest,
    ) -> Result<JoinRoomResponse, ApplicationError> {
        let user_id = request.user_id;
        let outcome = self
            .mutate_room(&request.room_id, |room| room.with_member(&user_id))
            .await?;

        Ok(match outcome {
            MutationOutcome::NotFound => JoinRoomResponse::failure(ROOM_NOT_FOUND),
            MutationOutcome::SaveFailed => JoinRoomResponse::failure(SAVE_FAILED),
            MutationOutcome::Unchanged(room) => {
                debug!(room_id = %room.id, user_id = %user_id, "用户已在房间中");
                JoinRoomResponse::joined(room)
            }
            MutationOutcome::Saved(room) => {
                info!(room_id = %room.id, user_id = %user_id, revision = room.revision, "用户加入房间");
                JoinRoomResponse::joined(room)
            }
        })
    }

    async fn leave_room(
        &self,
        request: LeaveRoomRequest,
    ) -> Result<LeaveRoomResponse, ApplicationError> {
        let user_id = request.user_id;
        let outcome = self
            .mutate_room(&request.room_id, |room| Some(room.without_member(&user_id)))
            .await?;

        Ok(match outcome {
            MutationOutcome::NotFound => LeaveRoomResponse::failure(ROOM_NOT_FOUND),
            MutationOutcome::SaveFailed => LeaveRoomResponse::failure(SAVE_FAILED),
            MutationOutcome::Unchanged(_) | MutationOutcome::Saved(_) => {
                info!(room_id = %request.room_id, user_id = %user_id, "用户离开房间");
                LeaveRoomResponse::left()
            }
        })
    }
}
