//! 参与者客户端
//!
//! 一个客户端代表一个在线用户：
//! - 构造时发布上线记录
//! - 房间操作经由控制面完成
//! - 聊天消息直接写入房间消息主题，不经过控制面
//! - 任一时刻最多持有一个房间的实时订阅，收到的消息推入有界入站队列

use std::sync::Arc;

use domain::{ChatRoom, Message, RoomId, User, UserId};
use futures_util::stream::{BoxStream, StreamExt};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    clock::Clock,
    control::ControlPlane,
    dto::{JoinRoomRequest, LeaveRoomRequest, ListRoomsRequest, ListUsersRequest},
    error::ApplicationError,
    log::LogStore,
};

const DEFAULT_INBOUND_CAPACITY: usize = 100;

#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// 入站队列容量，队列满时转发任务阻塞等待
    pub inbound_capacity: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
        }
    }
}

pub struct ClientDependencies {
    pub store: LogStore,
    pub control: Arc<dyn ControlPlane>,
    pub clock: Arc<dyn Clock>,
}

/// 当前房间及其订阅，每个订阅独占一个取消令牌
struct ActiveRoom {
    room: ChatRoom,
    teardown: CancellationToken,
    forwarder: JoinHandle<()>,
}

impl ActiveRoom {
    /// 取消订阅并等待转发任务退出，返回后不会再有该房间的消息入队
    async fn stop(mut self) {
        self.teardown.cancel();
        if let Err(e) = (&mut self.forwarder).await {
            warn!(room_id = %self.room.id, error = %e, "转发任务异常退出");
        }
    }
}

impl Drop for ActiveRoom {
    fn drop(&mut self) {
        self.teardown.cancel();
    }
}

struct ClientState {
    active: Option<ActiveRoom>,
    /// 关闭后置空，入站流随之结束
    inbound: Option<mpsc::Sender<Message>>,
}

pub struct ChatClient {
    user: User,
    deps: ClientDependencies,
    state: RwLock<ClientState>,
    receiver: Mutex<Option<mpsc::Receiver<Message>>>,
}

impl ChatClient {
    /// 生成会话用户ID并发布上线记录，发布失败则连接失败
    pub async fn connect(
        username: impl Into<String>,
        settings: ClientSettings,
        deps: ClientDependencies,
    ) -> Result<Self, ApplicationError> {
        let user = User::online(UserId::generate(), username, deps.clock.now())?;
        deps.store.append(&user).await?;

        let (sender, receiver) = mpsc::channel(settings.inbound_capacity.max(1));
        info!(user_id = %user.id, username = %user.username, "客户端已上线");

        Ok(Self {
            user,
            deps,
            state: RwLock::new(ClientState {
                active: None,
                inbound: Some(sender),
            }),
            receiver: Mutex::new(Some(receiver)),
        })
    }

    pub fn user_id(&self) -> &UserId {
        &self.user.id
    }

    pub fn username(&self) -> &str {
        &self.user.username
    }

    pub async fn current_room(&self) -> Option<ChatRoom> {
        let state = self.state.read().await;
        state.active.as_ref().map(|active| active.room.clone())
    }

    /// 取走入站消息接收端，只能取一次
    pub async fn take_inbound(&self) -> Option<mpsc::Receiver<Message>> {
        self.receiver.lock().await.take()
    }

    pub async fn list_users(&self, filter: &str) -> Result<Vec<User>, ApplicationError> {
        self.ensure_open().await?;
        let response = self
            .deps
            .control
            .list_users(ListUsersRequest {
                filter: filter.to_string(),
            })
            .await?;
        Ok(response.users)
    }

    pub async fn list_rooms(&self, filter: &str) -> Result<Vec<ChatRoom>, ApplicationError> {
        self.ensure_open().await?;
        let response = self
            .deps
            .control
            .list_rooms(ListRoomsRequest {
                filter: filter.to_string(),
            })
            .await?;
        Ok(response.rooms)
    }

    /// 加入房间；已在其他房间时先离开（尽力而为），再订阅新房间
    ///
    /// 新房间的订阅在离开旧房间之前建立。订阅失败时撤销控制面上的加入，
    /// 保持原来的房间不变。
    pub async fn join_room(&self, room_id: &RoomId) -> Result<ChatRoom, ApplicationError> {
        let mut state = self.state.write().await;
        let inbound = state.inbound.clone().ok_or(ApplicationError::Closed)?;

        let response = self
            .deps
            .control
            .join_room(JoinRoomRequest {
                room_id: room_id.clone(),
                user_id: self.user.id.clone(),
            })
            .await?;

        if !response.success {
            let reason = response.error.unwrap_or_else(|| "unknown error".to_string());
            return Err(ApplicationError::JoinRejected(reason));
        }
        let room = response
            .room
            .ok_or_else(|| ApplicationError::transport("join response is missing the room"))?;

        // 已在该房间且订阅仍在运行时沿用现有订阅；订阅已结束则重新订阅
        let mut rejoining = false;
        if let Some(active) = state.active.as_mut() {
            if active.room.id == room.id {
                if !active.forwarder.is_finished() {
                    active.room = room.clone();
                    return Ok(room);
                }
                rejoining = true;
            }
        }

        let feed = match self.deps.store.subscribe_room(&room.id).await {
            Ok(feed) => feed,
            Err(e) if rejoining => return Err(e.into()),
            Err(e) => {
                warn!(room_id = %room.id, error = %e, "订阅房间失败，撤销加入");
                self.revoke_join(&room.id).await;
                return Err(e.into());
            }
        };

        if let Some(previous) = state.active.take() {
            if rejoining {
                previous.stop().await;
            } else {
                let previous_id = previous.room.id.clone();
                if let Err(e) = self.leave_active(previous).await {
                    warn!(room_id = %previous_id, error = %e, "切换房间时离开旧房间失败");
                }
            }
        }

        let teardown = CancellationToken::new();
        let forwarder = tokio::spawn(forward_messages(
            room.id.clone(),
            feed,
            inbound,
            teardown.clone(),
        ));

        info!(user_id = %self.user.id, room_id = %room.id, room = %room.name, "已加入房间");
        state.active = Some(ActiveRoom {
            room: room.clone(),
            teardown,
            forwarder,
        });
        Ok(room)
    }

    pub async fn leave_room(&self) -> Result<(), ApplicationError> {
        let mut state = self.state.write().await;
        if state.inbound.is_none() {
            return Err(ApplicationError::Closed);
        }
        let active = state.active.take().ok_or(ApplicationError::NotInRoom)?;
        self.leave_active(active).await
    }

    /// 发送消息到当前房间
    pub async fn send_message(&self, content: &str) -> Result<Message, ApplicationError> {
        let state = self.state.read().await;
        if state.inbound.is_none() {
            return Err(ApplicationError::Closed);
        }
        let active = state.active.as_ref().ok_or(ApplicationError::NotInRoom)?;

        let message = Message::new(
            active.room.id.clone(),
            self.user.id.clone(),
            self.user.username.clone(),
            content,
            self.deps.clock.now(),
        );
        self.deps.store.append(&message).await?;

        debug!(room_id = %message.room_id, message_id = %message.id, "消息已发布");
        Ok(message)
    }

    /// 当前房间最早保留的至多 `limit` 条消息
    pub async fn history(&self, limit: usize) -> Result<Vec<Message>, ApplicationError> {
        let state = self.state.read().await;
        if state.inbound.is_none() {
            return Err(ApplicationError::Closed);
        }
        let active = state.active.as_ref().ok_or(ApplicationError::NotInRoom)?;
        Ok(self.deps.store.read_recent(&active.room.id, limit).await?)
    }

    /// 离开当前房间、发布下线记录并结束入站流
    ///
    /// 各步骤依次执行，中途失败不会回滚已完成的步骤，返回遇到的第一个错误。
    pub async fn close(&self) -> Result<(), ApplicationError> {
        let mut state = self.state.write().await;
        let Some(inbound) = state.inbound.take() else {
            return Err(ApplicationError::Closed);
        };

        let mut first_error = None;
        if let Some(active) = state.active.take() {
            if let Err(e) = self.leave_active(active).await {
                warn!(user_id = %self.user.id, error = %e, "关闭时离开房间失败");
                first_error = Some(e);
            }
        }

        let offline = self.user.went_offline(self.deps.clock.now());
        if let Err(e) = self.deps.store.append(&offline).await {
            warn!(user_id = %self.user.id, error = %e, "发布下线记录失败");
            first_error = first_error.or(Some(e.into()));
        }

        drop(inbound);
        info!(user_id = %self.user.id, "客户端已关闭");

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn ensure_open(&self) -> Result<(), ApplicationError> {
        if self.state.read().await.inbound.is_none() {
            return Err(ApplicationError::Closed);
        }
        Ok(())
    }

    async fn revoke_join(&self, room_id: &RoomId) {
        let result = self
            .deps
            .control
            .leave_room(LeaveRoomRequest {
                room_id: room_id.clone(),
                user_id: self.user.id.clone(),
            })
            .await;
        match result {
            Ok(response) if response.success => {}
            Ok(response) => {
                warn!(room_id = %room_id, error = ?response.error, "撤销加入被拒绝");
            }
            Err(e) => warn!(room_id = %room_id, error = %e, "撤销加入失败"),
        }
    }

    /// 通知控制面离开房间并拆除订阅；无论控制面结果如何订阅都会被拆除
    async fn leave_active(&self, active: ActiveRoom) -> Result<(), ApplicationError> {
        let room_id = active.room.id.clone();
        let response = self
            .deps
            .control
            .leave_room(LeaveRoomRequest {
                room_id: room_id.clone(),
                user_id: self.user.id.clone(),
            })
            .await;

        active.stop().await;
        info!(user_id = %self.user.id, room_id = %room_id, "已离开房间");

        let response = response?;
        if !response.success {
            let reason = response.error.unwrap_or_else(|| "unknown error".to_string());
            return Err(ApplicationError::LeaveRejected(reason));
        }
        Ok(())
    }
}

/// 把房间订阅的消息转发到入站队列，直到令牌取消、订阅结束或接收端关闭
async fn forward_messages(
    room_id: RoomId,
    mut feed: BoxStream<'static, Message>,
    inbound: mpsc::Sender<Message>,
    teardown: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            biased;
            _ = teardown.cancelled() => break,
            next = feed.next() => match next {
                Some(message) => message,
                None => {
                    debug!(room_id = %room_id, "房间订阅流已结束");
                    break;
                }
            },
        };

        // 队列满时阻塞，但仍响应取消
        tokio::select! {
            biased;
            _ = teardown.cancelled() => break,
            sent = inbound.send(message) => {
                if sent.is_err() {
                    debug!(room_id = %room_id, "入站接收端已关闭");
                    break;
                }
            }
        }
    }

    debug!(room_id = %room_id, "房间订阅已拆除");
}
