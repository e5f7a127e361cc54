use async_trait::async_trait;

use crate::dto::{
    JoinRoomRequest, JoinRoomResponse, LeaveRoomRequest, LeaveRoomResponse, ListRoomsRequest,
    ListRoomsResponse, ListUsersRequest, ListUsersResponse,
};
use crate::error::ApplicationError;

/// 控制面接口：服务端直接实现，客户端通过 RPC 代理实现
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn list_users(
        &self,
        request: ListUsersRequest,
    ) -> Result<ListUsersResponse, ApplicationError>;

    async fn list_rooms(
        &self,
        request: ListRoomsRequest,
    ) -> Result<ListRoomsResponse, ApplicationError>;

    async fn join_room(&self, request: JoinRoomRequest)
        -> Result<JoinRoomResponse, ApplicationError>;

    async fn leave_room(
        &self,
        request: LeaveRoomRequest,
    ) -> Result<LeaveRoomResponse, ApplicationError>;
}
