//! 远程控制面客户端
//!
//! 把 `ControlPlane` 调用转换为对 `/api/v1` 路由的 HTTP 请求。
//! 网络失败和非 2xx 响应都视为传输错误；`success = false` 原样返回给调用方。

use application::{
    ApplicationError, ControlPlane, JoinRoomRequest, JoinRoomResponse, LeaveRoomRequest,
    LeaveRoomResponse, ListRoomsRequest, ListRoomsResponse, ListUsersRequest, ListUsersResponse,
};
use async_trait::async_trait;
use domain::UserId;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

#[derive(Serialize)]
struct MembershipBody<'a> {
    user_id: &'a UserId,
}

#[derive(Clone)]
pub struct HttpControlPlane {
    http: Client,
    base: Url,
}

impl HttpControlPlane {
    pub fn new(service_url: &str) -> Result<Self, ApplicationError> {
        let base = Url::parse(service_url).map_err(|e| {
            ApplicationError::transport(format!("invalid service url {}: {}", service_url, e))
        })?;
        if base.cannot_be_a_base() {
            return Err(ApplicationError::transport(format!(
                "service url {} cannot be used as a base",
                service_url
            )));
        }

        Ok(Self {
            http: Client::new(),
            base,
        })
    }

    fn endpoint(&self, path: &[&str]) -> Result<Url, ApplicationError> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ApplicationError::transport("service url cannot be a base"))?;
            segments.pop_if_empty().extend(["api", "v1"]).extend(path);
        }
        Ok(url)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApplicationError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApplicationError::transport(format!(
                "control plane returned {}: {}",
                status, body
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApplicationError::transport(format!("invalid response body: {}", e)))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &[&str],
        filter: &str,
    ) -> Result<T, ApplicationError> {
        let url = self.endpoint(path)?;
        debug!(url = %url, filter, "调用控制面");

        let response = self
            .http
            .get(url)
            .query(&[("filter", filter)])
            .send()
            .await
            .map_err(|e| ApplicationError::transport(e.to_string()))?;
        Self::decode(response).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &[&str],
        user_id: &UserId,
    ) -> Result<T, ApplicationError> {
        let url = self.endpoint(path)?;
        debug!(url = %url, user_id = %user_id, "调用控制面");

        let response = self
            .http
            .post(url)
            .json(&MembershipBody { user_id })
            .send()
            .await
            .map_err(|e| ApplicationError::transport(e.to_string()))?;
        Self::decode(response).await
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn list_users(
        &self,
        request: ListUsersRequest,
    ) -> Result<ListUsersResponse, ApplicationError> {
        self.get(&["users"], &request.filter).await
    }

    async fn list_rooms(
        &self,
        request: ListRoomsRequest,
    ) -> Result<ListRoomsResponse, ApplicationError> {
        self.get(&["rooms"], &request.filter).await
    }

    async fn join_room(
        &self,
        request: JoinRoomRequest,
    ) -> Result<JoinRoomResponse, ApplicationError> {
        self.post(&["rooms", request.room_id.as_str(), "join"], &request.user_id)
            .await
    }

    async fn leave_room(
        &self,
        request: LeaveRoomRequest,
    ) -> Result<LeaveRoomResponse, ApplicationError> {
        self.post(&["rooms", request.room_id.as_str(), "leave"], &request.user_id)
            .await
    }
}
