use application::{
    ControlPlane, JoinRoomRequest, JoinRoomResponse, LeaveRoomRequest, LeaveRoomResponse,
    ListRoomsRequest, ListRoomsResponse, ListUsersRequest, ListUsersResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use domain::{RoomId, UserId};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
struct MembershipPayload {
    user_id: UserId,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/rooms", get(list_rooms))
        .route("/rooms/{room_id}/join", post(join_room))
        .route("/rooms/{room_id}/leave", post(leave_room))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn list_users(
    State(state): State<AppState>,
    Query(request): Query<ListUsersRequest>,
) -> Result<Json<ListUsersResponse>, ApiError> {
    let response = state.chat_service.list_users(request).await?;
    Ok(Json(response))
}

async fn list_rooms(
    State(state): State<AppState>,
    Query(request): Query<ListRoomsRequest>,
) -> Result<Json<ListRoomsResponse>, ApiError> {
    let response = state.chat_service.list_rooms(request).await?;
    Ok(Json(response))
}

async fn join_room(
    State(state): State<AppState>,
    Path(room_id): Path<RoomId>,
    Json(payload): Json<MembershipPayload>,
) -> Result<Json<JoinRoomResponse>, ApiError> {
    let response = state
        .chat_service
        .join_room(JoinRoomRequest {
            room_id,
            user_id: payload.user_id,
        })
        .await?;

    Ok(Json(response))
}

async fn leave_room(
    State(state): State<AppState>,
    Path(room_id): Path<RoomId>,
    Json(payload): Json<MembershipPayload>,
) -> Result<Json<LeaveRoomResponse>, ApiError> {
    let response = state
        .chat_service
        .leave_room(LeaveRoomRequest {
            room_id,
            user_id: payload.user_id,
        })
        .await?;

    Ok(Json(response))
}
