//! Web API 层。
//!
//! 以 Axum JSON 路由暴露控制面 RPC，并提供基于 reqwest 的远程 `ControlPlane` 实现。

mod client;
mod error;
mod routes;
mod state;

pub use client::HttpControlPlane;
pub use error::{ApiError, ErrorBody};
pub use routes::router;
pub use state::AppState;
