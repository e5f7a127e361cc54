//! 应用层实现。
//!
//! 以持久化追加日志作为唯一的记录系统：
//! - `log`：日志抽象与按实体类型的读写封装
//! - `services`：控制面服务，回放日志回答查询并变更房间成员
//! - `client`：参与者客户端，桥接控制面调用并维护唯一的实时房间订阅

pub mod client;
pub mod clock;
pub mod control;
pub mod dto;
pub mod error;
pub mod log;
pub mod memory;
pub mod services;

pub use client::{ChatClient, ClientDependencies, ClientSettings};
pub use clock::{Clock, SystemClock};
pub use control::ControlPlane;
pub use dto::{
    JoinRoomRequest, JoinRoomResponse, LeaveRoomRequest, LeaveRoomResponse, ListRoomsRequest,
    ListRoomsResponse, ListUsersRequest, ListUsersResponse,
};
pub use error::ApplicationError;
pub use log::{DurableLog, LiveFeed, LogEntry, LogError, LogStore};
pub use memory::MemoryLog;
pub use services::{ChatService, ChatServiceDependencies};
