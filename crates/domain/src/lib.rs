//! 聊天室系统核心领域模型
//!
//! 包含用户、聊天室、消息三类实体，持久化主题的命名规则，
//! 以及从追加日志重建"当前状态"的归约逻辑。

pub mod entities;
pub mod errors;
pub mod materialize;
pub mod topic;
pub mod value_objects;

// 重新导出常用类型
pub use entities::*;
pub use errors::*;
pub use materialize::{latest_by_id, Entity};
pub use topic::{Topic, TopicFilter};
pub use value_objects::*;
