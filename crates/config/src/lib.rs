//! 统一配置中心
//!
//! 提供应用的全局配置管理，包括：
//! - 消息代理（Redis Stream 持久化日志）
//! - 控制面 RPC 服务地址
//! - 参与者客户端设置
//!
//! 加载优先级：默认值 -> 可选配置文件（APP_CONFIG_FILE）-> 环境变量（APP_*，`__` 表示嵌套）。

use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// 消息代理配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BrokerConfig {
    #[validate(url)]
    pub url: String,
    /// Redis Stream 键名前缀
    #[validate(length(min = 1))]
    pub stream_prefix: String,
    /// 回放时等待新记录的空闲超时，超时即视为流已读尽
    #[validate(range(min = 1))]
    pub replay_idle_timeout_ms: u64,
    /// 回放每批读取的记录数
    #[validate(range(min = 1))]
    pub replay_batch_size: usize,
}

impl BrokerConfig {
    pub fn replay_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.replay_idle_timeout_ms)
    }
}

/// 控制面服务配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 参与者客户端配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ClientConfig {
    #[validate(url)]
    pub service_url: String,
    #[serde(default)]
    pub username: String,
    /// 入站消息队列容量
    #[validate(range(min = 1))]
    pub inbound_capacity: usize,
    /// 加入房间时回显的历史消息条数
    pub history_limit: usize,
}

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    #[validate(nested)]
    pub broker: BrokerConfig,
    #[validate(nested)]
    pub server: ServerConfig,
    #[validate(nested)]
    pub client: ClientConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            broker: BrokerConfig {
                url: "redis://127.0.0.1:6379".into(),
                stream_prefix: "chat".into(),
                replay_idle_timeout_ms: 1000,
                replay_batch_size: 100,
            },
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 50051,
            },
            client: ClientConfig {
                service_url: "http://127.0.0.1:50051".into(),
                username: String::new(),
                inbound_capacity: 100,
                history_limit: 20,
            },
        }
    }
}

impl AppConfig {
    /// 按优先级合并配置源
    pub fn figment() -> Figment {
        let mut fig = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        if let Ok(path) = std::env::var("APP_CONFIG_FILE") {
            if path.ends_with(".yml") || path.ends_with(".yaml") {
                fig = fig.merge(Yaml::file(path));
            } else if path.ends_with(".json") {
                fig = fig.merge(Json::file(path));
            } else {
                fig = fig.merge(Toml::file(path));
            }
        }
        fig.merge(Env::prefixed("APP_").split("__"))
    }

    /// 加载并校验配置
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let cfg: AppConfig = figment.extract().map_err(Box::new)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}
