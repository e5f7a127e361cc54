//! 控制面服务入口
//!
//! 连接 Redis 持久化日志，启动 Axum RPC 服务。

use std::sync::Arc;

use application::{ChatService, ChatServiceDependencies, LogStore, SystemClock};
use config::AppConfig;
use infrastructure::RedisStreamLog;
use tracing::info;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logchat::init_tracing();

    let config = AppConfig::load()?;
    let log = Arc::new(RedisStreamLog::connect(&config.broker).await?);

    let chat_service = ChatService::new(ChatServiceDependencies {
        store: LogStore::new(log),
        clock: Arc::new(SystemClock),
    });
    let app = router(AppState::new(Arc::new(chat_service)));

    let address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("控制面服务启动在 http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("控制面服务已停止");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "监听退出信号失败");
    }
}
