use std::sync::Arc;

use application::{
    ChatService, ChatServiceDependencies, DurableLog, LiveFeed, LogEntry, LogError, LogStore,
    MemoryLog, SystemClock,
};
use async_trait::async_trait;
use axum::Router;
use domain::{Topic, TopicFilter};
use tokio::{net::TcpListener, sync::oneshot};
use web_api::{router, AppState};

/// 所有操作都返回连接错误的日志
pub struct UnavailableLog;

#[async_trait]
impl DurableLog for UnavailableLog {
    async fn append(&self, _topic: &Topic, _payload: Vec<u8>) -> Result<(), LogError> {
        Err(LogError::Connection("connection refused".into()))
    }

    async fn append_versioned(
        &self,
        _topic: &Topic,
        _payload: Vec<u8>,
        _expected_revision: u64,
    ) -> Result<u64, LogError> {
        Err(LogError::Connection("connection refused".into()))
    }

    async fn replay(
        &self,
        _filter: &TopicFilter,
        _limit: Option<usize>,
    ) -> Result<Vec<LogEntry>, LogError> {
        Err(LogError::Connection("connection refused".into()))
    }

    async fn subscribe(&self, _filter: &TopicFilter) -> Result<LiveFeed, LogError> {
        Err(LogError::Connection("connection refused".into()))
    }
}

pub fn build_router(log: Arc<dyn DurableLog>) -> Router {
    let service = ChatService::new(ChatServiceDependencies {
        store: LogStore::new(log),
        clock: Arc::new(SystemClock),
    });
    router(AppState::new(Arc::new(service)))
}

pub fn memory_router() -> (Arc<MemoryLog>, Router) {
    let log = Arc::new(MemoryLog::new());
    (log.clone(), build_router(log))
}

/// 在随机端口上启动服务，返回基础地址和关闭信号
pub async fn serve(router: Router) -> (String, oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .ok();
    });

    (format!("http://{}", addr), shutdown_tx)
}
