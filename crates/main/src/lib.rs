//! 聊天程序入口共享代码：日志初始化与命令行界面的格式化辅助。

pub mod cli;

use tracing_subscriber::EnvFilter;

/// 初始化日志，输出到 stderr，避免和聊天内容混在一起
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}
