//! 日志初始化
//!
//! 库内部只使用 `tracing` 宏；是否安装订阅者由调用方决定。

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::{ConsulError, Result};

/// 默认过滤规则
pub const DEFAULT_FILTER: &str = "info";

/// 日志输出格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// 安装文本格式的订阅者
///
/// 优先使用 `RUST_LOG`，未设置时使用 `filter`。
/// 已有全局订阅者时不做任何事，返回 `Ok(false)`。
pub fn init_logging(filter: &str) -> Result<bool> {
    init_with_format(filter, LogFormat::Text)
}

/// 安装 JSON 格式的订阅者
pub fn init_json_logging(filter: &str) -> Result<bool> {
    init_with_format(filter, LogFormat::Json)
}

/// 按指定格式安装订阅者
///
/// 返回是否由本次调用完成安装；过滤规则非法时返回 `Config` 错误。
pub fn init_with_format(filter: &str, format: LogFormat) -> Result<bool> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(filter)
            .map_err(|e| ConsulError::config(format!("invalid log filter {}: {}", filter, e)))?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
            .try_init(),
    };
    Ok(installed.is_ok())
}
