use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{ConsulError, Result};

/// 默认 Consul agent 地址
pub const DEFAULT_ADDRESS: &str = "http://127.0.0.1:8500";

/// 客户端配置
///
/// 构造后即不可变，客户端持有 `Arc<ClientConfig>` 快照。需要切换数据中心等
/// 设置时，构造新的客户端，而不是修改正在使用的配置。
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ClientConfig {
    /// agent 地址，如 `http://127.0.0.1:8500`
    #[serde(default = "default_address")]
    pub address: String,
    /// 默认数据中心，单次调用可覆盖
    #[serde(default)]
    pub datacenter: Option<String>,
    /// ACL token，以 `X-Consul-Token` 头发送
    #[serde(default)]
    pub token: Option<String>,
    /// 请求超时（毫秒）
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// 连接超时（毫秒）
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// 每个请求都附带的额外请求头
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_address() -> String {
    DEFAULT_ADDRESS.to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            datacenter: None,
            token: None,
            timeout_ms: default_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            headers: HashMap::new(),
        }
    }
}

impl ClientConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }

    /// 从 TOML 文件加载配置
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// 从环境变量加载配置
    ///
    /// - `CONSUL_HTTP_ADDR`: agent 地址（缺少协议时补 `http://`）
    /// - `CONSUL_HTTP_TOKEN`: ACL token
    /// - `CONSUL_DATACENTER`: 默认数据中心
    pub fn from_env() -> Result<Self> {
        let mut config = ClientConfig::default();

        if let Some(addr) = non_empty_env("CONSUL_HTTP_ADDR") {
            config.address = if addr.contains("://") {
                addr
            } else {
                format!("http://{}", addr)
            };
        }
        config.token = non_empty_env("CONSUL_HTTP_TOKEN");
        config.datacenter = non_empty_env("CONSUL_DATACENTER");

        config.validate()?;
        Ok(config)
    }

    /// 设置默认数据中心
    #[must_use]
    pub fn with_datacenter(mut self, datacenter: impl Into<String>) -> Self {
        self.datacenter = Some(datacenter.into());
        self
    }

    /// 设置 ACL token
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// 设置请求超时，按毫秒保存，不足 1ms 按 1ms 计
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis())
            .unwrap_or(u64::MAX)
            .max(1);
        self
    }

    /// 添加请求头
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(ConsulError::config("address must not be empty"));
        }
        if self.timeout_ms == 0 {
            return Err(ConsulError::config("timeout_ms must be greater than zero"));
        }
        Ok(())
    }

    /// 单次调用的数据中心：显式传入优先，其次是配置默认值
    pub fn resolve_datacenter<'a>(&'a self, datacenter: Option<&'a str>) -> Option<&'a str> {
        datacenter
            .filter(|dc| !dc.is_empty())
            .or(self.datacenter.as_deref())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
