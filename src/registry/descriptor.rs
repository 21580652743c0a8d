//! 服务与健康检查描述

use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;

use crate::error::{ConsulError, Result};

/// HTTP/TCP/Script 检查的默认间隔（秒）
pub const DEFAULT_INTERVAL_SECS: u64 = 10;
/// HTTP/TCP/Script 检查的默认超时（秒）
pub const DEFAULT_TIMEOUT_SECS: u64 = 3;
/// TTL 检查的默认 TTL（秒）
pub const DEFAULT_TTL_SECS: u64 = 30;
/// 默认服务端口
pub const DEFAULT_PORT: u16 = 80;

fn seconds<S: Serializer>(secs: &u64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{}s", secs))
}

/// 健康检查描述
///
/// 时间参数以整秒保存，序列化为 `"<n>s"`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum HealthCheck {
    Http {
        #[serde(rename = "ID")]
        id: String,
        #[serde(rename = "Name")]
        name: String,
        #[serde(rename = "HTTP")]
        http: String,
        #[serde(rename = "Interval", serialize_with = "seconds")]
        interval: u64,
        #[serde(rename = "Timeout", serialize_with = "seconds")]
        timeout: u64,
    },
    Tcp {
        #[serde(rename = "ID")]
        id: String,
        #[serde(rename = "Name")]
        name: String,
        #[serde(rename = "TCP")]
        tcp: String,
        #[serde(rename = "Interval", serialize_with = "seconds")]
        interval: u64,
        #[serde(rename = "Timeout", serialize_with = "seconds")]
        timeout: u64,
    },
    Ttl {
        #[serde(rename = "ID")]
        id: String,
        #[serde(rename = "Name")]
        name: String,
        #[serde(rename = "Notes")]
        notes: String,
        #[serde(rename = "TTL", serialize_with = "seconds")]
        ttl: u64,
    },
    Script {
        #[serde(rename = "ID")]
        id: String,
        #[serde(rename = "Name")]
        name: String,
        #[serde(rename = "Script")]
        script: String,
        #[serde(rename = "Interval", serialize_with = "seconds")]
        interval: u64,
        #[serde(rename = "Timeout", serialize_with = "seconds")]
        timeout: u64,
    },
}

impl HealthCheck {
    /// HTTP 检查，默认间隔 10s、超时 3s
    pub fn http(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        HealthCheck::Http {
            id: id.into(),
            name: name.into(),
            http: url.into(),
            interval: DEFAULT_INTERVAL_SECS,
            timeout: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// TCP 检查，默认间隔 10s、超时 3s
    pub fn tcp(id: impl Into<String>, name: impl Into<String>, addr: impl Into<String>) -> Self {
        HealthCheck::Tcp {
            id: id.into(),
            name: name.into(),
            tcp: addr.into(),
            interval: DEFAULT_INTERVAL_SECS,
            timeout: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// TTL 检查，默认 TTL 30s
    pub fn ttl(id: impl Into<String>, name: impl Into<String>, notes: impl Into<String>) -> Self {
        HealthCheck::Ttl {
            id: id.into(),
            name: name.into(),
            notes: notes.into(),
            ttl: DEFAULT_TTL_SECS,
        }
    }

    /// 脚本检查，默认间隔 10s、超时 3s
    pub fn script(id: impl Into<String>, name: impl Into<String>, script: impl Into<String>) -> Self {
        HealthCheck::Script {
            id: id.into(),
            name: name.into(),
            script: script.into(),
            interval: DEFAULT_INTERVAL_SECS,
            timeout: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// 设置检查间隔；TTL 检查没有间隔，保持不变
    #[must_use]
    pub fn with_interval(mut self, secs: u64) -> Self {
        match &mut self {
            HealthCheck::Http { interval, .. }
            | HealthCheck::Tcp { interval, .. }
            | HealthCheck::Script { interval, .. } => *interval = secs,
            HealthCheck::Ttl { .. } => {}
        }
        self
    }

    /// 设置检查超时；TTL 检查没有超时，保持不变
    #[must_use]
    pub fn with_timeout(mut self, secs: u64) -> Self {
        match &mut self {
            HealthCheck::Http { timeout, .. }
            | HealthCheck::Tcp { timeout, .. }
            | HealthCheck::Script { timeout, .. } => *timeout = secs,
            HealthCheck::Ttl { .. } => {}
        }
        self
    }

    /// 设置 TTL；仅对 TTL 检查生效
    #[must_use]
    pub fn with_ttl(mut self, secs: u64) -> Self {
        if let HealthCheck::Ttl { ttl, .. } = &mut self {
            *ttl = secs;
        }
        self
    }

    pub fn id(&self) -> &str {
        match self {
            HealthCheck::Http { id, .. }
            | HealthCheck::Tcp { id, .. }
            | HealthCheck::Ttl { id, .. }
            | HealthCheck::Script { id, .. } => id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            HealthCheck::Http { name, .. }
            | HealthCheck::Tcp { name, .. }
            | HealthCheck::Ttl { name, .. }
            | HealthCheck::Script { name, .. } => name,
        }
    }
}

/// 服务注册描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDescriptor {
    /// 服务 ID（在 agent 内唯一）
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Port")]
    pub port: u16,
    /// 标签（去重，保持添加顺序），只能通过 `with_tag` 添加
    #[serde(rename = "Tags")]
    tags: Vec<String>,
    #[serde(rename = "Checks")]
    pub checks: Vec<HealthCheck>,
}

impl ServiceDescriptor {
    /// 创建服务描述，端口默认 80
    pub fn new(id: impl Into<String>, name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            address: address.into(),
            port: DEFAULT_PORT,
            tags: Vec::new(),
            checks: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// 添加标签，重复标签被忽略
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self
    }

    #[must_use]
    pub fn with_tags<I, T>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        tags.into_iter().fold(self, |desc, tag| desc.with_tag(tag))
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    #[must_use]
    pub fn with_check(mut self, check: HealthCheck) -> Self {
        self.checks.push(check);
        self
    }

    /// 校验必填字段
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(ConsulError::invalid_argument("service id must not be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(ConsulError::invalid_argument("service name must not be empty"));
        }
        Ok(())
    }

    /// 编码为注册请求体
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// agent 返回的服务信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentService {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(rename = "Service", default)]
    pub service: String,
    #[serde(rename = "Tags", default)]
    pub tags: Option<Vec<String>>,
    #[serde(rename = "Meta", default)]
    pub meta: Option<HashMap<String, String>>,
    #[serde(rename = "Address", default)]
    pub address: String,
    #[serde(rename = "Port", default)]
    pub port: u16,
    #[serde(rename = "Datacenter", default)]
    pub datacenter: Option<String>,
}
