//! 传输适配层
//!
//! KV、服务注册与健康发现客户端只依赖 [`Transport`] trait，
//! 具体的 HTTP 实现和进程内 agent 模拟都在这里。

pub mod http;
pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;

use crate::error::Result;

pub use http::HttpTransport;
pub use memory::{MemoryTransport, RecordedRequest};

/// 请求方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// 单次请求的选项覆盖
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    /// 追加的查询参数（保持插入顺序）
    pub query: Vec<(String, String)>,
    /// 追加的请求头
    pub headers: Vec<(String, String)>,
    /// 请求体
    pub body: Option<Bytes>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加查询参数
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// 添加开关型查询参数（如 `recurse`、`keys`）
    #[must_use]
    pub fn flag(self, key: impl Into<String>) -> Self {
        self.query(key, "true")
    }

    /// 值存在时才添加查询参数
    #[must_use]
    pub fn query_opt(self, key: impl Into<String>, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    /// 添加请求头
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// 设置请求体
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// 查找查询参数（取第一个）
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_query(&self, key: &str) -> bool {
        self.query.iter().any(|(k, _)| k == key)
    }
}

/// 传输适配器 trait
///
/// 每次调用只发出一个请求，实现不得自行重试：KV 的 CAS 写入依赖
/// "一次逻辑操作恰好一次请求"。
/// 非 2xx 响应返回 `ConsulError::Status`，网络失败返回 `ConsulError::Transport`。
#[async_trait]
pub trait Transport: Send + Sync {
    /// 发送请求并返回原始响应体
    ///
    /// # 参数
    /// * `method` - 请求方法
    /// * `path` - 相对 agent 地址的路径，如 `v1/kv/cfg/feature-x`
    /// * `options` - 查询参数、请求头和请求体
    async fn request(&self, method: Method, path: &str, options: RequestOptions) -> Result<Bytes>;
}
