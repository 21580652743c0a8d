//! Flare Consul Client Library
//!
//! Consul HTTP API client covering the hierarchical KV store with optimistic
//! concurrency, agent service registration, and health-based service discovery.
//!
//! 所有客户端都通过 [`transport::Transport`] 发送请求：生产环境使用
//! [`transport::HttpTransport`]，测试与本地开发使用 [`transport::MemoryTransport`]。

pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod kv;
pub mod logging;
pub mod registry;
pub mod transport;

// Re-exports
pub use client::{ClientBuilder, ConsulClient};
pub use config::ClientConfig;
pub use discovery::{
    HealthClient, HealthQuery, HealthRecord, ServiceSelector, View, narrow_fields, pick_one,
    pick_one_with, project,
};
pub use error::{ConsulError, Envelope, ErrorCategory, ErrorCode, Result};
pub use kv::{KeyPath, KvClient, KvItem, build_path, decode_value, encode_value};
pub use registry::{AgentService, HealthCheck, RegistryClient, ServiceDescriptor};
pub use transport::{HttpTransport, MemoryTransport, Method, RequestOptions, Transport};
