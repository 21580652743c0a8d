//! 服务注册模块
//!
//! 向本地 agent 注册/注销服务，查询 agent 上的服务

pub mod client;
pub mod descriptor;

pub use client::RegistryClient;
pub use descriptor::{AgentService, HealthCheck, ServiceDescriptor};
