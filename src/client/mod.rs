//! Consul 客户端模块
//!
//! 提供客户端构建器和统一入口

use std::sync::Arc;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::discovery::{HealthClient, ServiceSelector};
use crate::error::Result;
use crate::kv::KvClient;
use crate::registry::RegistryClient;
use crate::transport::{HttpTransport, Transport};

/// 客户端构建器
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            transport: None,
        }
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.config.address = address.into();
        self
    }

    pub fn datacenter(mut self, datacenter: impl Into<String>) -> Self {
        self.config = self.config.with_datacenter(datacenter);
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.config = self.config.with_token(token);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_timeout(timeout);
        self
    }

    /// 使用自定义传输（如 [`crate::transport::MemoryTransport`]）
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<ConsulClient> {
        match self.transport {
            Some(transport) => ConsulClient::with_transport(self.config, transport),
            None => ConsulClient::new(self.config),
        }
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Consul 客户端
///
/// 构造时固定配置快照；各子客户端共享同一个传输。
#[derive(Clone)]
pub struct ConsulClient {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
}

impl ConsulClient {
    /// 使用 HTTP 传输创建客户端
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(HttpTransport::new(&config)?);
        Ok(Self {
            config: Arc::new(config),
            transport,
        })
    }

    /// 使用指定传输创建客户端
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            transport,
        })
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    /// 以新的默认数据中心派生客户端，原客户端不受影响
    pub fn with_datacenter(&self, datacenter: impl Into<String>) -> Self {
        let config = self.config.as_ref().clone().with_datacenter(datacenter);
        Self {
            config: Arc::new(config),
            transport: self.transport.clone(),
        }
    }

    pub fn kv(&self) -> KvClient {
        KvClient::new(self.transport.clone(), self.config.clone())
    }

    pub fn registry(&self) -> RegistryClient {
        RegistryClient::new(self.transport.clone())
    }

    pub fn health(&self) -> HealthClient {
        HealthClient::new(self.transport.clone(), self.config.clone())
    }

    pub fn selector(&self) -> ServiceSelector {
        ServiceSelector::new(self.health())
    }
}
