//! Consul agent 服务注册客户端

use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use super::descriptor::{AgentService, ServiceDescriptor};
use crate::error::{ConsulError, Result};
use crate::transport::{Method, RequestOptions, Transport};

const SERVICES_ENDPOINT: &str = "v1/agent/services";
const SERVICE_ENDPOINT: &str = "v1/agent/service";
const REGISTER_ENDPOINT: &str = "v1/agent/service/register";
const DEREGISTER_ENDPOINT: &str = "v1/agent/service/deregister";

/// 服务注册客户端
#[derive(Clone)]
pub struct RegistryClient {
    transport: Arc<dyn Transport>,
}

impl RegistryClient {
    /// agent 服务端点不接受 `dc` 参数，因此不持有配置
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// 获取本 agent 上注册的全部服务（服务 ID -> 服务信息）
    pub async fn list_services(&self) -> Result<HashMap<String, AgentService>> {
        let body = self
            .transport
            .request(Method::Get, SERVICES_ENDPOINT, RequestOptions::new())
            .await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(HashMap::new());
        }
        Ok(serde_json::from_slice(&body)?)
    }

    /// 获取单个服务，不存在时返回 `None`
    pub async fn get_service(&self, service_id: &str) -> Result<Option<AgentService>> {
        require_id(service_id)?;
        let url = format!("{}/{}", SERVICE_ENDPOINT, service_id);
        match self
            .transport
            .request(Method::Get, &url, RequestOptions::new())
            .await
        {
            Ok(body) => Ok(Some(serde_json::from_slice(&body)?)),
            Err(err) if err.is_not_found_status() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// 注册服务
    pub async fn register_service(&self, service: &ServiceDescriptor) -> Result<()> {
        service.validate()?;
        let options = RequestOptions::new()
            .header("Content-Type", "application/json")
            .body(service.to_json()?);

        self.transport
            .request(Method::Put, REGISTER_ENDPOINT, options)
            .await?;

        info!(
            "Service registered with Consul: {} ({}) at {}:{}",
            service.name, service.id, service.address, service.port
        );
        Ok(())
    }

    /// 注销服务
    pub async fn deregister_service(&self, service_id: &str) -> Result<()> {
        require_id(service_id)?;
        let url = format!("{}/{}", DEREGISTER_ENDPOINT, service_id);
        self.transport
            .request(Method::Put, &url, RequestOptions::new())
            .await?;

        info!("Service unregistered from Consul: {}", service_id);
        Ok(())
    }
}

fn require_id(service_id: &str) -> Result<()> {
    if service_id.trim().is_empty() {
        return Err(ConsulError::invalid_argument("service id must not be empty"));
    }
    Ok(())
}
