//! 健康发现客户端

use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::record::HealthRecord;
use super::selector::pick_one;
use super::view::{View, narrow_fields, project};
use crate::config::ClientConfig;
use crate::error::{ConsulError, Result};
use crate::transport::{Method, RequestOptions, Transport};

const HEALTH_ENDPOINT: &str = "v1/health/service";

/// 健康查询参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthQuery {
    /// 服务名
    pub service: String,
    /// 只返回全部检查通过的实例（默认 true）
    pub passing: bool,
    /// 投影视图
    pub view: View,
    /// 收窄保留的字段，空表示不收窄
    pub fields: Vec<String>,
    /// 数据中心覆盖
    pub datacenter: Option<String>,
}

impl HealthQuery {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            passing: true,
            view: View::None,
            fields: Vec::new(),
            datacenter: None,
        }
    }

    #[must_use]
    pub fn passing(mut self, passing: bool) -> Self {
        self.passing = passing;
        self
    }

    #[must_use]
    pub fn view(mut self, view: impl Into<View>) -> Self {
        self.view = view.into();
        self
    }

    #[must_use]
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.fields.push(field.into());
        self
    }

    #[must_use]
    pub fn fields<I, T>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        fields.into_iter().fold(self, |query, field| query.field(field))
    }

    #[must_use]
    pub fn datacenter(mut self, datacenter: impl Into<String>) -> Self {
        self.datacenter = Some(datacenter.into());
        self
    }
}

/// 健康发现客户端
#[derive(Clone)]
pub struct HealthClient {
    transport: Arc<dyn Transport>,
    config: Arc<ClientConfig>,
}

impl HealthClient {
    pub fn new(transport: Arc<dyn Transport>, config: Arc<ClientConfig>) -> Self {
        Self { transport, config }
    }

    /// 获取服务的健康记录，保持远端返回顺序
    ///
    /// # 参数
    /// * `service` - 服务名，不能为空
    /// * `only_passing` - 只返回全部检查通过的实例
    /// * `datacenter` - 数据中心覆盖
    pub async fn list_health_records(
        &self,
        service: &str,
        only_passing: bool,
        datacenter: Option<&str>,
    ) -> Result<Vec<HealthRecord>> {
        if service.trim().is_empty() {
            return Err(ConsulError::invalid_argument("service name must not be empty"));
        }

        let options = RequestOptions::new()
            .query("passing", if only_passing { "1" } else { "0" })
            .query_opt("dc", self.config.resolve_datacenter(datacenter));
        let body = self
            .transport
            .request(
                Method::Get,
                &format!("{}/{}", HEALTH_ENDPOINT, service),
                options,
            )
            .await?;

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        let records: Option<Vec<HealthRecord>> = serde_json::from_slice(&body)?;
        let records = records.unwrap_or_default();
        debug!(
            "Found {} health records for service {} (passing only: {})",
            records.len(),
            service,
            only_passing
        );
        Ok(records)
    }

    /// 查询、投影并收窄
    pub async fn health_services(&self, query: &HealthQuery) -> Result<Vec<Value>> {
        let records = self
            .list_health_records(&query.service, query.passing, query.datacenter.as_deref())
            .await?;
        narrow_fields(project(records, query.view), &query.fields)
    }

    /// 查询后随机取一个元素
    ///
    /// 远端失败返回 `Err`；没有任何元素时返回 `Ok(None)`。
    pub async fn health_service(&self, query: &HealthQuery) -> Result<Option<Value>> {
        Ok(pick_one(self.health_services(query).await?))
    }
}
