//! 基于 reqwest 的 HTTP 传输实现

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client as HttpClient;
use reqwest::Url;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use super::{Method, RequestOptions, Transport};
use crate::config::ClientConfig;
use crate::error::{ConsulError, Result};

/// ACL token 请求头
pub const TOKEN_HEADER: &str = "X-Consul-Token";

/// HTTP 传输
///
/// 超时策略由配置决定；本层不做重试。
#[derive(Clone)]
pub struct HttpTransport {
    http_client: HttpClient,
    base_url: Url,
}

impl HttpTransport {
    /// 根据配置创建 HTTP 传输
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        if let Some(token) = &config.token {
            headers.insert(TOKEN_HEADER, header_value(token)?);
        }
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ConsulError::config(format!("invalid header name {}: {}", name, e)))?;
            headers.insert(name, header_value(value)?);
        }

        let http_client = HttpClient::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .default_headers(headers)
            .build()?;

        Self::with_client(http_client, &config.address)
    }

    /// 使用现有 reqwest 客户端
    pub fn with_client(http_client: HttpClient, address: &str) -> Result<Self> {
        let base_url = Url::parse(address)
            .map_err(|e| ConsulError::config(format!("invalid address {}: {}", address, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ConsulError::config(format!(
                "address {} cannot be used as a base URL",
                address
            )));
        }

        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// 拼接请求 URL，每个路径段单独做百分号编码
    fn url_for(&self, path: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ConsulError::config("base URL cannot carry a path"))?;
            segments.pop_if_empty();
            segments.extend(path.trim_start_matches('/').split('/'));
        }
        Ok(url)
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| ConsulError::config(format!("invalid header value: {}", e)))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, method: Method, path: &str, options: RequestOptions) -> Result<Bytes> {
        let url = self.url_for(path)?;
        debug!("Consul request: {} {}", method, url);

        let mut builder = self.http_client.request(method.into(), url);
        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        for (name, value) in &options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = options.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            debug!("Consul responded {} for {} {}", status, method, path);
            return Err(ConsulError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(body)
    }
}
