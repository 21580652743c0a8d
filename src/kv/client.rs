//! KV 存储客户端
//!
//! 写入一致性约定：
//! - create：先读后写的存在性守卫。读与写之间存在竞争窗口，远端不保证
//!   原子性，这是尽力而为的守卫而不是 CAS。需要存储端强制时使用
//!   [`KvClient::create_key_if_absent`]。
//! - update：先确认 key 存在，再以调用方给出的 modify index 做 `cas` 写入，
//!   索引不匹配由远端原子拒绝；不给索引时无条件覆盖。
//! - delete：天然幂等，不做存在性检查。
//!
//! 任何拒绝都原样返回给调用方，本层不重试。

use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, warn};

use super::codec::{KV_ENDPOINT, KeyPath, KvItem, decode_items, decode_write_result};
use crate::config::ClientConfig;
use crate::error::{ConsulError, Result};
use crate::transport::{Method, RequestOptions, Transport};

/// KV 存储客户端
#[derive(Clone)]
pub struct KvClient {
    transport: Arc<dyn Transport>,
    config: Arc<ClientConfig>,
}

impl KvClient {
    pub fn new(transport: Arc<dyn Transport>, config: Arc<ClientConfig>) -> Self {
        Self { transport, config }
    }

    /// 读取单个条目
    ///
    /// key 不存在（404 或空数组）时返回 `Ok(None)`。
    /// 多次调用之间不保证单调读。
    pub async fn get_item(
        &self,
        path: impl Into<KeyPath>,
        datacenter: Option<&str>,
    ) -> Result<Option<KvItem>> {
        let key = path.into().as_path();
        self.fetch(&key, datacenter).await
    }

    /// 读取值，任何失败或不存在都返回 `default`
    ///
    /// 注意：这里不区分"key 不存在"和"传输失败"，失败只会记录 warn 日志。
    /// 需要区分时使用 [`KvClient::try_get_value`]。
    pub async fn get_value(&self, path: impl Into<KeyPath>, default: impl Into<Vec<u8>>) -> Vec<u8> {
        let key = path.into().as_path();
        match self.fetch(&key, None).await {
            Ok(Some(item)) => item.value,
            Ok(None) => default.into(),
            Err(err) => {
                warn!("KV read of {} failed, falling back to default: {}", key, err);
                default.into()
            }
        }
    }

    /// 读取值，区分不存在（`Ok(None)`）与失败（`Err`）
    pub async fn try_get_value(
        &self,
        path: impl Into<KeyPath>,
        datacenter: Option<&str>,
    ) -> Result<Option<Vec<u8>>> {
        let key = path.into().as_path();
        Ok(self.fetch(&key, datacenter).await?.map(|item| item.value))
    }

    /// 创建 key
    ///
    /// 1. 读取当前条目；
    /// 2. 已存在则返回 `AlreadyExists`；
    /// 3. 否则以原始值做普通 PUT。
    ///
    /// 存在性探测失败与"不存在"同样处理，继续写入。
    pub async fn create_key(
        &self,
        path: impl Into<KeyPath>,
        value: impl Into<Bytes>,
        datacenter: Option<&str>,
    ) -> Result<()> {
        let key = require_key(path.into())?;

        match self.fetch(&key, datacenter).await {
            Ok(Some(existing)) => {
                debug!(
                    "KV create rejected: {} already exists at index {}",
                    key, existing.modify_index
                );
                return Err(ConsulError::AlreadyExists(key));
            }
            Ok(None) => {}
            Err(err) => {
                debug!("KV existence check for {} failed, writing anyway: {}", key, err);
            }
        }

        self.write(&key, value.into(), None, datacenter).await
    }

    /// 仅在 key 不存在时创建（`cas=0`，由存储端原子判定）
    ///
    /// 只有一次往返；已存在与写入被拒都表现为 `Conflict`。
    pub async fn create_key_if_absent(
        &self,
        path: impl Into<KeyPath>,
        value: impl Into<Bytes>,
        datacenter: Option<&str>,
    ) -> Result<()> {
        let key = require_key(path.into())?;
        self.write(&key, value.into(), Some(0), datacenter).await
    }

    /// 更新 key
    ///
    /// 1. 读取当前条目，不存在返回 `NotFound`；
    /// 2. `expected_modify_index` 为 `Some` 时以 `cas=<index>` 写入，索引已变化时
    ///    远端拒绝，返回 `Conflict`；为 `None` 时不带 `cas`，直接覆盖。
    ///
    /// 给出的索引原样发送，不会用探测到的索引替换。
    pub async fn update_key(
        &self,
        path: impl Into<KeyPath>,
        value: impl Into<Bytes>,
        expected_modify_index: Option<u64>,
        datacenter: Option<&str>,
    ) -> Result<()> {
        let key = require_key(path.into())?;

        let current = self
            .fetch(&key, datacenter)
            .await?
            .ok_or_else(|| ConsulError::NotFound(key.clone()))?;

        if let Some(expected) = expected_modify_index {
            if current.modify_index != expected {
                debug!(
                    "KV update of {} uses stale index {} (current {}), store will reject",
                    key, expected, current.modify_index
                );
            }
        }

        self.write(&key, value.into(), expected_modify_index, datacenter)
            .await
    }

    /// 删除单个 key（幂等，不存在也返回成功）
    pub async fn delete_key(&self, path: impl Into<KeyPath>, datacenter: Option<&str>) -> Result<()> {
        let key = require_key(path.into())?;
        let options = self.dc_options(datacenter);
        let body = self
            .transport
            .request(Method::Delete, &endpoint(&key), options)
            .await?;
        ensure_committed(&key, &body)
    }

    /// 递归删除命名空间下的全部 key（幂等）
    ///
    /// 命名空间按前缀匹配，`cfg` 同样会删除 `cfg-old/...`。
    pub async fn delete_subtree(&self, namespace: &str, datacenter: Option<&str>) -> Result<()> {
        let prefix = require_key(KeyPath::namespace_root(namespace))?;
        let options = self.dc_options(datacenter).flag("recurse");
        let body = self
            .transport
            .request(Method::Delete, &endpoint(&prefix), options)
            .await?;
        ensure_committed(&prefix, &body)
    }

    /// 列出 key 名
    ///
    /// # 参数
    /// * `namespace` - 仅列出该命名空间下的 key
    /// * `separator` - 在命名空间之后遇到分隔符即停止展开（折叠为目录）
    /// * `datacenter` - 数据中心覆盖
    pub async fn list_keys(
        &self,
        namespace: Option<&str>,
        separator: Option<&str>,
        datacenter: Option<&str>,
    ) -> Result<Vec<String>> {
        let options = self
            .dc_options(datacenter)
            .flag("keys")
            .query_opt("separator", separator.filter(|s| !s.is_empty()));

        match self
            .transport
            .request(Method::Get, &namespace_endpoint(namespace), options)
            .await
        {
            Ok(body) if body.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(body) => {
                let keys: Option<Vec<String>> = serde_json::from_slice(&body)?;
                Ok(keys.unwrap_or_default())
            }
            Err(err) if err.is_not_found_status() => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    /// 递归读取条目；`namespace` 为空时读取整个存储
    pub async fn list_items(
        &self,
        namespace: Option<&str>,
        datacenter: Option<&str>,
    ) -> Result<Vec<KvItem>> {
        let options = self.dc_options(datacenter).flag("recurse");
        match self
            .transport
            .request(Method::Get, &namespace_endpoint(namespace), options)
            .await
        {
            Ok(body) => decode_items(&body),
            Err(err) if err.is_not_found_status() => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    async fn fetch(&self, key: &str, datacenter: Option<&str>) -> Result<Option<KvItem>> {
        let options = self.dc_options(datacenter);
        match self
            .transport
            .request(Method::Get, &endpoint(key), options)
            .await
        {
            Ok(body) => Ok(decode_items(&body)?.into_iter().next()),
            Err(err) if err.is_not_found_status() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn write(
        &self,
        key: &str,
        value: Bytes,
        cas: Option<u64>,
        datacenter: Option<&str>,
    ) -> Result<()> {
        let mut options = self.dc_options(datacenter).body(value);
        if let Some(index) = cas {
            options = options.query("cas", index.to_string());
        }

        let body = self
            .transport
            .request(Method::Put, &endpoint(key), options)
            .await?;
        ensure_committed(key, &body)?;
        debug!("KV write committed: {} (cas: {:?})", key, cas);
        Ok(())
    }

    fn dc_options(&self, datacenter: Option<&str>) -> RequestOptions {
        RequestOptions::new().query_opt("dc", self.config.resolve_datacenter(datacenter))
    }
}

fn require_key(path: KeyPath) -> Result<String> {
    let key = path.as_path();
    if key.is_empty() {
        return Err(ConsulError::invalid_argument("key path must not be empty"));
    }
    Ok(key)
}

fn endpoint(key: &str) -> String {
    format!("{}/{}", KV_ENDPOINT, key)
}

fn namespace_endpoint(namespace: Option<&str>) -> String {
    match namespace.map(|ns| ns.trim_matches('/')).filter(|ns| !ns.is_empty()) {
        Some(ns) => format!("{}/{}/", KV_ENDPOINT, ns),
        None => format!("{}/", KV_ENDPOINT),
    }
}

fn ensure_committed(key: &str, body: &[u8]) -> Result<()> {
    if decode_write_result(body)? {
        Ok(())
    } else {
        Err(ConsulError::Conflict(key.to_string()))
    }
}
