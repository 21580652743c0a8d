//! 进程内 Consul agent 模拟（用于测试和本地开发）
//!
//! 覆盖客户端用到的 KV、agent service 与 health 端点，
//! 按 Consul 的规则维护 modify index 并执行 CAS 判定。

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::{Method, RequestOptions, Transport};
use crate::error::{ConsulError, Result};
use crate::kv::codec::{WireItem, encode_value};

/// 模拟 agent 的节点名
pub const NODE_NAME: &str = "memory-agent";

/// 模拟 agent 的默认数据中心
pub const DEFAULT_DATACENTER: &str = "dc1";

const SERF_CHECK_ID: &str = "serfHealth";

/// 已记录的请求
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl RecordedRequest {
    /// 查找查询参数（取第一个）
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
struct StoredItem {
    value: Vec<u8>,
    create_index: u64,
    modify_index: u64,
    flags: u64,
}

#[derive(Debug, Clone)]
struct CheckState {
    id: String,
    name: String,
    status: String,
}

#[derive(Debug, Clone)]
struct RegisteredService {
    service: Value,
    checks: Vec<CheckState>,
}

/// 注入的故障：`method` 为空时匹配所有方法
#[derive(Debug, Clone)]
struct InjectedFailure {
    method: Option<Method>,
    prefix: String,
}

impl InjectedFailure {
    fn matches(&self, method: Method, path: &str) -> bool {
        self.method.is_none_or(|m| m == method) && path.starts_with(self.prefix.as_str())
    }
}

#[derive(Debug, Default)]
struct AgentState {
    datacenter: String,
    index: u64,
    kv: BTreeMap<String, StoredItem>,
    services: BTreeMap<String, RegisteredService>,
    requests: Vec<RecordedRequest>,
    failures: Vec<InjectedFailure>,
}

/// 进程内 agent
///
/// 克隆共享同一份状态。
#[derive(Clone)]
pub struct MemoryTransport {
    state: Arc<RwLock<AgentState>>,
}

impl MemoryTransport {
    /// 创建新的模拟 agent，数据中心为 `dc1`
    pub fn new() -> Self {
        Self::with_datacenter(DEFAULT_DATACENTER)
    }

    /// 指定数据中心名创建模拟 agent
    pub fn with_datacenter(datacenter: impl Into<String>) -> Self {
        let state = AgentState {
            datacenter: datacenter.into(),
            ..Default::default()
        };
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// 已收到的全部请求（按顺序）
    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.state.read().await.requests.clone()
    }

    /// 清空请求记录
    pub async fn clear_requests(&self) {
        self.state.write().await.requests.clear();
    }

    /// 以该前缀开头的路径在恢复前都返回传输错误
    pub async fn fail_path(&self, prefix: impl Into<String>) {
        self.state.write().await.failures.push(InjectedFailure {
            method: None,
            prefix: prefix.into(),
        });
    }

    /// 只让指定方法、以该前缀开头的请求返回传输错误
    pub async fn fail_request(&self, method: Method, prefix: impl Into<String>) {
        self.state.write().await.failures.push(InjectedFailure {
            method: Some(method),
            prefix: prefix.into(),
        });
    }

    /// 恢复所有故障
    pub async fn clear_failures(&self) {
        self.state.write().await.failures.clear();
    }

    /// 设置某个健康检查的状态（passing / warning / critical）
    ///
    /// 返回是否找到该检查
    pub async fn set_check_status(&self, check_id: &str, status: &str) -> bool {
        let mut state = self.state.write().await;
        for registered in state.services.values_mut() {
            if let Some(check) = registered.checks.iter_mut().find(|c| c.id == check_id) {
                check.status = status.to_string();
                return true;
            }
        }
        false
    }

    /// 读取某个 key 当前的 modify index
    pub async fn modify_index(&self, key: &str) -> Option<u64> {
        self.state.read().await.kv.get(key).map(|item| item.modify_index)
    }

    /// 当前存储的 key 数量
    pub async fn kv_len(&self) -> usize {
        self.state.read().await.kv.len()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn request(&self, method: Method, path: &str, options: RequestOptions) -> Result<Bytes> {
        let path = path.trim_start_matches('/');
        let mut state = self.state.write().await;

        state.requests.push(RecordedRequest {
            method,
            path: path.to_string(),
            query: options.query.clone(),
            body: options.body.clone(),
        });
        debug!("memory agent: {} {} {:?}", method, path, options.query);

        if let Some(failure) = state
            .failures
            .iter()
            .find(|failure| failure.matches(method, path))
        {
            return Err(ConsulError::transport(format!(
                "connection refused (injected failure on {} {})",
                method, failure.prefix
            )));
        }

        if let Some(dc) = options.query_value("dc") {
            if dc != state.datacenter {
                return Err(status(500, format!("No path to datacenter {}", dc)));
            }
        }

        if path == "v1/kv" || path.starts_with("v1/kv/") {
            let key = path
                .strip_prefix("v1/kv")
                .map(|rest| rest.strip_prefix('/').unwrap_or(rest))
                .unwrap_or_default();
            return match method {
                Method::Get => state.kv_get(key, &options),
                Method::Put => state.kv_put(key, &options),
                Method::Delete => state.kv_delete(key, &options),
            };
        }

        match method {
            Method::Get if path == "v1/agent/services" => state.list_services(),
            Method::Put if path == "v1/agent/service/register" => state.register(&options),
            Method::Put if path.starts_with("v1/agent/service/deregister/") => {
                state.deregister(&path["v1/agent/service/deregister/".len()..])
            }
            Method::Get if path.starts_with("v1/agent/service/") => {
                state.get_service(&path["v1/agent/service/".len()..])
            }
            Method::Get if path.starts_with("v1/health/service/") => {
                state.health(&path["v1/health/service/".len()..], &options)
            }
            _ => Err(status(404, format!("unsupported endpoint {} {}", method, path))),
        }
    }
}

impl AgentState {
    fn kv_get(&self, key: &str, options: &RequestOptions) -> Result<Bytes> {
        if options.has_query("keys") {
            let separator = options.query_value("separator").filter(|s| !s.is_empty());
            let mut keys: Vec<String> = self
                .kv
                .keys()
                .filter(|name| name.starts_with(key))
                .map(|name| fold_key(name, key, separator))
                .collect();
            keys.dedup();
            if keys.is_empty() {
                return Err(status(404, ""));
            }
            return to_body(&keys);
        }

        let items: Vec<WireItem> = if options.has_query("recurse") {
            self.kv
                .iter()
                .filter(|(name, _)| name.starts_with(key))
                .map(|(name, item)| to_wire(name, item))
                .collect()
        } else {
            self.kv
                .get(key)
                .map(|item| to_wire(key, item))
                .into_iter()
                .collect()
        };

        if items.is_empty() {
            return Err(status(404, ""));
        }
        to_body(&items)
    }

    fn kv_put(&mut self, key: &str, options: &RequestOptions) -> Result<Bytes> {
        if key.is_empty() {
            return Err(status(400, "Missing key name"));
        }
        let cas = parse_index(options.query_value("cas"))?;
        let flags = parse_index(options.query_value("flags"))?.unwrap_or(0);
        let current = self.kv.get(key).map(|item| item.modify_index);

        if let Some(expected) = cas {
            if !cas_matches(expected, current) {
                debug!(
                    "memory agent: CAS rejected for {} (expected {}, current {:?})",
                    key, expected, current
                );
                return Ok(Bytes::from_static(b"false"));
            }
        }

        let value = options
            .body
            .as_ref()
            .map(|body| body.to_vec())
            .unwrap_or_default();

        self.index += 1;
        let index = self.index;
        match self.kv.get_mut(key) {
            Some(item) => {
                item.value = value;
                item.flags = flags;
                item.modify_index = index;
            }
            None => {
                self.kv.insert(
                    key.to_string(),
                    StoredItem {
                        value,
                        create_index: index,
                        modify_index: index,
                        flags,
                    },
                );
            }
        }
        Ok(Bytes::from_static(b"true"))
    }

    fn kv_delete(&mut self, key: &str, options: &RequestOptions) -> Result<Bytes> {
        let before = self.kv.len();
        if options.has_query("recurse") {
            self.kv.retain(|name, _| !name.starts_with(key));
        } else {
            if let Some(expected) = parse_index(options.query_value("cas"))? {
                let current = self.kv.get(key).map(|item| item.modify_index);
                if !cas_matches(expected, current) {
                    return Ok(Bytes::from_static(b"false"));
                }
            }
            self.kv.remove(key);
        }
        if self.kv.len() != before {
            self.index += 1;
        }
        Ok(Bytes::from_static(b"true"))
    }

    fn list_services(&self) -> Result<Bytes> {
        let services: Map<String, Value> = self
            .services
            .iter()
            .map(|(id, registered)| (id.clone(), registered.service.clone()))
            .collect();
        to_body(&services)
    }

    fn get_service(&self, id: &str) -> Result<Bytes> {
        match self.services.get(id) {
            Some(registered) => to_body(&registered.service),
            None => Err(status(404, format!("unknown service ID: {}", id))),
        }
    }

    fn register(&mut self, options: &RequestOptions) -> Result<Bytes> {
        let body = options
            .body
            .as_ref()
            .ok_or_else(|| status(400, "Request decode failed: empty body"))?;
        let payload: Value = serde_json::from_slice(body)
            .map_err(|e| status(400, format!("Request decode failed: {}", e)))?;
        let obj = payload
            .as_object()
            .ok_or_else(|| status(400, "Request decode failed: expected object"))?;

        let name = str_field(obj, "Name").ok_or_else(|| status(400, "Missing service name"))?;
        let id = str_field(obj, "ID").unwrap_or_else(|| name.clone());

        let mut raw_checks: Vec<&Value> = Vec::new();
        if let Some(Value::Array(checks)) = field(obj, "Checks") {
            raw_checks.extend(checks.iter());
        }
        if let Some(check @ Value::Object(_)) = field(obj, "Check") {
            raw_checks.push(check);
        }

        let mut checks = Vec::with_capacity(raw_checks.len());
        for (i, raw) in raw_checks.into_iter().enumerate() {
            let Some(check) = raw.as_object() else {
                return Err(status(400, "Request decode failed: invalid check"));
            };
            checks.push(CheckState {
                id: str_field(check, "ID")
                    .or_else(|| str_field(check, "CheckID"))
                    .unwrap_or_else(|| format!("service:{}:{}", id, i + 1)),
                name: str_field(check, "Name")
                    .unwrap_or_else(|| format!("Service '{}' check", name)),
                status: str_field(check, "Status").unwrap_or_else(|| "critical".to_string()),
            });
        }

        let service = json!({
            "ID": id,
            "Service": name,
            "Tags": field(obj, "Tags").cloned().unwrap_or_else(|| json!([])),
            "Meta": field(obj, "Meta").cloned().unwrap_or_else(|| json!({})),
            "Port": field(obj, "Port").and_then(Value::as_u64).unwrap_or(0),
            "Address": str_field(obj, "Address").unwrap_or_default(),
            "Datacenter": self.datacenter,
        });

        self.services
            .insert(id, RegisteredService { service, checks });
        Ok(Bytes::new())
    }

    fn deregister(&mut self, id: &str) -> Result<Bytes> {
        match self.services.remove(id) {
            Some(_) => Ok(Bytes::new()),
            None => Err(status(404, format!("Unknown service ID {:?}", id))),
        }
    }

    fn health(&self, name: &str, options: &RequestOptions) -> Result<Bytes> {
        let passing_only = matches!(options.query_value("passing"), Some("1") | Some("true"));
        let node = json!({
            "ID": "00000000-0000-0000-0000-000000000001",
            "Node": NODE_NAME,
            "Address": "127.0.0.1",
            "Datacenter": self.datacenter,
            "Meta": {},
        });

        let mut records = Vec::new();
        for registered in self.services.values() {
            if registered.service.get("Service").and_then(Value::as_str) != Some(name) {
                continue;
            }
            let service_id = registered.service.get("ID").cloned().unwrap_or(Value::Null);

            let mut checks = vec![json!({
                "Node": NODE_NAME,
                "CheckID": SERF_CHECK_ID,
                "Name": "Serf Health Status",
                "Status": "passing",
                "ServiceID": "",
                "ServiceName": "",
            })];
            for check in &registered.checks {
                checks.push(json!({
                    "Node": NODE_NAME,
                    "CheckID": check.id,
                    "Name": check.name,
                    "Status": check.status,
                    "ServiceID": service_id,
                    "ServiceName": name,
                }));
            }

            if passing_only && registered.checks.iter().any(|c| c.status != "passing") {
                continue;
            }

            records.push(json!({
                "Node": node,
                "Service": registered.service,
                "Checks": checks,
            }));
        }
        to_body(&records)
    }
}

/// 在 `prefix` 之后的第一个分隔符处截断 key（保留分隔符）
fn fold_key(name: &str, prefix: &str, separator: Option<&str>) -> String {
    if let Some(sep) = separator {
        if let Some(pos) = name[prefix.len()..].find(sep) {
            return name[..prefix.len() + pos + sep.len()].to_string();
        }
    }
    name.to_string()
}

/// `cas=0` 仅在 key 不存在时成立，其余要求索引完全相等
fn cas_matches(expected: u64, current: Option<u64>) -> bool {
    match (expected, current) {
        (0, None) => true,
        (_, Some(index)) => expected == index,
        (_, None) => false,
    }
}

fn parse_index(raw: Option<&str>) -> Result<Option<u64>> {
    raw.map(|value| {
        value
            .parse::<u64>()
            .map_err(|_| status(400, format!("Request decode failed: invalid index {:?}", value)))
    })
    .transpose()
}

fn to_wire(name: &str, item: &StoredItem) -> WireItem {
    WireItem {
        key: name.to_string(),
        value: (!item.value.is_empty()).then(|| encode_value(&item.value)),
        create_index: item.create_index,
        modify_index: item.modify_index,
        lock_index: 0,
        flags: item.flags,
        session: None,
    }
}

fn field<'a>(obj: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    obj.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v)
}

fn str_field(obj: &Map<String, Value>, name: &str) -> Option<String> {
    field(obj, name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn to_body<T: serde::Serialize + ?Sized>(value: &T) -> Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(value)?))
}

fn status(code: u16, body: impl Into<String>) -> ConsulError {
    ConsulError::Status {
        status: code,
        body: body.into(),
    }
}
