//! 健康记录

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 检查通过时的状态值
pub const STATUS_PASSING: &str = "passing";

/// 一条健康记录：节点、服务实例及其全部检查
///
/// 三个顶层字段之外的内容保存在 `extra` 中，投影为完整记录时原样带回。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    #[serde(rename = "Node", default)]
    pub node: Map<String, Value>,
    #[serde(rename = "Service", default)]
    pub service: Map<String, Value>,
    #[serde(rename = "Checks", default)]
    pub checks: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HealthRecord {
    /// 服务实例 ID
    pub fn service_id(&self) -> Option<&str> {
        self.service.get("ID").and_then(Value::as_str)
    }

    /// 服务名
    pub fn service_name(&self) -> Option<&str> {
        self.service.get("Service").and_then(Value::as_str)
    }

    /// 服务端口
    pub fn port(&self) -> Option<u16> {
        self.service
            .get("Port")
            .and_then(Value::as_u64)
            .and_then(|port| u16::try_from(port).ok())
    }

    /// 实例地址 `host:port`
    ///
    /// 服务未声明地址时回退到节点地址；两者都没有时返回 `None`。
    pub fn address(&self) -> Option<String> {
        let host = non_empty_str(&self.service, "Address")
            .or_else(|| non_empty_str(&self.node, "Address"))?;
        Some(match self.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        })
    }

    /// 全部检查是否都处于 passing
    pub fn is_passing(&self) -> bool {
        self.checks
            .iter()
            .all(|check| check.get("Status").and_then(Value::as_str) == Some(STATUS_PASSING))
    }

    /// 完整记录的映射形式
    pub fn into_value(self) -> Value {
        let mut map = self.extra;
        map.insert("Node".to_string(), Value::Object(self.node));
        map.insert("Service".to_string(), Value::Object(self.service));
        map.insert("Checks".to_string(), Value::Array(self.checks));
        Value::Object(map)
    }
}

fn non_empty_str<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}
