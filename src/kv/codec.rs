//! Key 路径与 KV 条目编解码

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ConsulError, Result};

/// KV 端点前缀
pub const KV_ENDPOINT: &str = "v1/kv";

/// 路径分隔符
pub const SEPARATOR: char = '/';

/// 拼接 key 路径
///
/// 只拼接存在且非空的段，段两端多余的 `/` 会被去掉。
/// 命名空间存在而 key 为空时，得到的是命名空间根路径。
///
/// ```
/// use flare_consul_client::kv::build_path;
///
/// assert_eq!(build_path(Some("cfg"), Some("feature-x")), "cfg/feature-x");
/// assert_eq!(build_path(Some("cfg"), Some("")), "cfg");
/// assert_eq!(build_path(None, Some("feature-x")), "feature-x");
/// ```
pub fn build_path(namespace: Option<&str>, key: Option<&str>) -> String {
    [namespace, key]
        .into_iter()
        .flatten()
        .map(|segment| segment.trim_matches(SEPARATOR))
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// 解码 base64 值
pub fn decode_value(text: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(text.trim())
        .map_err(|e| ConsulError::decode(format!("invalid base64 value: {}", e)))
}

/// 编码为 base64
pub fn encode_value(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Key 路径：可选命名空间 + 可选 key 名
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KeyPath {
    pub namespace: Option<String>,
    pub key: Option<String>,
}

impl KeyPath {
    /// 不带命名空间的 key
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            namespace: None,
            key: Some(key.into()),
        }
    }

    /// 命名空间下的 key
    pub fn in_namespace(namespace: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            key: Some(key.into()),
        }
    }

    /// 命名空间根
    pub fn namespace_root(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            key: None,
        }
    }

    /// 拼接后的路径
    pub fn as_path(&self) -> String {
        build_path(self.namespace.as_deref(), self.key.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.as_path().is_empty()
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_path())
    }
}

impl From<&str> for KeyPath {
    fn from(key: &str) -> Self {
        KeyPath::new(key)
    }
}

impl From<String> for KeyPath {
    fn from(key: String) -> Self {
        KeyPath::new(key)
    }
}

impl From<&String> for KeyPath {
    fn from(key: &String) -> Self {
        KeyPath::new(key.as_str())
    }
}

impl From<(&str, &str)> for KeyPath {
    fn from((namespace, key): (&str, &str)) -> Self {
        KeyPath::in_namespace(namespace, key)
    }
}

/// KV 条目在线格式
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireItem {
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub create_index: u64,
    #[serde(default)]
    pub modify_index: u64,
    #[serde(default)]
    pub lock_index: u64,
    #[serde(default)]
    pub flags: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
}

/// KV 条目
///
/// `modify_index` 由远端在每次成功写入时分配，本地从不计算。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvItem {
    pub key: String,
    pub value: Vec<u8>,
    pub create_index: u64,
    pub modify_index: u64,
    pub lock_index: u64,
    pub flags: u64,
    pub session: Option<String>,
}

impl KvItem {
    /// 从在线格式解码，`Value` 为 null 时视为空值
    pub fn from_wire(wire: WireItem) -> Result<Self> {
        let value = match wire.value.as_deref() {
            Some(text) => decode_value(text)?,
            None => Vec::new(),
        };
        Ok(Self {
            key: wire.key,
            value,
            create_index: wire.create_index,
            modify_index: wire.modify_index,
            lock_index: wire.lock_index,
            flags: wire.flags,
            session: wire.session,
        })
    }

    /// 值按 UTF-8 解读
    pub fn value_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.value).ok()
    }
}

/// 解码 KV 读取响应（JSON 数组），空响应体视为空数组
pub fn decode_items(body: &[u8]) -> Result<Vec<KvItem>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    let wire: Option<Vec<WireItem>> = serde_json::from_slice(body)?;
    wire.unwrap_or_default()
        .into_iter()
        .map(KvItem::from_wire)
        .collect()
}

/// 解码写入响应：truthy 表示已提交
pub fn decode_write_result(body: &[u8]) -> Result<bool> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(false);
    }
    let value: serde_json::Value = serde_json::from_slice(body)?;
    Ok(is_truthy(&value))
}

fn is_truthy(value: &serde_json::Value) -> bool {
    use serde_json::Value;
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0" && !s.eq_ignore_ascii_case("false"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
