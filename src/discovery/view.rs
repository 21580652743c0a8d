//! 健康记录投影与字段收窄

use serde_json::Value;
use std::fmt;

use super::record::HealthRecord;
use crate::error::{ConsulError, Result};

/// 投影视图
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum View {
    /// 完整记录
    #[default]
    None,
    Node,
    Service,
    Checks,
}

impl View {
    pub fn as_str(&self) -> &'static str {
        match self {
            View::None => "none",
            View::Node => "node",
            View::Service => "service",
            View::Checks => "checks",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 不区分大小写；空串和未知值都视为 [`View::None`]
impl From<&str> for View {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "node" => View::Node,
            "service" => View::Service,
            "checks" => View::Checks,
            _ => View::None,
        }
    }
}

impl From<Option<&str>> for View {
    fn from(value: Option<&str>) -> Self {
        value.map(View::from).unwrap_or_default()
    }
}

/// 按视图投影健康记录，保持输入顺序
///
/// `Checks` 视图的元素是检查数组，不是映射。
pub fn project(records: Vec<HealthRecord>, view: View) -> Vec<Value> {
    records
        .into_iter()
        .map(|record| match view {
            View::None => record.into_value(),
            View::Node => Value::Object(record.node),
            View::Service => Value::Object(record.service),
            View::Checks => Value::Array(record.checks),
        })
        .collect()
}

/// 只保留 `fields` 中列出的键
///
/// `fields` 为空时原样返回；任何元素不是映射时返回 `ContractViolation`。
pub fn narrow_fields<S: AsRef<str>>(items: Vec<Value>, fields: &[S]) -> Result<Vec<Value>> {
    if fields.is_empty() {
        return Ok(items);
    }

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(mut map) => {
                map.retain(|key, _| fields.iter().any(|field| field.as_ref() == key));
                Ok(Value::Object(map))
            }
            other => Err(ConsulError::contract_violation(format!(
                "cannot narrow element {} to fields: expected a mapping, found {}",
                index,
                kind(&other)
            ))),
        })
        .collect()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a mapping",
    }
}
