//! 统一结果信封
//!
//! 批量调用方可以把 `Result` 折叠成数据形态的成功/失败包装，
//! 不必在每个调用点处理错误分支。

use super::{ConsulError, ErrorCode};
use serde::{Deserialize, Serialize};

/// 统一结果信封 `{ failed, message, data }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// 是否失败
    pub failed: bool,
    /// 失败信息或附加说明
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// 失败时的错误代码
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    /// 远端返回非 2xx 时的状态码
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// 负载
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// 成功信封
    pub fn success(data: T) -> Self {
        Self {
            failed: false,
            message: None,
            code: None,
            status: None,
            data: Some(data),
        }
    }

    /// 失败信封
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            failed: true,
            message: Some(message.into()),
            code: None,
            status: None,
            data: None,
        }
    }

    /// 附加说明信息
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_success(&self) -> bool {
        !self.failed
    }

    /// 转回 `Result`
    ///
    /// 按 `code` 还原错误变体，变体的负载为信封中的 `message`。
    /// 没有 `code` 的失败信封还原为 `Transport`；序列化错误无法还原原始
    /// `serde_json::Error`，以 `Decode` 代替。
    pub fn into_result(self) -> Result<Option<T>, ConsulError> {
        if !self.failed {
            return Ok(self.data);
        }
        let message = self.message.unwrap_or_default();
        let err = match (self.code, self.status) {
            (_, Some(status)) => ConsulError::Status {
                status,
                body: message,
            },
            (Some(code), None) => ConsulError::from_code(code, message),
            (None, None) => ConsulError::Transport(message),
        };
        Err(err)
    }
}

impl<T> From<Result<T, ConsulError>> for Envelope<T> {
    fn from(result: Result<T, ConsulError>) -> Self {
        match result {
            Ok(data) => Envelope::success(data),
            Err(err) => {
                let status = match &err {
                    ConsulError::Status { status, .. } => Some(*status),
                    _ => None,
                };
                Envelope {
                    failed: true,
                    message: Some(err.to_string()),
                    code: Some(err.code()),
                    status,
                    data: None,
                }
            }
        }
    }
}
