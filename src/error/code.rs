//! 错误代码和错误类别定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 错误代码枚举
///
/// 错误代码按类别分组，每个类别占用1000个代码范围：
/// - 1000-1999: 传输相关错误
/// - 2000-2999: KV 存储一致性相关错误
/// - 3000-3999: 编解码相关错误
/// - 4000-4999: 调用方/配置相关错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u32)]
pub enum ErrorCode {
    // ============================================================
    // 传输相关错误 (1000-1999)
    // ============================================================
    TransportFailed = 1000,
    HttpStatus = 1001,
    ServiceUnavailable = 1002,

    // ============================================================
    // KV 存储一致性相关错误 (2000-2999)
    // ============================================================
    KeyAlreadyExists = 2000,
    KeyNotFound = 2001,
    WriteRejected = 2002,

    // ============================================================
    // 编解码相关错误 (3000-3999)
    // ============================================================
    DecodeFailed = 3000,
    SerializationError = 3001,

    // ============================================================
    // 调用方/配置相关错误 (4000-4999)
    // ============================================================
    InvalidArgument = 4000,
    ContractViolation = 4001,
    ConfigurationError = 4002,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ErrorCode {
    /// 获取错误代码的数字值
    #[inline]
    pub fn as_u32(&self) -> u32 {
        *self as u32
    }

    /// 获取错误代码的英文标识符
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::TransportFailed => "TRANSPORT_FAILED",
            ErrorCode::HttpStatus => "HTTP_STATUS",
            ErrorCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorCode::KeyAlreadyExists => "KEY_ALREADY_EXISTS",
            ErrorCode::KeyNotFound => "KEY_NOT_FOUND",
            ErrorCode::WriteRejected => "WRITE_REJECTED",
            ErrorCode::DecodeFailed => "DECODE_FAILED",
            ErrorCode::SerializationError => "SERIALIZATION_ERROR",
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::ContractViolation => "CONTRACT_VIOLATION",
            ErrorCode::ConfigurationError => "CONFIGURATION_ERROR",
        }
    }

    /// 获取错误代码的类别
    pub fn category(&self) -> ErrorCategory {
        match self.as_u32() {
            1000..=1999 => ErrorCategory::Transport,
            2000..=2999 => ErrorCategory::Consistency,
            3000..=3999 => ErrorCategory::Codec,
            _ => ErrorCategory::Client,
        }
    }

    /// 判断调用方是否可以考虑重试
    ///
    /// 客户端本身从不自动重试。`WriteRejected` 不在其中：CAS 冲突后
    /// 必须重新读取最新的 modify index 再决定是否写入。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::TransportFailed | ErrorCode::ServiceUnavailable
        )
    }
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    Transport,
    Consistency,
    Codec,
    Client,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Transport => write!(f, "TRANSPORT"),
            ErrorCategory::Consistency => write!(f, "CONSISTENCY"),
            ErrorCategory::Codec => write!(f, "CODEC"),
            ErrorCategory::Client => write!(f, "CLIENT"),
        }
    }
}
