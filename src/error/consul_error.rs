//! Consul 客户端统一错误类型

use super::code::ErrorCode;
use thiserror::Error;

/// Consul 客户端统一错误类型
///
/// 所有公开操作都以 `Result<T, ConsulError>` 返回，正常失败路径不会 panic。
#[derive(Error, Debug)]
pub enum ConsulError {
    /// 网络/传输层失败，消息原样透传自传输适配器
    #[error("transport error: {0}")]
    Transport(String),

    /// 远端返回非 2xx 状态码
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// 值编码非法（base64）
    #[error("decode error: {0}")]
    Decode(String),

    /// JSON 编解码失败
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// create 前置存在性检查命中
    #[error("key already exists: {0}")]
    AlreadyExists(String),

    /// update 前置存在性检查未命中
    #[error("key does not exist: {0}")]
    NotFound(String),

    /// 写入被存储拒绝（CAS 不匹配或其他原因，不做区分）
    #[error("write rejected for key {0}: stale modify index or store refusal")]
    Conflict(String),

    /// 调用方违反了数据形状约定（例如对非映射元素做字段收窄）
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// 参数非法
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// 配置错误
    #[error("configuration error: {0}")]
    Config(String),
}

impl ConsulError {
    /// 创建传输错误
    pub fn transport(msg: impl Into<String>) -> Self {
        ConsulError::Transport(msg.into())
    }

    /// 创建解码错误
    pub fn decode(msg: impl Into<String>) -> Self {
        ConsulError::Decode(msg.into())
    }

    /// 创建约定违反错误
    pub fn contract_violation(msg: impl Into<String>) -> Self {
        ConsulError::ContractViolation(msg.into())
    }

    /// 创建参数错误
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        ConsulError::InvalidArgument(msg.into())
    }

    /// 创建配置错误
    pub fn config(msg: impl Into<String>) -> Self {
        ConsulError::Config(msg.into())
    }

    /// 由错误代码和消息构造错误
    ///
    /// 状态码类错误没有状态码可还原，退化为 `Transport`。
    pub fn from_code(code: ErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            ErrorCode::TransportFailed
            | ErrorCode::HttpStatus
            | ErrorCode::ServiceUnavailable => ConsulError::Transport(message),
            ErrorCode::KeyAlreadyExists => ConsulError::AlreadyExists(message),
            ErrorCode::KeyNotFound => ConsulError::NotFound(message),
            ErrorCode::WriteRejected => ConsulError::Conflict(message),
            ErrorCode::DecodeFailed | ErrorCode::SerializationError => ConsulError::Decode(message),
            ErrorCode::InvalidArgument => ConsulError::InvalidArgument(message),
            ErrorCode::ContractViolation => ConsulError::ContractViolation(message),
            ErrorCode::ConfigurationError => ConsulError::Config(message),
        }
    }

    /// 获取错误代码
    pub fn code(&self) -> ErrorCode {
        match self {
            ConsulError::Transport(_) => ErrorCode::TransportFailed,
            ConsulError::Status { status, .. } if *status >= 500 => ErrorCode::ServiceUnavailable,
            ConsulError::Status { .. } => ErrorCode::HttpStatus,
            ConsulError::Decode(_) => ErrorCode::DecodeFailed,
            ConsulError::Serialization(_) => ErrorCode::SerializationError,
            ConsulError::AlreadyExists(_) => ErrorCode::KeyAlreadyExists,
            ConsulError::NotFound(_) => ErrorCode::KeyNotFound,
            ConsulError::Conflict(_) => ErrorCode::WriteRejected,
            ConsulError::ContractViolation(_) => ErrorCode::ContractViolation,
            ConsulError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            ConsulError::Config(_) => ErrorCode::ConfigurationError,
        }
    }

    /// 是否为传输层错误（网络失败或非 2xx 响应）
    pub fn is_transport(&self) -> bool {
        matches!(self, ConsulError::Transport(_) | ConsulError::Status { .. })
    }

    /// 远端是否明确回复了 404
    pub fn is_not_found_status(&self) -> bool {
        matches!(self, ConsulError::Status { status: 404, .. })
    }

    /// 判断调用方是否可以考虑重试
    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, ConsulError>;
