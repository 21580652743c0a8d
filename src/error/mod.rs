//! 错误处理模块
//!
//! 提供统一的错误类型、错误代码分类，以及数据形态的结果信封

pub mod code;
pub mod consul_error;
pub mod conversions;
pub mod envelope;

pub use code::{ErrorCategory, ErrorCode};
pub use consul_error::{ConsulError, Result};
pub use envelope::Envelope;
