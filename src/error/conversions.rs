//! 错误类型转换实现

use super::ConsulError;
use std::io;

impl From<io::Error> for ConsulError {
    fn from(err: io::Error) -> Self {
        ConsulError::config(format!("IO error: {}", err))
    }
}

impl From<reqwest::Error> for ConsulError {
    fn from(err: reqwest::Error) -> Self {
        ConsulError::transport(err.to_string())
    }
}

impl From<base64::DecodeError> for ConsulError {
    fn from(err: base64::DecodeError) -> Self {
        ConsulError::decode(err.to_string())
    }
}

impl From<toml::de::Error> for ConsulError {
    fn from(err: toml::de::Error) -> Self {
        ConsulError::config(format!("invalid TOML: {}", err))
    }
}
