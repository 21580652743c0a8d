//! KV 存储模块
//!
//! 层级 key/value 存储客户端，写入遵循远端的乐观并发（modify index）约定

pub mod client;
pub mod codec;

pub use client::KvClient;
pub use codec::{KeyPath, KvItem, build_path, decode_value, encode_value};
