//! 健康发现模块
//!
//! 查询服务实例的健康记录，按视图投影、按字段收窄，并支持随机选取一个实例

pub mod client;
pub mod record;
pub mod selector;
pub mod view;

pub use client::{HealthClient, HealthQuery};
pub use record::HealthRecord;
pub use selector::{ServiceSelector, pick_one, pick_one_with};
pub use view::{View, narrow_fields, project};
