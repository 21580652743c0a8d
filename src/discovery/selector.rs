//! 随机选择

use rand::Rng;

use super::client::HealthClient;
use super::record::HealthRecord;
use crate::error::Result;

/// 等概率随机取出一个元素，空输入返回 `None`
pub fn pick_one<T>(items: Vec<T>) -> Option<T> {
    pick_one_with(items, &mut rand::thread_rng())
}

/// 使用给定随机源等概率取出一个元素
pub fn pick_one_with<T, R: Rng + ?Sized>(mut items: Vec<T>, rng: &mut R) -> Option<T> {
    if items.is_empty() {
        return None;
    }
    let index = rng.gen_range(0..items.len());
    Some(items.swap_remove(index))
}

/// 服务实例选择器
///
/// 每次选择都重新查询健康记录，只在 passing 实例中随机选择。
#[derive(Clone)]
pub struct ServiceSelector {
    health: HealthClient,
}

impl ServiceSelector {
    pub fn new(health: HealthClient) -> Self {
        Self { health }
    }

    /// 选择一个健康实例；没有健康实例时返回 `Ok(None)`
    pub async fn select_service(&self, service_name: &str) -> Result<Option<HealthRecord>> {
        let records = self
            .health
            .list_health_records(service_name, true, None)
            .await?;
        Ok(pick_one(records))
    }

    /// 选择一个健康实例的地址（`host:port`）
    pub async fn select_address(&self, service_name: &str) -> Result<Option<String>> {
        Ok(self
            .select_service(service_name)
            .await?
            .and_then(|record| record.address()))
    }
}
