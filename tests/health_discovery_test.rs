//! 健康发现测试
//!
//! 通过进程内 agent 注册服务，验证投影、收窄、随机选取与失败传播。

use flare_consul_client::{
    ClientConfig, ConsulClient, ConsulError, HealthCheck, HealthQuery, MemoryTransport,
    ServiceDescriptor, View, pick_one,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

fn setup() -> (ConsulClient, MemoryTransport) {
    let agent = MemoryTransport::new();
    let client = ConsulClient::with_transport(ClientConfig::default(), Arc::new(agent.clone()))
        .expect("valid config");
    (client, agent)
}

/// 注册三个 web 实例，前两个检查为 passing，第三个保持 critical
async fn register_web_fleet(client: &ConsulClient, agent: &MemoryTransport) {
    for (i, port) in [(1, 8081u16), (2, 8082), (3, 8083)] {
        let id = format!("web-{}", i);
        let descriptor = ServiceDescriptor::new(&id, "web", format!("10.0.0.{}", i))
            .with_port(port)
            .with_tag("v1")
            .with_check(HealthCheck::http(
                format!("{}-http", id),
                "web http",
                format!("http://10.0.0.{}:{}/health", i, port),
            ));
        client.registry().register_service(&descriptor).await.unwrap();
    }
    assert!(agent.set_check_status("web-1-http", "passing").await);
    assert!(agent.set_check_status("web-2-http", "passing").await);
}

#[tokio::test]
async fn test_service_projection_preserves_order() {
    let (client, agent) = setup();
    register_web_fleet(&client, &agent).await;

    let query = HealthQuery::new("web").passing(false).view("Service");
    let services = client.health().health_services(&query).await.unwrap();

    let ids: Vec<_> = services.iter().map(|s| s["ID"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["web-1", "web-2", "web-3"]);
}

#[tokio::test]
async fn test_full_records_without_view() {
    let (client, agent) = setup();
    register_web_fleet(&client, &agent).await;

    let records = client
        .health()
        .health_services(&HealthQuery::new("web"))
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    for record in &records {
        assert!(record["Node"].is_object());
        assert!(record["Service"].is_object());
        assert!(record["Checks"].is_array());
    }
}

#[tokio::test]
async fn test_passing_filter() {
    let (client, agent) = setup();
    register_web_fleet(&client, &agent).await;
    let health = client.health();

    let passing = health.list_health_records("web", true, None).await.unwrap();
    assert_eq!(passing.len(), 2);
    assert!(passing.iter().all(|r| r.is_passing()));

    let all = health.list_health_records("web", false, None).await.unwrap();
    assert_eq!(all.len(), 3);
    assert!(!all[2].is_passing());

    let flags: Vec<_> = agent
        .requests()
        .await
        .into_iter()
        .filter_map(|r| r.query_value("passing").map(str::to_string))
        .collect();
    assert_eq!(flags, vec!["1".to_string(), "0".to_string()]);

    agent.set_check_status("web-3-http", "passing").await;
    let passing = health.list_health_records("web", true, None).await.unwrap();
    assert_eq!(passing.len(), 3);
}

#[tokio::test]
async fn test_field_narrowing() {
    let (client, agent) = setup();
    register_web_fleet(&client, &agent).await;

    let query = HealthQuery::new("web")
        .view(View::Service)
        .fields(["ID", "Port"]);
    let services = client.health().health_services(&query).await.unwrap();

    assert_eq!(
        services,
        vec![json!({"ID": "web-1", "Port": 8081}), json!({"ID": "web-2", "Port": 8082})]
    );
}

#[tokio::test]
async fn test_narrowing_checks_view_is_contract_violation() {
    let (client, agent) = setup();
    register_web_fleet(&client, &agent).await;

    let query = HealthQuery::new("web").view("checks").field("Status");
    let err = client.health().health_services(&query).await.unwrap_err();
    assert!(matches!(err, ConsulError::ContractViolation(_)));

    // 不收窄时 checks 视图正常返回
    let query = HealthQuery::new("web").view("checks");
    let checks = client.health().health_services(&query).await.unwrap();
    assert!(checks.iter().all(|c| c.is_array()));
}

#[tokio::test]
async fn test_pick_one_from_discovery() {
    let (client, agent) = setup();
    register_web_fleet(&client, &agent).await;

    let query = HealthQuery::new("web").view("service").field("ID");
    let picked = client
        .health()
        .health_service(&query)
        .await
        .unwrap()
        .expect("two healthy instances");
    let id = picked["ID"].as_str().unwrap();
    assert!(id == "web-1" || id == "web-2");
}

#[tokio::test]
async fn test_empty_discovery_is_none() {
    let (client, _agent) = setup();

    let picked = client
        .health()
        .health_service(&HealthQuery::new("nobody"))
        .await
        .unwrap();
    assert_eq!(picked, None);

    let address = client.selector().select_address("nobody").await.unwrap();
    assert_eq!(address, None);
}

#[tokio::test]
async fn test_failed_upstream_is_error() {
    let (client, agent) = setup();
    register_web_fleet(&client, &agent).await;
    agent.fail_path("v1/health").await;

    let err = client
        .health()
        .health_service(&HealthQuery::new("web"))
        .await
        .unwrap_err();
    assert!(err.is_transport());

    assert!(client.selector().select_service("web").await.is_err());
}

#[tokio::test]
async fn test_empty_service_name_is_rejected() {
    let (client, agent) = setup();
    let err = client
        .health()
        .list_health_records(" ", true, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ConsulError::InvalidArgument(_)));
    assert!(agent.requests().await.is_empty());
}

#[tokio::test]
async fn test_selector_only_returns_healthy_addresses() {
    let (client, agent) = setup();
    register_web_fleet(&client, &agent).await;
    let selector = client.selector();

    for _ in 0..50 {
        let address = selector.select_address("web").await.unwrap().unwrap();
        assert!(address == "10.0.0.1:8081" || address == "10.0.0.2:8082");
    }
}

#[test]
fn test_pick_one_is_uniform() {
    const TRIALS: usize = 30_000;
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for _ in 0..TRIALS {
        let picked = pick_one(vec!["a", "b", "c"]).unwrap();
        *counts.entry(picked).or_default() += 1;
    }

    let expected = TRIALS / 3;
    for key in ["a", "b", "c"] {
        let count = counts.get(key).copied().unwrap_or(0);
        let low = expected * 85 / 100;
        let high = expected * 115 / 100;
        assert!(
            (low..=high).contains(&count),
            "{} picked {} times, expected {}..={}",
            key,
            count,
            low,
            high
        );
    }
}

#[test]
fn test_pick_one_empty() {
    assert_eq!(pick_one(Vec::<serde_json::Value>::new()), None);
}
