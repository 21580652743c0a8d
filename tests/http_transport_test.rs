//! HTTP 传输测试
//!
//! 使用 wiremock 模拟 Consul agent，验证请求形态与状态码映射。

use flare_consul_client::{ClientConfig, ConsulClient, ConsulError, HealthQuery, View};
use serde_json::json;
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> ConsulClient {
    ConsulClient::new(ClientConfig::new(server.uri())).unwrap()
}

#[tokio::test]
async fn test_kv_read_decodes_item() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/cfg/feature-x"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "Key": "cfg/feature-x",
            "Value": "b24=",
            "CreateIndex": 5,
            "ModifyIndex": 7,
            "LockIndex": 0,
            "Flags": 0
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let item = client_for(&server)
        .kv()
        .get_item(("cfg", "feature-x"), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.value, b"on".to_vec());
    assert_eq!(item.modify_index, 7);
    assert_eq!(item.create_index, 5);
}

#[tokio::test]
async fn test_kv_read_404_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/cfg/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let item = client_for(&server)
        .kv()
        .get_item("cfg/missing", None)
        .await
        .unwrap();
    assert_eq!(item, None);
}

#[tokio::test]
async fn test_update_sends_cas_and_raw_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/cfg/feature-x"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "Key": "cfg/feature-x", "Value": "b24=", "ModifyIndex": 9
        }])))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/kv/cfg/feature-x"))
        .and(query_param("cas", "9"))
        .and(query_param("dc", "dc1"))
        .and(body_string("off"))
        .respond_with(ResponseTemplate::new(200).set_body_string("true"))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server)
        .kv()
        .update_key("cfg/feature-x", "off", Some(9), Some("dc1"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_rejected_write_is_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/cfg/feature-x"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "Key": "cfg/feature-x", "Value": null, "ModifyIndex": 12
        }])))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/kv/cfg/feature-x"))
        .respond_with(ResponseTemplate::new(200).set_body_string("false"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .kv()
        .update_key("cfg/feature-x", "off", Some(11), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ConsulError::Conflict(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_list_keys_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/cfg/"))
        .and(query_param("keys", "true"))
        .and(query_param("separator", "/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["cfg/a", "cfg/sub/"])))
        .expect(1)
        .mount(&server)
        .await;

    let keys = client_for(&server)
        .kv()
        .list_keys(Some("cfg"), Some("/"), None)
        .await
        .unwrap();
    assert_eq!(keys, vec!["cfg/a".to_string(), "cfg/sub/".to_string()]);
}

#[tokio::test]
async fn test_delete_subtree_uses_recurse() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/kv/cfg"))
        .and(query_param("recurse", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_string("true"))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server)
        .kv()
        .delete_subtree("cfg", None)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_token_header_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/agent/services"))
        .and(header("X-Consul-Token", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = ConsulClient::new(ClientConfig::new(server.uri()).with_token("secret")).unwrap();
    let services = client.registry().list_services().await.unwrap();
    assert!(services.is_empty());
}

#[tokio::test]
async fn test_blank_services_body_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/agent/services"))
        .respond_with(ResponseTemplate::new(200).set_body_string("\n"))
        .expect(1)
        .mount(&server)
        .await;

    let services = client_for(&server).registry().list_services().await.unwrap();
    assert!(services.is_empty());
}

#[tokio::test]
async fn test_health_query_and_projection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/health/service/web"))
        .and(query_param("passing", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "Node": {"Node": "n1", "Address": "10.0.0.1"},
                "Service": {"ID": "web-1", "Service": "web", "Address": "", "Port": 80},
                "Checks": [{"CheckID": "serfHealth", "Status": "passing"}]
            }
        ])))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let nodes = client
        .health()
        .health_services(&HealthQuery::new("web").view(View::Node).field("Node"))
        .await
        .unwrap();
    assert_eq!(nodes, vec![json!({"Node": "n1"})]);

    let address = client.selector().select_address("web").await.unwrap();
    assert_eq!(address.as_deref(), Some("10.0.0.1:80"));
}

#[tokio::test]
async fn test_server_error_maps_to_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/health/service/web"))
        .respond_with(ResponseTemplate::new(500).set_body_string("rpc error"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .health()
        .health_service(&HealthQuery::new("web"))
        .await
        .unwrap_err();
    match err {
        ConsulError::Status { status, ref body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "rpc error");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_unreachable_agent_is_transport_error() {
    // 端口 1 上没有监听者
    let client = ConsulClient::new(ClientConfig::new("http://127.0.0.1:1")).unwrap();
    let err = client.kv().try_get_value("cfg/x", None).await.unwrap_err();
    assert!(matches!(err, ConsulError::Transport(_)));
}
