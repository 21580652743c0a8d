//! KV 写入一致性测试
//!
//! 使用进程内 agent 验证存在性守卫、CAS 守卫和幂等删除。

use flare_consul_client::transport::Method;
use flare_consul_client::{ClientConfig, ConsulClient, ConsulError, KeyPath, MemoryTransport};
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

/// 创建共享同一个模拟 agent 的客户端
fn setup() -> (ConsulClient, MemoryTransport) {
    let agent = MemoryTransport::new();
    let client = ConsulClient::with_transport(ClientConfig::default(), Arc::new(agent.clone()))
        .expect("valid config");
    (client, agent)
}

#[tokio::test]
async fn test_feature_flag_lifecycle() {
    let (client, agent) = setup();
    let kv = client.kv();

    kv.create_key(("cfg", "feature-x"), "on", None).await.unwrap();

    let item = kv
        .get_item("cfg/feature-x", None)
        .await
        .unwrap()
        .expect("key should exist");
    assert_eq!(item.value_str(), Some("on"));
    let index = item.modify_index;
    assert_eq!(agent.modify_index("cfg/feature-x").await, Some(index));

    kv.update_key("cfg/feature-x", "off", Some(index), None).await.unwrap();

    // 旧索引再次写入被拒绝
    let err = kv
        .update_key("cfg/feature-x", "stale", Some(index), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ConsulError::Conflict(ref key) if key == "cfg/feature-x"));

    let value = kv.get_value("cfg/feature-x", "default").await;
    assert_eq!(value, b"off".to_vec());
}

#[tokio::test]
async fn test_create_rejects_existing_key() {
    let (client, agent) = setup();
    let kv = client.kv();

    kv.create_key("app/name", "first", None).await.unwrap();
    agent.clear_requests().await;

    let err = kv.create_key("app/name", "second", None).await.unwrap_err();
    assert!(matches!(err, ConsulError::AlreadyExists(ref key) if key == "app/name"));

    // 只发出了探测请求，没有写入
    let requests = agent.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::Get);

    let value = kv.try_get_value("app/name", None).await.unwrap();
    assert_eq!(value, Some(b"first".to_vec()));
}

#[tokio::test]
async fn test_create_if_absent_is_store_enforced() {
    let (client, agent) = setup();
    let kv = client.kv();

    kv.create_key_if_absent("lock/leader", "node-a", None)
        .await
        .unwrap();
    let err = kv
        .create_key_if_absent("lock/leader", "node-b", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ConsulError::Conflict(_)));

    let puts: Vec<_> = agent
        .requests()
        .await
        .into_iter()
        .filter(|r| r.method == Method::Put)
        .collect();
    assert_eq!(puts.len(), 2);
    assert!(puts.iter().all(|r| r.query_value("cas") == Some("0")));
}

#[tokio::test]
async fn test_update_missing_key_is_not_found() {
    let (client, agent) = setup();

    let err = client
        .kv()
        .update_key("cfg/missing", "v", Some(1), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ConsulError::NotFound(ref key) if key == "cfg/missing"));

    let requests = agent.requests().await;
    assert!(requests.iter().all(|r| r.method != Method::Put));
    assert_eq!(agent.kv_len().await, 0);
}

#[tokio::test]
async fn test_update_sends_single_cas_write() {
    let (client, agent) = setup();
    let kv = client.kv();

    kv.create_key("svc/limit", "10", None).await.unwrap();
    let index = agent.modify_index("svc/limit").await.unwrap();
    agent.clear_requests().await;

    kv.update_key("svc/limit", "20", Some(index), None).await.unwrap();

    let requests = agent.requests().await;
    let puts: Vec<_> = requests.iter().filter(|r| r.method == Method::Put).collect();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].path, "v1/kv/svc/limit");
    assert_eq!(puts[0].query_value("cas"), Some(index.to_string().as_str()));
    assert_eq!(puts[0].body.as_deref(), Some(&b"20"[..]));
}

#[tokio::test]
async fn test_update_propagates_existence_check_failure() {
    let (client, agent) = setup();
    let kv = client.kv();

    kv.create_key("svc/limit", "10", None).await.unwrap();
    agent.fail_path("v1/kv").await;

    let err = kv.update_key("svc/limit", "20", Some(1), None).await.unwrap_err();
    assert!(err.is_transport());
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let (client, agent) = setup();
    let kv = client.kv();

    kv.create_key("tmp/a", "1", None).await.unwrap();
    kv.delete_key("tmp/a", None).await.unwrap();
    kv.delete_key("tmp/a", None).await.unwrap();

    assert_eq!(agent.kv_len().await, 0);
    assert_eq!(kv.get_item("tmp/a", None).await.unwrap(), None);
}

#[tokio::test]
async fn test_delete_rejects_empty_key() {
    let (client, _agent) = setup();
    let err = client.kv().delete_key("/", None).await.unwrap_err();
    assert!(matches!(err, ConsulError::InvalidArgument(_)));

    let err = client.kv().delete_subtree("", None).await.unwrap_err();
    assert!(matches!(err, ConsulError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_delete_subtree_matches_by_prefix() {
    let (client, agent) = setup();
    let kv = client.kv();

    for key in ["cfg/a", "cfg/b/c", "cfg-old/d", "other/e"] {
        kv.create_key(key, "v", None).await.unwrap();
    }

    kv.delete_subtree("cfg", None).await.unwrap();
    kv.delete_subtree("cfg", None).await.unwrap();

    let remaining = kv.list_keys(None, None, None).await.unwrap();
    assert_eq!(remaining, vec!["other/e".to_string()]);
    assert_eq!(agent.kv_len().await, 1);
}

#[tokio::test]
async fn test_list_keys_with_separator() {
    let (client, _agent) = setup();
    let kv = client.kv();

    for key in ["cfg/a", "cfg/sub/x", "cfg/sub/y", "other/z"] {
        kv.create_key(key, "v", None).await.unwrap();
    }

    let folded = kv.list_keys(Some("cfg"), Some("/"), None).await.unwrap();
    assert_eq!(folded, vec!["cfg/a".to_string(), "cfg/sub/".to_string()]);

    let all = kv.list_keys(Some("cfg"), None, None).await.unwrap();
    assert_eq!(all.len(), 3);

    let none = kv.list_keys(Some("missing"), None, None).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_list_items_reads_values() {
    let (client, _agent) = setup();
    let kv = client.kv();

    kv.create_key(KeyPath::in_namespace("cfg", "a"), "1", None)
        .await
        .unwrap();
    kv.create_key(KeyPath::in_namespace("cfg", "b"), "2", None)
        .await
        .unwrap();

    let items = kv.list_items(Some("cfg"), None).await.unwrap();
    let pairs: Vec<_> = items
        .iter()
        .map(|item| (item.key.as_str(), item.value_str().unwrap_or_default()))
        .collect();
    assert_eq!(pairs, vec![("cfg/a", "1"), ("cfg/b", "2")]);

    assert!(kv.list_items(Some("nothing"), None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_get_value_falls_back_on_failure() {
    let (client, agent) = setup();
    let kv = client.kv();

    kv.create_key("cfg/timeout", "30", None).await.unwrap();
    agent.fail_path("v1/kv").await;

    let value = kv.get_value("cfg/timeout", "5").await;
    assert_eq!(value, b"5".to_vec());

    let err = kv.try_get_value("cfg/timeout", None).await.unwrap_err();
    assert!(err.is_transport());

    agent.clear_failures().await;
    assert_eq!(kv.get_value("cfg/timeout", "5").await, b"30".to_vec());
    assert_eq!(kv.get_value("cfg/absent", "5").await, b"5".to_vec());
}

#[tokio::test]
async fn test_datacenter_passthrough() {
    let (client, agent) = setup();

    client.kv().create_key("cfg/x", "1", Some("dc1")).await.unwrap();

    let remote = client.with_datacenter("dc2");
    let err = remote.kv().get_item("cfg/x", None).await.unwrap_err();
    assert!(matches!(err, ConsulError::Status { status: 500, .. }));

    // 单次调用的覆盖优先于客户端默认值
    let item = remote.kv().get_item("cfg/x", Some("dc1")).await.unwrap();
    assert!(item.is_some());

    let requests = agent.requests().await;
    let dcs: Vec<_> = requests.iter().map(|r| r.query_value("dc")).collect();
    assert_eq!(dcs, vec![Some("dc1"), Some("dc1"), Some("dc2"), Some("dc1")]);

    // 原客户端不受影响
    assert_eq!(client.config().datacenter, None);
}

#[tokio::test]
async fn test_update_without_index_overwrites() {
    let (client, agent) = setup();
    let kv = client.kv();

    assert_ok!(kv.create_key("cfg/x", "a", None).await);
    agent.clear_requests().await;

    assert_ok!(kv.update_key("cfg/x", "b", None, None).await);
    assert_eq!(kv.get_value("cfg/x", "default").await, b"b".to_vec());

    let puts: Vec<_> = agent
        .requests()
        .await
        .into_iter()
        .filter(|r| r.method == Method::Put)
        .collect();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].query_value("cas"), None);

    // 不带索引的覆盖仍要求 key 已存在
    let err = assert_err!(kv.update_key("cfg/absent", "b", None, None).await);
    assert!(matches!(err, ConsulError::NotFound(_)));
}

#[tokio::test]
async fn test_update_with_zero_index_is_rejected() {
    let (client, _agent) = setup();
    let kv = client.kv();

    assert_ok!(kv.create_key("cfg/x", "a", None).await);
    let err = assert_err!(kv.update_key("cfg/x", "b", Some(0), None).await);
    assert!(matches!(err, ConsulError::Conflict(_)));
    assert_eq!(kv.get_value("cfg/x", "default").await, b"a".to_vec());
}

#[tokio::test]
async fn test_create_writes_when_existence_check_fails() {
    let (client, agent) = setup();
    let kv = client.kv();

    agent.fail_request(Method::Get, "v1/kv").await;
    assert_ok!(kv.create_key("cfg/check-down", "on", None).await);

    let requests = agent.requests().await;
    let methods: Vec<_> = requests.iter().map(|r| r.method).collect();
    assert_eq!(methods, vec![Method::Get, Method::Put]);
    assert!(agent.modify_index("cfg/check-down").await.is_some());

    agent.clear_failures().await;
    let value = assert_ok!(kv.try_get_value("cfg/check-down", None).await);
    assert_eq!(value, Some(b"on".to_vec()));
}
