//! Host calls routed through the provider with raw JSON documents.

mod common;

use common::{TestServer, ORG_ID};
use influxdb_provider::{Call, ResourceKind};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_bucket_lifecycle_through_provider() {
    let test = TestServer::spawn().await;
    let record = json!({
        "id": "b000000000000001",
        "name": "b1",
        "orgID": ORG_ID,
        "retentionRules": [{"type": "expire", "everySeconds": 604800}]
    });
    Mock::given(method("POST"))
        .and(path("/api/v2/buckets"))
        .and(header("Authorization", "Token test-token"))
        .respond_with(ResponseTemplate::new(201).set_body_json(record.clone()))
        .expect(1)
        .mount(&test.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/buckets/b000000000000001"))
        .and(header("Authorization", "Token test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(record))
        .mount(&test.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v2/buckets/b000000000000001"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&test.server)
        .await;

    let desired = json!({"name": "b1", "org": "org1", "retention_seconds": 604800});
    let created = test
        .provider
        .call(ResourceKind::Bucket, Call::Create { desired })
        .await;
    assert!(created.diagnostics.is_empty(), "{:?}", created.diagnostics);
    let state = created.state.unwrap();
    assert_eq!(state["id"], "b000000000000001");
    assert_eq!(state["org"], "org1");
    assert_eq!(state["retention_seconds"], 604800);

    let read = test
        .provider
        .call(ResourceKind::Bucket, Call::Read { stored: state.clone() })
        .await;
    assert_eq!(read.state.as_ref(), Some(&state));

    let deleted = test
        .provider
        .call(ResourceKind::Bucket, Call::Delete { stored: state })
        .await;
    assert_eq!(deleted.state, None);
    assert!(deleted.diagnostics.is_empty());
}

#[tokio::test]
async fn test_task_schedule_rejected_through_provider() {
    let test = TestServer::spawn().await;

    let desired = json!({
        "name": "t",
        "org": "org1",
        "flux": "from(bucket: \"b\")",
        "every": "1h",
        "cron": "0 * * * *"
    });
    let response = test
        .provider
        .call(ResourceKind::Task, Call::Create { desired })
        .await;

    assert_eq!(response.state, None);
    assert!(response.has_error());
    assert!(test.requests().await.is_empty());
}
