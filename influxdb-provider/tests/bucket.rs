//! Integration tests for the bucket resource.

mod common;

use common::{error_summaries, warning_summaries, TestServer, ORG_ID, ORG_NAME};
use influxdb_provider::reconciler::{BucketReconciler, BucketState};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

fn bucket(name: &str, retention_seconds: i64) -> BucketState {
    BucketState {
        name: name.to_string(),
        org: Some(ORG_NAME.to_string()),
        retention_seconds: Some(retention_seconds),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_create_bucket_keeps_declared_org() {
    let test = TestServer::spawn().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/buckets"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "b000000000000001",
            "name": "b1",
            "orgID": ORG_ID,
            "retentionRules": [{"type": "expire", "everySeconds": 604800}]
        })))
        .expect(1)
        .mount(&test.server)
        .await;

    let resource = test.provider.resource::<BucketReconciler>();
    let response = resource.create(&bucket("b1", 604800)).await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    let state = response.state.unwrap();
    assert_eq!(state.id.as_deref(), Some("b000000000000001"));
    assert_eq!(state.name, "b1");
    assert_eq!(state.org.as_deref(), Some("org1"));
    assert_eq!(state.retention_seconds, Some(604800));

    let body = test.body_of("POST", "/api/v2/buckets").await;
    assert_eq!(body["orgID"], ORG_ID);
    assert_eq!(
        body["retentionRules"],
        json!([{"type": "expire", "everySeconds": 604800}])
    );
}

#[tokio::test]
async fn test_infinite_retention_round_trips_as_zero() {
    let test = TestServer::spawn().await;
    let record = json!({
        "id": "b000000000000002",
        "name": "forever",
        "orgID": ORG_ID,
        "retentionRules": []
    });
    Mock::given(method("POST"))
        .and(path("/api/v2/buckets"))
        .respond_with(ResponseTemplate::new(201).set_body_json(record.clone()))
        .mount(&test.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/buckets/b000000000000002"))
        .respond_with(ResponseTemplate::new(200).set_body_json(record))
        .mount(&test.server)
        .await;

    let resource = test.provider.resource::<BucketReconciler>();
    let created = resource.create(&bucket("forever", 0)).await.state.unwrap();
    assert_eq!(created.retention_seconds, Some(0));

    let body = test.body_of("POST", "/api/v2/buckets").await;
    assert_eq!(body["retentionRules"], json!([]));

    let read = resource.read(&created).await;
    assert!(read.diagnostics.is_empty());
    let read = read.state.unwrap();
    assert_eq!(read.retention_seconds, Some(0));
    assert_eq!(read.org.as_deref(), Some("org1"));
}

#[tokio::test]
async fn test_default_org_is_used_when_undeclared() {
    let test = TestServer::spawn_with_default_org(Some(ORG_NAME)).await;
    Mock::given(method("POST"))
        .and(path("/api/v2/buckets"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "b000000000000003",
            "name": "b3",
            "orgID": ORG_ID
        })))
        .mount(&test.server)
        .await;

    let desired = BucketState {
        name: "b3".to_string(),
        ..Default::default()
    };
    let response = test
        .provider
        .resource::<BucketReconciler>()
        .create(&desired)
        .await;

    let state = response.state.unwrap();
    assert_eq!(state.org.as_deref(), Some("org1"));
    assert_eq!(state.retention_seconds, Some(0));
}

#[tokio::test]
async fn test_unknown_org_fails_before_any_mutation() {
    let test = TestServer::spawn().await;

    let desired = BucketState {
        org: Some("nope".to_string()),
        ..bucket("b1", 0)
    };
    let response = test
        .provider
        .resource::<BucketReconciler>()
        .create(&desired)
        .await;

    assert_eq!(response.state, None);
    assert_eq!(error_summaries(&response.diagnostics), vec!["Create - Client Error"]);
    assert!(test.mutations().await.is_empty());
}

#[tokio::test]
async fn test_missing_org_without_default_fails() {
    let test = TestServer::spawn().await;

    let desired = BucketState {
        org: None,
        ..bucket("b1", 0)
    };
    let response = test
        .provider
        .resource::<BucketReconciler>()
        .create(&desired)
        .await;

    assert_eq!(error_summaries(&response.diagnostics), vec!["Create - Client Error"]);
    assert!(test.requests().await.is_empty());
}

#[tokio::test]
async fn test_negative_retention_is_rejected_locally() {
    let test = TestServer::spawn().await;

    let response = test
        .provider
        .resource::<BucketReconciler>()
        .create(&bucket("b1", -5))
        .await;

    assert_eq!(
        error_summaries(&response.diagnostics),
        vec!["Create - Validation Error"]
    );
    assert!(test.requests().await.is_empty());
}

#[tokio::test]
async fn test_update_preserves_stored_org() {
    let test = TestServer::spawn().await;
    Mock::given(method("PATCH"))
        .and(path("/api/v2/buckets/b000000000000001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "b000000000000001",
            "name": "renamed",
            "orgID": ORG_ID,
            "description": "now described",
            "retentionRules": [{"type": "expire", "everySeconds": 3600}]
        })))
        .expect(1)
        .mount(&test.server)
        .await;

    let stored = BucketState {
        id: Some("b000000000000001".to_string()),
        org: Some(ORG_ID.to_string()),
        ..bucket("b1", 604800)
    };
    let desired = BucketState {
        name: "renamed".to_string(),
        org: None,
        description: Some("now described".to_string()),
        retention_seconds: Some(3600),
        ..Default::default()
    };
    let response = test
        .provider
        .resource::<BucketReconciler>()
        .update(&desired, &stored)
        .await;

    assert!(!response.has_error(), "{:?}", response.diagnostics);
    let state = response.state.unwrap();
    assert_eq!(state.id, stored.id);
    assert_eq!(state.org.as_deref(), Some(ORG_ID));
    assert_eq!(state.name, "renamed");
    assert_eq!(state.retention_seconds, Some(3600));

    let body = test.body_of("PATCH", "/api/v2/buckets/b000000000000001").await;
    assert_eq!(body["name"], "renamed");
    assert_eq!(
        body["retentionRules"],
        json!([{"type": "expire", "everySeconds": 3600}])
    );
}

#[tokio::test]
async fn test_update_keeps_description_missing_from_response() {
    let test = TestServer::spawn().await;
    Mock::given(method("PATCH"))
        .and(path("/api/v2/buckets/b000000000000001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "b000000000000001",
            "name": "b1",
            "orgID": ORG_ID,
            "retentionRules": []
        })))
        .expect(1)
        .mount(&test.server)
        .await;

    let stored = BucketState {
        id: Some("b000000000000001".to_string()),
        ..bucket("b1", 0)
    };
    let desired = BucketState {
        description: Some("raw metrics".to_string()),
        ..bucket("b1", 0)
    };
    let response = test
        .provider
        .resource::<BucketReconciler>()
        .update(&desired, &stored)
        .await;

    assert!(!response.has_error(), "{:?}", response.diagnostics);
    let state = response.state.unwrap();
    assert_eq!(state.description.as_deref(), Some("raw metrics"));

    let body = test.body_of("PATCH", "/api/v2/buckets/b000000000000001").await;
    assert_eq!(body["description"], "raw metrics");
}

#[tokio::test]
async fn test_read_missing_bucket_signals_removal() {
    let test = TestServer::spawn().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/buckets/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": "not found",
            "message": "bucket not found"
        })))
        .mount(&test.server)
        .await;

    let stored = BucketState {
        id: Some("gone".to_string()),
        ..bucket("b1", 0)
    };
    let response = test.provider.resource::<BucketReconciler>().read(&stored).await;

    assert_eq!(response.state, None);
    assert!(!response.has_error());
    assert_eq!(
        warning_summaries(&response.diagnostics),
        vec!["Read - Resource Not Found"]
    );
}

#[tokio::test]
async fn test_delete_missing_bucket_succeeds() {
    let test = TestServer::spawn().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v2/buckets/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&test.server)
        .await;

    let stored = BucketState {
        id: Some("gone".to_string()),
        ..bucket("b1", 0)
    };
    let response = test
        .provider
        .resource::<BucketReconciler>()
        .delete(&stored)
        .await;

    assert_eq!(response.state, None);
    assert!(response.diagnostics.is_empty());
}

#[tokio::test]
async fn test_delete_failure_keeps_state() {
    let test = TestServer::spawn().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v2/buckets/b1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&test.server)
        .await;

    let stored = BucketState {
        id: Some("b1".to_string()),
        ..bucket("b1", 0)
    };
    let response = test
        .provider
        .resource::<BucketReconciler>()
        .delete(&stored)
        .await;

    assert_eq!(response.state, Some(stored));
    let errors: Vec<_> = response.diagnostics.errors().collect();
    assert_eq!(errors[0].summary, "Delete - API Error");
    assert_eq!(errors[0].detail, "InfluxDB API returned status 500: boom");
}
