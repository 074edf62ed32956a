//! RestAdapter against a local HTTP mock.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pagesync_adapters::{MemoryAdapter, RestAdapter, Stamping};
use pagesync_core::{AuthConfig, BackendName, Document, DocumentId, Phase, RestBackend};
use pagesync_sync::{
    AdapterError, CallContext, DocumentAdapter, FailureKind, Orchestrator, SyncOptions,
};

fn doc() -> Document {
    Document::new(
        "p1",
        "X",
        "Y",
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
    )
}

fn adapter(server: &MockServer) -> RestAdapter {
    RestAdapter::new("kb", &format!("{}/api", server.uri()), "pages").expect("adapter")
}

#[tokio::test(flavor = "multi_thread")]
async fn full_lifecycle_against_service() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/pages"))
        .and(body_partial_json(json!({"id": "p1", "title": "X", "content": "Y"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 9001})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/pages/p1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/pages/p1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/pages/p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "p1",
            "title": "X",
            "content": "Y",
            "updated_at": "2024-05-01T09:30:00Z",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let kb = adapter(&server);
    let ctx = CallContext::unbounded();
    assert_eq!(kb.create(&ctx, &doc()).await.expect("create"), "9001");
    kb.update(&ctx, &doc()).await.expect("update");
    kb.delete(&ctx, &doc().id).await.expect("delete");
    assert_eq!(kb.read(&ctx, &doc().id).await.expect("read"), doc());
}

#[tokio::test(flavor = "multi_thread")]
async fn bearer_token_is_sent_on_every_request() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/pages/p1"))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let config = RestBackend {
        base_url: format!("{}/api", server.uri()),
        collection: "pages".to_string(),
        auth: AuthConfig::Bearer {
            token_env: "KB_TOKEN".to_string(),
        },
    };
    let kb = RestAdapter::from_config_with("kb", &config, |var| {
        (var == "KB_TOKEN").then(|| "s3cret".to_string())
    })
    .expect("adapter");

    kb.delete(&CallContext::unbounded(), &DocumentId::from("p1"))
        .await
        .expect("delete");
}

#[tokio::test(flavor = "multi_thread")]
async fn error_status_carries_code_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/pages/p1"))
        .respond_with(ResponseTemplate::new(409).set_body_string("version conflict"))
        .mount(&server)
        .await;

    let err = adapter(&server)
        .update(&CallContext::unbounded(), &doc())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        AdapterError::Status {
            status: 409,
            message: "version conflict".to_string()
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn unexpected_success_status_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/pages"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"id": "p1"})))
        .mount(&server)
        .await;

    let err = adapter(&server)
        .create(&CallContext::unbounded(), &doc())
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::Status { status: 202, .. }), "got: {err}");
}

#[tokio::test(flavor = "multi_thread")]
async fn read_without_title_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/pages/p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "p1",
            "content": "Y",
            "updated_at": "2024-05-01T09:30:00Z",
        })))
        .mount(&server)
        .await;

    let err = adapter(&server)
        .read(&CallContext::unbounded(), &DocumentId::from("p1"))
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::MalformedResponse(_)), "got: {err}");
    assert_eq!(err.kind(), FailureKind::MalformedResponse);
}

#[tokio::test(flavor = "multi_thread")]
async fn non_json_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/pages/p1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let err = adapter(&server)
        .read(&CallContext::unbounded(), &DocumentId::from("p1"))
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::MalformedResponse(_)), "got: {err}");
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_service_is_a_transport_error() {
    let kb = RestAdapter::new("kb", "http://127.0.0.1:9", "pages").expect("adapter");
    let err = kb
        .read(&CallContext::unbounded(), &DocumentId::from("p1"))
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::Transport(_)), "got: {err}");
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_service_times_out_within_call_deadline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/pages/p1"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let ctx = CallContext::with_timeout(Duration::from_millis(200));
    let kb = adapter(&server);
    let err = ctx
        .bound(kb.read(&ctx, &DocumentId::from("p1")))
        .await
        .unwrap_err();
    assert!(
        matches!(err, AdapterError::Timeout | AdapterError::Transport(_)),
        "got: {err}"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn orchestrator_mixes_rest_and_memory_backends() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "kb-1"})))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "p1",
            "title": "X",
            "content": "from kb",
            "updated_at": "2030-01-01T00:00:00Z",
        })))
        .mount(&server)
        .await;

    let memory = MemoryAdapter::new("scratch").with_stamping(Stamping::Preserve);
    let adapters: Vec<Arc<dyn DocumentAdapter>> = vec![Arc::new(adapter(&server)), Arc::new(memory)];

    let report = Orchestrator::new(SyncOptions {
        call_timeout: Some(Duration::from_secs(5)),
    })
    .sync(&doc(), &adapters)
    .await
    .expect("sync");

    assert_eq!(report.created_ids[&BackendName::from("kb")], "kb-1");
    assert_eq!(report.created_ids[&BackendName::from("scratch")], "p1");
    // The memory store really deletes, so only the service still answers.
    let read_failures: Vec<_> = report.failures_in(Phase::Read).collect();
    assert_eq!(read_failures.len(), 1);
    assert_eq!(read_failures[0].backend, BackendName::from("scratch"));

    let selected = report.selected.expect("selected");
    assert_eq!(selected.backend, BackendName::from("kb"));
    assert_eq!(selected.document.content, "from kb");
}
