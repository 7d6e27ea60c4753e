//! Transport-level adapter tests against a mock HTTP server.

use serde_json::json;
use std::time::Duration;
use textgen_relay::backend::{GenOptions, GenerationBackend, HostedBackend, LocalBackend};
use textgen_relay::config::{HostedBackendConfig, LocalBackendConfig, TransportConfig};
use textgen_relay::{BackendId, GenError};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

fn hosted_config(server: &MockServer, rpm: u32) -> HostedBackendConfig {
    HostedBackendConfig {
        api_key: "test-key".to_string(),
        endpoint: Some(format!("{}/chat/completions", server.uri())),
        model: None,
        requests_per_minute: Some(rpm),
    }
}

fn transport(timeout_secs: u64) -> TransportConfig {
    TransportConfig {
        request_timeout_secs: timeout_secs,
    }
}

#[tokio::test]
async fn test_hosted_happy_path_reports_usage() {
    common::init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "generated text"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 32, "total_tokens": 42}
        })))
        .mount(&server)
        .await;

    let backend = HostedBackend::new(
        BackendId::DeepSeek,
        &hosted_config(&server, 1000),
        &transport(10),
    );
    let result = backend
        .generate("hello", &GenOptions::default())
        .await
        .unwrap();

    assert_eq!(result.text, "generated text");
    assert_eq!(result.backend, BackendId::DeepSeek);
    assert_eq!(result.tokens, 42, "provider-reported usage wins");
    assert!(result.cost > 0.0, "hosted backends are not free");

    let stats = backend.stats();
    assert_eq!(stats.requests, 1);
    assert_eq!(stats.failures, 0);
    assert_eq!(stats.tokens, 42);
}

#[tokio::test]
async fn test_hosted_http_error_counts_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let backend = HostedBackend::new(
        BackendId::Glm,
        &hosted_config(&server, 1000),
        &transport(10),
    );
    let err = backend
        .generate("hello", &GenOptions::default())
        .await
        .unwrap_err();

    match err {
        GenError::BackendStatus { backend, status, body } => {
            assert_eq!(backend, BackendId::Glm);
            assert_eq!(status, 503);
            assert!(body.contains("overloaded"));
        }
        other => panic!("expected BackendStatus, got {other:?}"),
    }
    assert_eq!(backend.stats().failures, 1);
}

#[tokio::test]
async fn test_repeated_failures_open_the_circuit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let backend = HostedBackend::new(
        BackendId::Qwen,
        &hosted_config(&server, 1000),
        &transport(10),
    );
    for _ in 0..3 {
        let _ = backend.generate("x", &GenOptions::default()).await;
    }
    assert!(backend.circuit_open(), "three consecutive failures trip the breaker");

    let err = backend
        .generate("x", &GenOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, GenError::CircuitOpen(BackendId::Qwen)));
}

#[tokio::test]
async fn test_timeout_is_a_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"choices": [], "usage": null}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let backend = HostedBackend::new(
        BackendId::DeepSeek,
        &hosted_config(&server, 1000),
        &transport(1),
    );
    let err = backend
        .generate("x", &GenOptions::default())
        .await
        .unwrap_err();

    assert!(
        matches!(err, GenError::Transport { backend: BackendId::DeepSeek, .. }),
        "timeouts feed the breaker like any transport failure: {err:?}"
    );
    assert_eq!(backend.stats().failures, 1);
}

#[tokio::test]
async fn test_local_backend_repairs_structured_output() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            // Truncated output a small model actually produces.
            "response": "{ \"bio\": \"Olá mundo",
            "done": true
        })))
        .mount(&server)
        .await;

    let config = LocalBackendConfig {
        endpoint: server.uri(),
        model: None,
        requests_per_minute: Some(1000),
    };
    let backend = LocalBackend::new(&config, &transport(10));
    let value = backend
        .generate_structured("write a bio", r#"{ "bio": "string" }"#, &GenOptions::default())
        .await
        .unwrap();

    let bio = value["bio"].as_str().unwrap();
    assert!(bio.contains("Olá"), "accents survive repair: {bio}");

    let result_stats = backend.stats();
    assert_eq!(result_stats.requests, 1);
    assert_eq!(result_stats.cost, 0.0, "local backend is free");
}
