use super::*;
use serde_json::json;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn embedder_for(server: &MockServer, dimension: usize) -> RemoteEmbedder {
    let base = Url::parse(&format!("{}/v1/", server.uri())).expect("mock server url");
    let transport = ProviderTransport::new(
        base,
        Some("test-key".to_string()),
        Duration::from_secs(5),
    );
    RemoteEmbedder::new(transport, "text-embedding-3-large".to_string(), dimension)
}

#[tokio::test(flavor = "multi_thread")]
async fn embeds_batch_in_order_with_bearer_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(header("Authorization", "Bearer test-key"))
        .and(body_json(json!({
            "model": "text-embedding-3-large",
            "input": ["first", "second"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"embedding": [1.0, 0.0]},
                {"embedding": [0.0, 1.0]}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let embedder = embedder_for(&server, 2);
    let vectors = embedder
        .embed(vec!["first".to_string(), "second".to_string()])
        .await
        .expect("embedding succeeds");

    assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
}

#[tokio::test(flavor = "multi_thread")]
async fn non_success_surfaces_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"error":"bad key"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let err = embedder_for(&server, 2)
        .embed(vec!["text".to_string()])
        .await
        .expect_err("401 must fail");

    match err {
        BrainError::Provider(provider) => {
            assert_eq!(provider.status, Some(401));
            assert_eq!(provider.body, r#"{"error":"bad key"}"#);
        }
        other => panic!("expected provider error, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn count_mismatch_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"embedding": [1.0, 0.0]}]
        })))
        .mount(&server)
        .await;

    let err = embedder_for(&server, 2)
        .embed(vec!["a".to_string(), "b".to_string()])
        .await
        .expect_err("one embedding for two inputs");
    assert!(matches!(err, BrainError::Provider(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn wrong_dimension_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"embedding": [1.0, 0.0, 3.0]}]
        })))
        .mount(&server)
        .await;

    let err = embedder_for(&server, 2)
        .embed(vec!["a".to_string()])
        .await
        .expect_err("three floats for a two-dimensional provider");
    assert!(err.to_string().contains("expected 2"));
}

#[tokio::test]
async fn empty_batch_makes_no_request() {
    let base = Url::parse("http://127.0.0.1:1/").expect("valid url");
    let transport = ProviderTransport::new(base, None, Duration::from_secs(1));
    let embedder = RemoteEmbedder::new(transport, "model".to_string(), 3);

    let vectors = embedder.embed(Vec::new()).await.expect("no request needed");
    assert!(vectors.is_empty());
}
