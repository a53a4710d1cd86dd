// Integration tests for the question proxy API

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use mockito::{Matcher, Server};
use secrecy::{ExposeSecret, SecretString};
use shopq::api::{create_router, AppState};
use shopq::config::Config;
use shopq::credentials::{CredentialStore, SqliteCredentialStore};
use std::sync::Arc;
use tower::ServiceExt;

fn test_config(platform_url: &str, answer_url: &str) -> Config {
    let mut config = Config::default();
    config.shopify.client_id = "app-id".to_string();
    config.shopify.client_secret = SecretString::new("app-secret".to_string());
    config.shopify.platform_base_url = Some(platform_url.to_string());
    config.answer_service.base_url = answer_url.to_string();
    config.answer_service.max_retries = 0;
    config.server.max_body_bytes = 1024;
    config.storage.database_path = ":memory:".to_string();
    config.storage.encryption_key = SecretString::new(BASE64.encode([0u8; 32]));
    config
}

fn create_test_app(config: &Config) -> (Router, Arc<SqliteCredentialStore>) {
    let store = Arc::new(
        SqliteCredentialStore::new(
            &config.storage.database_path,
            config.storage.encryption_key.expose_secret(),
        )
        .unwrap(),
    );
    let state = AppState::new(config, Arc::clone(&store) as Arc<dyn CredentialStore>).unwrap();
    (create_router(state, &config.server), store)
}

fn ask_request(body: impl Into<String>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/questions")
        .header("content-type", "application/json")
        .body(Body::from(body.into()))
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn test_install_then_ask_end_to_end() {
    let mut platform = Server::new_async().await;
    let _token_mock = platform
        .mock("POST", "/admin/oauth/access_token")
        .match_body(Matcher::UrlEncoded("code".into(), "code1".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"tok1","scope":"read_orders"}"#)
        .create_async()
        .await;

    let mut answers = Server::new_async().await;
    let answer_mock = answers
        .mock("POST", "/ask")
        .match_body(Matcher::Json(serde_json::json!({
            "shop_domain": "foo.myshopify.com",
            "access_token": "tok1",
            "question": "What were sales yesterday?"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"answer":"$500"}"#)
        .expect(1)
        .create_async()
        .await;

    let config = test_config(&platform.url(), &answers.url());
    let (app, store) = create_test_app(&config);

    // Install
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/shopify/oauth/install?shop=foo.myshopify.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    let query = location.split_once('?').unwrap().1;
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query).unwrap();
    let state = pairs.into_iter().find(|(k, _)| k == "state").unwrap().1;

    // Callback
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!(
                    "/shopify/oauth/callback?shop=foo.myshopify.com&code=code1&state={}",
                    state
                ))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let credential = store.find("foo.myshopify.com").unwrap().unwrap();
    assert_eq!(credential.access_token.expose_secret(), "tok1");

    // Ask
    let response = app
        .oneshot(ask_request(
            r#"{"store_id":"foo.myshopify.com","question":"What were sales yesterday?"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );
    assert_eq!(body_bytes(response).await, br#"{"answer":"$500"}"#.to_vec());
    answer_mock.assert_async().await;
}

#[tokio::test]
async fn test_unknown_store_is_404_without_upstream_call() {
    let mut answers = Server::new_async().await;
    let answer_mock = answers
        .mock("POST", "/ask")
        .expect(0)
        .create_async()
        .await;

    let config = test_config("https://platform.test", &answers.url());
    let (app, _) = create_test_app(&config);

    let response = app
        .oneshot(ask_request(
            r#"{"store_id":"unknown.myshopify.com","question":"anything"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({"error": "Store not found"})
    );
    answer_mock.assert_async().await;
}

#[tokio::test]
async fn test_blank_fields_are_400() {
    let mut answers = Server::new_async().await;
    let answer_mock = answers
        .mock("POST", "/ask")
        .expect(0)
        .create_async()
        .await;

    let config = test_config("https://platform.test", &answers.url());
    let (app, _) = create_test_app(&config);

    for body in [
        r#"{"store_id":"","question":"x"}"#,
        r#"{"store_id":"s","question":""}"#,
        r#"{"question":"x"}"#,
        r#"{"store_id":"s"}"#,
        r#"not json"#,
    ] {
        let response = app.clone().oneshot(ask_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", body);
        let json = body_json(response).await;
        assert!(json["error"].is_string());
    }

    answer_mock.assert_async().await;
}

#[tokio::test]
async fn test_oversized_body_is_413() {
    let config = test_config("https://platform.test", "http://127.0.0.1:1");
    let (app, _) = create_test_app(&config);

    let question = "x".repeat(2048);
    let body = format!(
        r#"{{"store_id":"foo.myshopify.com","question":"{}"}}"#,
        question
    );

    let response = app.oneshot(ask_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body_json(response).await["error"].is_string());
}

#[tokio::test]
async fn test_body_limit_above_axum_default() {
    let mut config = test_config("https://platform.test", "http://127.0.0.1:1");
    config.server.max_body_bytes = 3 * 1024 * 1024;
    let (app, _) = create_test_app(&config);

    let ask = |question_len: usize| {
        ask_request(format!(
            r#"{{"store_id":"unknown.myshopify.com","question":"{}"}}"#,
            "x".repeat(question_len)
        ))
    };

    // Past the 2 MB framework default but within the configured limit
    let response = app.clone().oneshot(ask(2_500_000)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.oneshot(ask(3 * 1024 * 1024)).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body_json(response).await["error"].is_string());
}

#[tokio::test]
async fn test_answering_service_failure_is_502() {
    let mut answers = Server::new_async().await;
    let answer_mock = answers
        .mock("POST", "/ask")
        .with_status(500)
        .with_body(r#"{"detail":"boom"}"#)
        .expect(1)
        .create_async()
        .await;

    let config = test_config("https://platform.test", &answers.url());
    let (app, store) = create_test_app(&config);
    store
        .upsert(
            "foo.myshopify.com",
            &SecretString::new("tok1".to_string()),
        )
        .unwrap();

    let response = app
        .oneshot(ask_request(
            r#"{"store_id":"foo.myshopify.com","question":"q"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Answering service unavailable");
    assert!(!json.to_string().contains("tok1"));
    answer_mock.assert_async().await;
}

#[tokio::test]
async fn test_cors_preflight_for_chat_client() {
    let config = test_config("https://platform.test", "http://127.0.0.1:1");
    let (app, _) = create_test_app(&config);

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/v1/questions")
                .header("origin", "http://localhost:5173")
                .header("access-control-request-method", "POST")
                .header("access-control-request-headers", "content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://localhost:5173"
    );
}
