use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use commute_api::build_app;
use commute_tests::{
    builtin_router, router_with, test_config, FailingClassifier, SilentTagger, TEST_API_KEY,
};
use serde_json::{json, Value};
use tower::ServiceExt;

fn predict_request(api_key: Option<&str>, body: String) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/predict")
        .header("content-type", "application/json");
    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::from(body)).unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, parsed)
}

#[tokio::test]
async fn health_is_public() {
    let app = build_app().expect("app should build");

    let (status, body) = send(
        app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["metrics"]["requests_total"].is_u64());
    assert!(body["models"]["token_classifier"].is_string());
}

#[tokio::test]
async fn predict_requires_api_key() {
    let app = builtin_router(test_config(10)).unwrap();

    let (status, body) = send(
        app.clone(),
        predict_request(None, json!({"message": "fare to Cubao"}).to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = send(
        app,
        predict_request(
            Some("wrong-key"),
            json!({"message": "fare to Cubao"}).to_string(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn predict_returns_intents_and_entities() {
    let app = builtin_router(test_config(10)).unwrap();

    let (status, body) = send(
        app,
        predict_request(
            Some(TEST_API_KEY),
            json!({"message": "what's the fare to Manila and how long to get there"})
                .to_string(),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["intent"], json!(["get_fare", "get_travel_time"]));
    assert_eq!(body["entities"], json!({"DESTINATION": ["Manila"]}));
}

#[tokio::test]
async fn empty_message_returns_sentinel() {
    let app = builtin_router(test_config(10)).unwrap();

    let (status, body) = send(
        app,
        predict_request(Some(TEST_API_KEY), json!({"message": "   "}).to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["intent"], json!(["Error: Empty query provided"]));
    assert_eq!(body["entities"], json!({}));
}

#[tokio::test]
async fn model_failure_is_a_server_error() {
    let app = router_with(
        Arc::new(FailingClassifier::default()),
        Arc::new(SilentTagger::default()),
        test_config(10),
    );

    let (status, body) = send(
        app,
        predict_request(Some(TEST_API_KEY), json!({"message": "fare to Cubao"}).to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "inference_failed");
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains("intent session crashed"));
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let app = builtin_router(test_config(10)).unwrap();

    let response = app
        .oneshot(predict_request(Some(TEST_API_KEY), "{\"text\": 1}".to_string()))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let app = builtin_router(test_config(10)).unwrap();
    let message = "fare to Cubao ".repeat(2_000);

    let response = app
        .oneshot(predict_request(
            Some(TEST_API_KEY),
            json!({ "message": message }).to_string(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn rate_limit_applies_per_client() {
    let app = builtin_router(test_config(2)).unwrap();

    for _ in 0..2 {
        let (status, _) = send(
            app.clone(),
            predict_request(Some(TEST_API_KEY), json!({"message": "hello"}).to_string()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(
        app.clone(),
        predict_request(Some(TEST_API_KEY), json!({"message": "hello"}).to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "rate_limited");

    let (status, _) = send(
        app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}
