mod rate_limit;

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{Json, State};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use commute_core::{EntityMap, QueryResult};
use commute_observability::{AppMetrics, MetricsSnapshot};
use commute_pipeline::{PipelineSettings, QueryPipeline};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

pub use rate_limit::ClientRateLimiter;

const MAX_BODY_BYTES: usize = 16 * 1024;
const DEFAULT_API_KEY: &str = "dev-commute-key";

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub api_key: String,
    pub rate_limit_window: Duration,
    pub rate_limit_max: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: DEFAULT_API_KEY.to_string(),
            rate_limit_window: Duration::from_secs(60),
            rate_limit_max: 120,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: env::var("COMMUTE_API_KEY")
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or(defaults.api_key),
            rate_limit_window: env::var("COMMUTE_RATE_LIMIT_WINDOW_SECONDS")
                .ok()
                .and_then(|value| value.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.rate_limit_window),
            rate_limit_max: env::var("COMMUTE_RATE_LIMIT_MAX")
                .ok()
                .and_then(|value| value.parse::<usize>().ok())
                .unwrap_or(defaults.rate_limit_max),
        }
    }
}

#[derive(Clone)]
pub struct ApiState {
    pub pipeline: Arc<QueryPipeline>,
    pub metrics: Arc<AppMetrics>,
    pub api_key: String,
    pub limiter: ClientRateLimiter,
}

impl ApiState {
    pub fn new(pipeline: QueryPipeline, config: ApiConfig) -> Self {
        let metrics = pipeline.metrics().clone();
        Self {
            pipeline: Arc::new(pipeline),
            metrics,
            api_key: config.api_key,
            limiter: ClientRateLimiter::new(config.rate_limit_window, config.rate_limit_max),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PredictRequest {
    message: String,
}

#[derive(Debug, Serialize)]
struct PredictResponse {
    intent: Vec<String>,
    entities: EntityMap,
}

impl From<QueryResult> for PredictResponse {
    fn from(result: QueryResult) -> Self {
        Self {
            intent: result.intents,
            entities: result.entities,
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    metrics: MetricsSnapshot,
    models: HealthModels,
}

#[derive(Debug, Serialize)]
struct HealthModels {
    intent_classifier: &'static str,
    token_classifier: &'static str,
}

/// Loads models from the environment and wires the full router.
pub fn build_app() -> Result<Router> {
    let metrics = AppMetrics::shared();
    let settings = PipelineSettings::from_env();
    let pipeline =
        QueryPipeline::load(&settings, metrics).context("failed to initialize query pipeline")?;

    Ok(build_router(ApiState::new(pipeline, ApiConfig::from_env())))
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/predict", post(predict))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        metrics: state.metrics.snapshot(),
        models: HealthModels {
            intent_classifier: state.pipeline.classifier_name(),
            token_classifier: state.pipeline.tagger_name(),
        },
    };
    (StatusCode::OK, Json(payload))
}

async fn predict(
    State(state): State<ApiState>,
    Json(request): Json<PredictRequest>,
) -> impl IntoResponse {
    let pipeline = state.pipeline.clone();
    let outcome =
        tokio::task::spawn_blocking(move || pipeline.understand(&request.message)).await;

    match outcome {
        Ok(Ok(result)) => (StatusCode::OK, Json(PredictResponse::from(result))).into_response(),
        Ok(Err(err)) => inference_failed(format!("{err:#}")),
        Err(join_err) => {
            error!(error = %join_err, "inference task did not complete");
            inference_failed("inference task did not complete".to_string())
        }
    }
}

fn inference_failed(detail: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({
            "error": "inference_failed",
            "detail": detail
        })),
    )
        .into_response()
}

async fn api_key_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || is_public_endpoint(request.uri().path()) {
        return next.run(request).await;
    }

    let header_key = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if !constant_time_eq(header_key.as_bytes(), state.api_key.as_bytes()) {
        warn!(path = %request.uri().path(), "rejected request without valid api key");
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": "unauthorized",
                "message": "missing or invalid x-api-key"
            })),
        )
            .into_response();
    }

    next.run(request).await
}

async fn rate_limit_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || is_public_endpoint(request.uri().path()) {
        return next.run(request).await;
    }

    let client = client_key(request.headers());
    if !state.limiter.allow(&client) {
        warn!(client = %client, "rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "error": "rate_limited",
                "message": "rate limit exceeded for this client"
            })),
        )
            .into_response();
    }

    next.run(request).await
}

fn is_public_endpoint(path: &str) -> bool {
    path == "/health"
}

fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("local")
        .to_string()
}

fn constant_time_eq(lhs: &[u8], rhs: &[u8]) -> bool {
    if lhs.len() != rhs.len() {
        return false;
    }
    let mut diff = 0_u8;
    for (a, b) in lhs.iter().zip(rhs.iter()) {
        diff |= a ^ b;
    }
    diff == 0
}
