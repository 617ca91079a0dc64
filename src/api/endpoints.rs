//! API endpoint handlers
//!
//! This module implements the HTTP endpoints of the gateway: prompt
//! forwarding, health check, upstream connectivity test, and a root banner.

use crate::api::error::GatewayError;
use crate::core::config::Config;
use crate::core::provider::{GenerationRequest, Provider};
use crate::models::gateway::{GenerateRequest, GenerateResponse, preview};
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// Longest slice of prompt or context written to debug logs
const PAYLOAD_PREVIEW_CHARS: usize = 200;

/// Prompt sent by the connectivity test
const CONNECTION_TEST_PROMPT: &str = "Test";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub provider: Arc<dyn Provider>,
}

/// Create the API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/generate", post(generate))
        .route("/api/health", get(health_check))
        .route("/api/test-connection", get(test_connection))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// POST /api/generate - Forward a prompt to the upstream provider
async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, GatewayError> {
    let request_id = uuid::Uuid::new_v4();

    let Json(body) = payload.map_err(|rejection| {
        warn!(%request_id, "Rejected request body: {}", rejection.body_text());
        GatewayError::from(rejection)
    })?;

    debug!(
        %request_id,
        "Request payload: prompt={:?}, context={:?}",
        body.prompt.as_deref().map(|p| preview(p, PAYLOAD_PREVIEW_CHARS)),
        body.context.as_deref().map(|c| preview(c, PAYLOAD_PREVIEW_CHARS))
    );

    let request = body
        .validate(state.config.max_prompt_chars)
        .map_err(|detail| {
            warn!(%request_id, "Validation failed: {}", detail);
            GatewayError::Validation(detail)
        })?;

    info!(
        %request_id,
        "📥 Incoming generate request: prompt_chars={}, context={}",
        request.prompt.chars().count(),
        request.context.is_some()
    );

    match state.provider.generate(&request).await {
        Ok(generation) => {
            info!(
                %request_id,
                "📤 Upstream {} responded: result_chars={}",
                state.provider.provider_name(),
                generation.text.chars().count()
            );
            Ok(Json(GenerateResponse {
                result: generation.text,
            }))
        }
        Err(e) => {
            error!(%request_id, "Provider API error: {}", e);
            Err(GatewayError::Upstream(e))
        }
    }
}

/// GET / - Root endpoint
async fn root(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "message": format!("Gemini Gateway v{}", env!("CARGO_PKG_VERSION")),
        "status": "running",
        "config": {
            "provider": state.provider.provider_name(),
            "model": state.config.model,
            "base_url": state.config.base_url,
            "request_timeout": state.config.request_timeout,
            "max_prompt_chars": state.config.max_prompt_chars,
            "environment": state.config.environment.as_str(),
            "debug": state.config.debug,
            "api_key_configured": !state.config.api_key.expose().is_empty(),
        },
        "endpoints": {
            "generate": "/api/generate",
            "health": "/api/health",
            "test_connection": "/api/test-connection",
        },
    }))
}

/// GET /api/health - Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "environment": state.config.environment.as_str(),
        "provider": state.provider.provider_name(),
        "model": state.config.model,
    }))
}

/// GET /api/test-connection - Send a short prompt through the provider
async fn test_connection(State(state): State<AppState>) -> impl IntoResponse {
    let request = GenerationRequest {
        prompt: CONNECTION_TEST_PROMPT.to_string(),
        context: None,
    };

    match state.provider.generate(&request).await {
        Ok(generation) => Json(json!({
            "status": "success",
            "message": format!("Successfully connected to {} API", state.provider.provider_name()),
            "provider": state.provider.provider_name(),
            "model_used": state.config.model,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "finish_reason": generation.finish_reason,
        })),
        Err(e) => {
            error!("API connectivity test failed: {}", e);
            Json(json!({
                "status": "failed",
                "error_type": "API Error",
                "message": e.to_string(),
                "provider": state.provider.provider_name(),
                "model_used": state.config.model,
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "suggestions": [
                    "Check that GEMINI_API_KEY is valid",
                    "Verify the model is available for this key and region",
                    "Check if you have reached rate limits",
                ],
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::UPSTREAM_FAILURE_MESSAGE;
    use crate::core::config::{API_KEY_VAR, TomlConfig};
    use crate::core::provider::{Generation, GenerationRequest, ProviderError};
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::{Duration, Instant};
    use tower::ServiceExt;

    /// Upstream stand-in driven by the prompt text:
    /// `fail*` errors, `timeout*` times out, `slow*` sleeps, `hang` never
    /// finishes, anything else answers "Hi there" or echoes after `echo:`.
    #[derive(Default)]
    struct StubProvider {
        calls: AtomicUsize,
        dropped: Arc<AtomicBool>,
        completed: Arc<AtomicBool>,
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Provider for StubProvider {
        async fn generate(
            &self,
            request: &GenerationRequest,
        ) -> Result<Generation, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let prompt = request.prompt.as_str();

            if prompt.starts_with("fail") {
                return Err(ProviderError::ApiError {
                    status: 503,
                    message: "overloaded".to_string(),
                });
            }
            if prompt.starts_with("timeout") {
                return Err(ProviderError::Timeout(Duration::from_secs(30)));
            }
            if prompt == "hang" {
                let _guard = DropFlag(self.dropped.clone());
                tokio::time::sleep(Duration::from_secs(60)).await;
                self.completed.store(true, Ordering::SeqCst);
            }
            if prompt.starts_with("slow") {
                tokio::time::sleep(Duration::from_millis(500)).await;
            }

            let text = match prompt.strip_prefix("echo:") {
                Some(rest) => rest.to_string(),
                None if prompt.starts_with("slow") => prompt.to_string(),
                None => "Hi there".to_string(),
            };
            Ok(Generation {
                text,
                finish_reason: Some("STOP".to_string()),
                usage: None,
            })
        }

        fn provider_name(&self) -> &str {
            "Stub"
        }
    }

    fn test_config() -> Arc<Config> {
        let config = Config::from_sources(TomlConfig::default(), |name| {
            match name {
                n if n == API_KEY_VAR => Some("test-key".to_string()),
                "MAX_PROMPT_CHARS" => Some("64".to_string()),
                _ => None,
            }
        })
        .unwrap();
        Arc::new(config)
    }

    fn test_app() -> (Router, Arc<StubProvider>) {
        let provider = Arc::new(StubProvider::default());
        let state = AppState {
            config: test_config(),
            provider: provider.clone(),
        };
        (create_router(state), provider)
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/generate")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_generate_success() {
        let (app, provider) = test_app();
        let (status, body) = send(app, post_json(r#"{"prompt": "Hello"}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"result": "Hi there"}));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_prompt_is_rejected_without_upstream_call() {
        let (app, provider) = test_app();
        let (status, body) = send(app, post_json("{}")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "validation failed: prompt required"}));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_bodies_are_rejected() {
        for raw in [
            r#"{"prompt": 42}"#,
            "{not json",
            "[]",
            r#"["Hello"]"#,
            r#"["Hello", "financial_learning"]"#,
            r#""Hello""#,
        ] {
            let (app, provider) = test_app();
            let (status, body) = send(app, post_json(raw)).await;

            assert_eq!(status, StatusCode::BAD_REQUEST, "body {}", raw);
            assert!(
                body["error"]
                    .as_str()
                    .unwrap()
                    .starts_with("validation failed:")
            );
            assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn test_missing_content_type_is_rejected() {
        let (app, provider) = test_app();
        let request = Request::builder()
            .method("POST")
            .uri("/api/generate")
            .body(Body::from(r#"{"prompt": "Hello"}"#))
            .unwrap();
        let (status, _) = send(app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_oversized_prompt_is_rejected() {
        let (app, provider) = test_app();
        let prompt = "a".repeat(65);
        let (status, body) = send(app, post_json(&json!({"prompt": prompt}).to_string())).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("exceeds 64"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_upstream_failure_maps_to_502() {
        let (app, _) = test_app();
        let (status, body) = send(app, post_json(r#"{"prompt": "fail now"}"#)).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body, json!({"error": UPSTREAM_FAILURE_MESSAGE}));
    }

    #[tokio::test]
    async fn test_upstream_timeout_maps_to_502() {
        let (app, _) = test_app();
        let (status, body) = send(app, post_json(r#"{"prompt": "timeout"}"#)).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_independent() {
        let (app, provider) = test_app();

        let prompts: Vec<String> = (0..50)
            .map(|i| match i % 3 {
                0 => format!("slow-{}", i),
                1 => format!("fail-{}", i),
                _ => format!("echo:fast-{}", i),
            })
            .collect();

        let started = Instant::now();
        let responses = futures::future::join_all(prompts.iter().map(|prompt| {
            let app = app.clone();
            let request = post_json(&json!({"prompt": prompt}).to_string());
            async move { send(app, request).await }
        }))
        .await;

        // 17 slow calls at 500ms each would take over 8s if serialized.
        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 50);

        for (prompt, (status, body)) in prompts.iter().zip(responses) {
            if prompt.starts_with("fail") {
                assert_eq!(status, StatusCode::BAD_GATEWAY);
            } else {
                let expected = prompt.strip_prefix("echo:").unwrap_or(prompt);
                assert_eq!(status, StatusCode::OK);
                assert_eq!(body["result"], expected.to_string());
            }
        }
    }

    #[tokio::test]
    async fn test_dropped_request_cancels_upstream_call() {
        let (app, provider) = test_app();
        let pending = app.oneshot(post_json(r#"{"prompt": "hang"}"#));

        let outcome = tokio::time::timeout(Duration::from_millis(100), pending).await;
        assert!(outcome.is_err());

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert!(provider.dropped.load(Ordering::SeqCst));
        assert!(!provider.completed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_health_check() {
        let (app, _) = test_app();
        let request = Request::builder()
            .uri("/api/health")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["environment"], "development");
        assert_eq!(body["provider"], "Stub");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_root_never_exposes_api_key() {
        let (app, _) = test_app();
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["config"]["api_key_configured"], true);
        assert!(!body.to_string().contains("test-key"));
    }

    #[tokio::test]
    async fn test_connection_success() {
        let (app, provider) = test_app();
        let request = Request::builder()
            .uri("/api/test-connection")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["provider"], "Stub");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert!(!body.to_string().contains("test-key"));
    }

    /// Stub that fails every call, for the connectivity failure path
    struct FailingProvider;

    #[async_trait]
    impl Provider for FailingProvider {
        async fn generate(
            &self,
            _request: &GenerationRequest,
        ) -> Result<Generation, ProviderError> {
            Err(ProviderError::Authentication(
                "Invalid API key. Please check GEMINI_API_KEY.".to_string(),
            ))
        }

        fn provider_name(&self) -> &str {
            "Failing"
        }
    }

    #[tokio::test]
    async fn test_connection_failure() {
        let app = create_router(AppState {
            config: test_config(),
            provider: Arc::new(FailingProvider),
        });
        let request = Request::builder()
            .uri("/api/test-connection")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "failed");
        assert!(body["message"].as_str().unwrap().contains("Authentication failed"));
        assert!(!body.to_string().contains("test-key"));
    }
}
