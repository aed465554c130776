// src/api/mod.rs — HTTP surface: chat turns and gateway callbacks

pub mod auth;
pub mod handlers;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::core::Orchestrator;
use crate::infra::config::ApiConfig;
use crate::queue::NotificationQueue;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
    pub queue: Arc<NotificationQueue>,
    pub token: Option<String>,
    pub turn_timeout: Duration,
}

/// Build the axum router with all API routes.
pub fn build_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/api/v1/chat", post(handlers::chat_turn))
        .route("/api/v1/chat/clear", post(handlers::clear_session))
        .route(
            "/api/v1/webhooks/delivery-status",
            post(handlers::delivery_status),
        )
        .route("/api/v1/health", get(handlers::health))
        .layer(cors)
        .with_state(state)
}

/// Start the API server on the given port (blocking).
pub async fn start_server(config: &ApiConfig, state: ApiState) -> anyhow::Result<()> {
    let port = config.port;
    let addr = format!("127.0.0.1:{port}");

    let router = build_router(state);

    tracing::info!("API server listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::core::OrchestratorConfig;
    use crate::infra::errors::RegistaError;
    use crate::provider::{ChatRequest, ChatResponse, CompletionProvider, StopReason, TokenUsage};
    use crate::routine::RoutineTable;
    use crate::session::SessionStore;
    use crate::tools::execution::ToolExecution;
    use crate::tools::ToolContext;
    use async_trait::async_trait;

    struct CannedProvider;

    #[async_trait]
    impl CompletionProvider for CannedProvider {
        fn id(&self) -> &str {
            "canned"
        }

        async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, RegistaError> {
            Ok(ChatResponse {
                content: r#"{"reply": "Hello there"}"#.to_string(),
                tool_calls: Vec::new(),
                usage: TokenUsage::default(),
                stop_reason: StopReason::EndTurn,
            })
        }
    }

    struct NoTools;

    #[async_trait]
    impl ToolExecution for NoTools {
        fn tool_defs(&self) -> Vec<crate::provider::ToolDef> {
            Vec::new()
        }

        async fn execute(
            &self,
            _ctx: &ToolContext,
            _call: &crate::provider::ToolCall,
        ) -> String {
            "{}".to_string()
        }
    }

    fn test_state(token: Option<String>) -> ApiState {
        let orchestrator = Orchestrator::new(
            Arc::new(CannedProvider),
            Arc::new(SessionStore::new(40)),
            Arc::new(RoutineTable::new().unwrap()),
            Arc::new(NoTools),
            OrchestratorConfig {
                model: "test-model".into(),
                max_tokens: 512,
                temperature: 0.2,
                max_rounds: 4,
                club_name: "Test FC".into(),
                season: "2526".into(),
            },
        );
        ApiState {
            orchestrator: Arc::new(orchestrator),
            queue: Arc::new(NotificationQueue::in_memory().unwrap()),
            token,
            turn_timeout: Duration::from_secs(5),
        }
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = build_router(test_state(None));
        let req = Request::builder()
            .uri("/api/v1/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_chat_without_session_id_uses_shared_session() {
        let state = test_state(None);
        let sessions = state.orchestrator.sessions().clone();
        let app = build_router(state);

        let resp = app
            .clone()
            .oneshot(post_json(
                "/api/v1/chat",
                serde_json::json!({"message": "Hi"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(resp.into_body(), 64 * 1024)
            .await
            .unwrap();
        let body: types::ChatTurnResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.reply, "Hello there");
        assert_eq!(body.session_id, crate::session::DEFAULT_SESSION);

        // A second id-less request continues the same conversation.
        app.oneshot(post_json(
            "/api/v1/chat",
            serde_json::json!({"message": "Hello again"}),
        ))
        .await
        .unwrap();
        assert_eq!(sessions.history(crate::session::DEFAULT_SESSION).len(), 4);
    }

    #[tokio::test]
    async fn test_chat_echoes_explicit_session_id() {
        let app = build_router(test_state(None));
        let resp = app
            .oneshot(post_json(
                "/api/v1/chat",
                serde_json::json!({"session_id": "family-42", "message": "Hi"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(resp.into_body(), 64 * 1024)
            .await
            .unwrap();
        let body: types::ChatTurnResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.session_id, "family-42");
    }

    #[tokio::test]
    async fn test_delivery_status_is_queued() {
        let state = test_state(None);
        let queue = state.queue.clone();
        let app = build_router(state);

        let resp = app
            .oneshot(post_json(
                "/api/v1/webhooks/delivery-status",
                serde_json::json!({
                    "correlation_id": "msg-42",
                    "metrics": {"status": "delivered", "segments": 1}
                }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(queue.counts().unwrap().pending, 1);
    }

    #[tokio::test]
    async fn test_bearer_token_required_when_configured() {
        let app = build_router(test_state(Some("s3cret".into())));
        let resp = app
            .oneshot(post_json(
                "/api/v1/chat",
                serde_json::json!({"message": "Hi"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let app = build_router(test_state(None));
        let resp = app
            .oneshot(post_json(
                "/api/v1/chat",
                serde_json::json!({"message": "   "}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
