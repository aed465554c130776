// src/api/handlers.rs

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use crate::api::{auth, types::*, ApiState};
use crate::infra::errors::RegistaError;
use crate::session::DEFAULT_SESSION;

/// POST /api/v1/chat — Run one conversational turn.
///
/// The turn runs under the configured deadline. On timeout nothing has been
/// committed to the session, so the caller can resend the same message.
pub async fn chat_turn(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<ChatTurnRequest>,
) -> Result<Json<ChatTurnResponse>, (StatusCode, Json<ErrorResponse>)> {
    auth::check_auth(&state, &headers)?;

    if body.message.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::terminal("Message cannot be empty")),
        ));
    }

    // A caller that omits session_id talks to the shared default session,
    // the same one /chat/clear resets by default.
    let session_id = body.session_id.unwrap_or_else(|| DEFAULT_SESSION.to_string());

    let turn = state.orchestrator.advance(&session_id, &body.message);
    match tokio::time::timeout(state.turn_timeout, turn).await {
        Ok(Ok(reply)) => Ok(Json(ChatTurnResponse { session_id, reply })),
        Ok(Err(e)) => {
            tracing::error!(session = %session_id, "Turn failed: {e}");
            let status = if e.is_retriable() {
                StatusCode::BAD_GATEWAY
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            let response = if e.is_retriable() {
                ErrorResponse::retryable(e.to_string())
            } else {
                ErrorResponse::terminal(e.to_string())
            };
            Err((status, Json(response)))
        }
        Err(_) => {
            let e = RegistaError::TurnTimeout {
                seconds: state.turn_timeout.as_secs(),
            };
            tracing::warn!(session = %session_id, "{e}");
            Err((
                StatusCode::GATEWAY_TIMEOUT,
                Json(ErrorResponse::retryable(e.to_string())),
            ))
        }
    }
}

/// POST /api/v1/chat/clear — Reset a session's history and collected state.
pub async fn clear_session(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<ClearSessionRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ErrorResponse>)> {
    auth::check_auth(&state, &headers)?;

    let session_id = body.session_id.unwrap_or_else(|| DEFAULT_SESSION.to_string());
    state.orchestrator.sessions().clear(&session_id);
    Ok(Json(serde_json::json!({
        "session_id": session_id,
        "status": "cleared",
    })))
}

/// POST /api/v1/webhooks/delivery-status — SMS gateway delivery callback.
///
/// The callback is acknowledged only after the record is durably queued;
/// the slow write to the record store happens in the background processor.
pub async fn delivery_status(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<DeliveryStatusRequest>,
) -> Result<(StatusCode, Json<DeliveryAcceptedResponse>), (StatusCode, Json<ErrorResponse>)> {
    auth::check_auth(&state, &headers)?;

    if body.correlation_id.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::terminal("correlation_id cannot be empty")),
        ));
    }

    match state.queue.enqueue(&body.correlation_id, &body.metrics) {
        Ok(id) => Ok((
            StatusCode::ACCEPTED,
            Json(DeliveryAcceptedResponse {
                id,
                status: "queued".into(),
            }),
        )),
        Err(e) => {
            tracing::error!(correlation_id = %body.correlation_id, "Failed to queue delivery status: {e}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::retryable("Failed to persist delivery status")),
            ))
        }
    }
}

/// GET /api/v1/health — Simple health check.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
