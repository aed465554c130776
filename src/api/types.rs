// src/api/types.rs

use serde::{Deserialize, Serialize};

/// Request body for a chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurnRequest {
    /// Omitted on the first message; the server assigns one and echoes it back.
    #[serde(default)]
    pub session_id: Option<String>,
    pub message: String,
}

/// Response for a chat turn.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatTurnResponse {
    pub session_id: String,
    pub reply: String,
}

/// Request body for clearing a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearSessionRequest {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Delivery-status callback from the SMS gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryStatusRequest {
    /// The gateway message id handed out when the confirmation was sent.
    pub correlation_id: String,
    /// Opaque delivery metrics, stored and forwarded verbatim.
    #[serde(default)]
    pub metrics: serde_json::Value,
}

/// Acknowledgement that a delivery status was durably queued.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeliveryAcceptedResponse {
    pub id: i64,
    pub status: String,
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// True when the caller may safely retry the same request.
    #[serde(default)]
    pub retryable: bool,
}

impl ErrorResponse {
    pub fn terminal(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            retryable: false,
        }
    }

    pub fn retryable(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            retryable: true,
        }
    }
}
