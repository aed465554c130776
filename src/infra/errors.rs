// src/infra/errors.rs — Error types for Regista

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistaError {
    // Completion-service errors (transport, timeout — retriable by the caller)
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("Turn timed out after {seconds}s")]
    TurnTimeout { seconds: u64 },

    // Contract violations (fatal for the turn)
    #[error("Final reply did not match the expected schema: {0}")]
    MalformedReply(String),

    #[error("Tool '{name}' is not registered")]
    ToolNotFound { name: String },

    // Remote record store
    #[error("Record store error: {message}")]
    RecordStore { message: String, retriable: bool },

    // SMS gateway
    #[error("SMS gateway error: {message}")]
    SmsGateway { message: String, retriable: bool },

    // Infra
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RegistaError {
    /// Whether the whole turn can safely be retried by the external caller.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            RegistaError::Provider {
                retriable: true,
                ..
            } | RegistaError::RateLimited { .. }
                | RegistaError::TurnTimeout { .. }
                | RegistaError::RecordStore {
                    retriable: true,
                    ..
                }
                | RegistaError::SmsGateway {
                    retriable: true,
                    ..
                }
        )
    }
}
