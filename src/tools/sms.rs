// src/tools/sms.rs — SMS gateway boundary
//
// The gateway itself (templating, sender pools, HTTP details) is an external
// collaborator; this is the interface the confirmation tool talks to. The
// returned message id is the correlation id later echoed by the gateway's
// delivery-status webhook.

use async_trait::async_trait;

use crate::infra::config::SmsConfig;
use crate::infra::errors::RegistaError;

#[async_trait]
pub trait ConfirmationSender: Send + Sync {
    /// Send a confirmation message. Returns the gateway message id.
    async fn send(&self, to: &str, body: &str) -> Result<String, RegistaError>;
}

pub struct HttpSmsGateway {
    base_url: String,
    token: String,
    from: String,
    client: reqwest::Client,
}

impl HttpSmsGateway {
    pub fn from_config(config: &SmsConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: std::env::var(&config.token_env).unwrap_or_default(),
            from: config.from.clone(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ConfirmationSender for HttpSmsGateway {
    async fn send(&self, to: &str, body: &str) -> Result<String, RegistaError> {
        let payload = serde_json::json!({
            "from": self.from,
            "to": to,
            "body": body,
        });
        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| RegistaError::SmsGateway {
                message: e.to_string(),
                retriable: e.is_timeout() || e.is_connect(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RegistaError::SmsGateway {
                message: format!("HTTP {status}: {text}"),
                retriable: status.is_server_error(),
            });
        }

        let resp: serde_json::Value =
            response.json().await.map_err(|e| RegistaError::SmsGateway {
                message: format!("unreadable response: {e}"),
                retriable: false,
            })?;
        Ok(resp["message_id"]
            .as_str()
            .unwrap_or_default()
            .to_string())
    }
}
