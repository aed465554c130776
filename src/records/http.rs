// src/records/http.rs — Thin HTTP client for the remote record store
//
// Wire details (field provisioning, schema management) live server-side and
// are out of scope here; this wrapper only speaks the upsert/query endpoints.

use async_trait::async_trait;
use url::Url;

use super::{PlayerRecord, RecordStore, Registrant};
use crate::infra::config::RecordsConfig;
use crate::infra::errors::RegistaError;

pub struct HttpRecordStore {
    base_url: Url,
    token: String,
    client: reqwest::Client,
}

impl HttpRecordStore {
    pub fn new(base_url: &str, token: String) -> Result<Self, RegistaError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| RegistaError::Config(format!("records base_url: {e}")))?;
        Ok(Self {
            base_url,
            token,
            client: reqwest::Client::new(),
        })
    }

    pub fn from_config(config: &RecordsConfig) -> Result<Self, RegistaError> {
        let token = std::env::var(&config.token_env).unwrap_or_default();
        Self::new(&config.base_url, token)
    }

    fn endpoint(&self, path: &str) -> Result<Url, RegistaError> {
        self.base_url
            .join(path)
            .map_err(|e| RegistaError::Config(format!("records endpoint {path}: {e}")))
    }

    async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, RegistaError> {
        let url = self.endpoint(path)?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| RegistaError::RecordStore {
                message: e.to_string(),
                retriable: e.is_timeout() || e.is_connect(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RegistaError::RecordStore {
                message: format!("HTTP {status}: {text}"),
                retriable: status.is_server_error(),
            });
        }
        response.json().await.map_err(|e| RegistaError::RecordStore {
            message: format!("invalid response body: {e}"),
            retriable: false,
        })
    }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn team_exists(&self, team: &str, age_group: &str) -> Result<bool, RegistaError> {
        let body = serde_json::json!({ "team": team, "age_group": age_group });
        let resp = self.post_json("teams/lookup", &body).await?;
        Ok(resp["exists"].as_bool().unwrap_or(false))
    }

    async fn find_player(
        &self,
        slug: &str,
        team: &str,
        age_group: &str,
    ) -> Result<Option<PlayerRecord>, RegistaError> {
        let body = serde_json::json!({ "slug": slug, "team": team, "age_group": age_group });
        let resp = self.post_json("players/lookup", &body).await?;
        if resp["found"].as_bool() != Some(true) {
            return Ok(None);
        }
        let record = serde_json::from_value(resp["player"].clone()).map_err(|e| {
            RegistaError::RecordStore {
                message: format!("malformed player record: {e}"),
                retriable: false,
            }
        })?;
        Ok(Some(record))
    }

    async fn upsert_registrant(&self, registrant: &Registrant) -> Result<(), RegistaError> {
        let body = serde_json::to_value(registrant).map_err(|e| RegistaError::RecordStore {
            message: e.to_string(),
            retriable: false,
        })?;
        self.post_json("registrants/upsert", &body).await?;
        Ok(())
    }

    async fn set_payment_day(&self, correlation_id: &str, day: i32) -> Result<(), RegistaError> {
        let body = serde_json::json!({ "correlation_id": correlation_id, "payment_day": day });
        self.post_json("registrants/payment-day", &body).await?;
        Ok(())
    }

    async fn upsert_delivery_status(
        &self,
        correlation_id: &str,
        metrics: &serde_json::Value,
    ) -> Result<(), RegistaError> {
        let body = serde_json::json!({
            "correlation_id": correlation_id,
            "metrics": metrics,
        });
        self.post_json("notifications/delivery-status", &body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_join() {
        let store = HttpRecordStore::new("http://localhost:8700/api/", "t".into()).unwrap();
        let url = store.endpoint("teams/lookup").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8700/api/teams/lookup");
    }

    #[test]
    fn test_bad_base_url_rejected() {
        assert!(HttpRecordStore::new("not a url", "t".into()).is_err());
    }
}
