// src/records/mod.rs — Remote record store boundary
//
// The record store is the single source of truth for registration and payment
// state. Both the orchestrator (via tools) and the notification processor
// write to it, so every write is an idempotent upsert keyed by a business
// correlation id.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::infra::errors::RegistaError;

/// A registrant as written to the record store. Opaque extras ride along in
/// `fields`; the named columns are what the routines validate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registrant {
    /// Business correlation id: the registration code plus player slug.
    pub correlation_id: String,
    pub player_name: String,
    pub team: String,
    pub age_group: String,
    pub season: String,
    #[serde(default)]
    pub guardian_name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub second_address: Option<String>,
    #[serde(default)]
    pub medical_notes: Option<String>,
    #[serde(default)]
    pub payment_day: Option<i32>,
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// A player row from a previous season, looked up for re-registrations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub player_name: String,
    pub team: String,
    pub age_group: String,
    pub season: String,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Does this team + normalized age group exist for the active season?
    async fn team_exists(&self, team: &str, age_group: &str) -> Result<bool, RegistaError>;

    /// Find a returning player by name slug within a team/age-group.
    async fn find_player(
        &self,
        slug: &str,
        team: &str,
        age_group: &str,
    ) -> Result<Option<PlayerRecord>, RegistaError>;

    /// Idempotent upsert of a registrant keyed by correlation id.
    async fn upsert_registrant(&self, registrant: &Registrant) -> Result<(), RegistaError>;

    /// Record the normalized payment collection day.
    async fn set_payment_day(&self, correlation_id: &str, day: i32) -> Result<(), RegistaError>;

    /// Idempotent upsert of SMS delivery metrics keyed by the billing/request
    /// correlation id. Retried by the queue processor; must tolerate replays.
    async fn upsert_delivery_status(
        &self,
        correlation_id: &str,
        metrics: &serde_json::Value,
    ) -> Result<(), RegistaError>;
}
