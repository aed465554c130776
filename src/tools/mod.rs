// src/tools/mod.rs — Closed tool registry
//
// Tool names are a finite enumeration, not free strings: the registry is
// built and checked at startup, so an unknown tool name is a construction-time
// error rather than a runtime lookup miss.

pub mod execution;
pub mod handlers;
pub mod sms;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::infra::errors::RegistaError;
use crate::provider::ToolDef;

/// Every tool the assistant may call. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolId {
    ValidateRegistrationCode,
    LookupPlayer,
    ValidatePersonName,
    ValidateAddress,
    AdvanceRoutine,
    RecordMedicalConditions,
    SetPaymentDay,
    SaveRegistrant,
    SendConfirmation,
}

impl ToolId {
    pub const ALL: &'static [ToolId] = &[
        ToolId::ValidateRegistrationCode,
        ToolId::LookupPlayer,
        ToolId::ValidatePersonName,
        ToolId::ValidateAddress,
        ToolId::AdvanceRoutine,
        ToolId::RecordMedicalConditions,
        ToolId::SetPaymentDay,
        ToolId::SaveRegistrant,
        ToolId::SendConfirmation,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ToolId::ValidateRegistrationCode => "validate_registration_code",
            ToolId::LookupPlayer => "lookup_player",
            ToolId::ValidatePersonName => "validate_person_name",
            ToolId::ValidateAddress => "validate_address",
            ToolId::AdvanceRoutine => "advance_routine",
            ToolId::RecordMedicalConditions => "record_medical_conditions",
            ToolId::SetPaymentDay => "set_payment_day",
            ToolId::SaveRegistrant => "save_registrant",
            ToolId::SendConfirmation => "send_confirmation",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, RegistaError> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.name() == name)
            .ok_or_else(|| RegistaError::ToolNotFound {
                name: name.to_string(),
            })
    }
}

/// Per-invocation context. Handlers mutate session context through the store,
/// never through private copies.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub session_id: String,
}

/// A tool implementation: an advertised schema plus an invoke capability.
/// Handler-internal failures are returned as Err and converted into a
/// structured error payload by the execution strategy — they never abort the
/// turn.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn def(&self) -> ToolDef;

    async fn invoke(
        &self,
        ctx: &ToolContext,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, RegistaError>;
}

/// Registry mapping every `ToolId` to its handler. Construction fails if any
/// tool is missing a handler, so misconfiguration surfaces at startup.
pub struct ToolRegistry {
    handlers: HashMap<ToolId, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new(handlers: HashMap<ToolId, Arc<dyn ToolHandler>>) -> Result<Self, RegistaError> {
        for id in ToolId::ALL {
            if !handlers.contains_key(id) {
                return Err(RegistaError::Config(format!(
                    "no handler registered for tool '{}'",
                    id.name()
                )));
            }
        }
        Ok(Self { handlers })
    }

    pub fn get(&self, id: ToolId) -> &Arc<dyn ToolHandler> {
        // Registry totality is a construction invariant.
        &self.handlers[&id]
    }

    /// Schemas advertised to the completion service.
    pub fn tool_defs(&self) -> Vec<ToolDef> {
        let mut defs: Vec<ToolDef> = ToolId::ALL
            .iter()
            .map(|id| self.handlers[id].def())
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_id_roundtrip() {
        for id in ToolId::ALL {
            assert_eq!(ToolId::from_name(id.name()).unwrap(), *id);
        }
    }

    #[test]
    fn test_unknown_tool_name_rejected() {
        assert!(matches!(
            ToolId::from_name("delete_everything"),
            Err(RegistaError::ToolNotFound { .. })
        ));
    }

    #[test]
    fn test_registry_requires_all_handlers() {
        let err = ToolRegistry::new(HashMap::new()).err().unwrap();
        assert!(matches!(err, RegistaError::Config(_)));
    }
}
