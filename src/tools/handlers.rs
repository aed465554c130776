// src/tools/handlers.rs — Concrete tool implementations
//
// Handlers are thin: validators and the routine table do the real work, and
// all durable state goes through the session store or the record store.
// Validation failures are Ok(...) payloads so the model can reprompt;
// only external-dependency failures propagate as Err.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::sms::ConfirmationSender;
use super::{ToolContext, ToolHandler, ToolId, ToolRegistry};
use crate::infra::errors::RegistaError;
use crate::provider::ToolDef;
use crate::records::{RecordStore, Registrant};
use crate::registration::code::{CodeError, RegistrationCode};
use crate::registration::validate::{
    normalize_payment_day, validate_address, validate_person_name, Validation, LAST_DAY_OF_MONTH,
};
use crate::routine::medical::{capture_complete, classify_condition, MedicalFollowUp, MedicalSeverity};
use crate::routine::{Branch, RoutineContext, RoutineTable, INITIAL_ROUTINE};
use crate::session::SessionStore;

// Session context keys written by handlers.
pub const CTX_ROUTINE_ID: &str = "routine_id";
pub const CTX_REGISTRATION_CODE: &str = "registration_code";
pub const CTX_TEAM: &str = "team";
pub const CTX_AGE_GROUP: &str = "age_group";
pub const CTX_PLAYER_SLUG: &str = "player_slug";
pub const CTX_PLAYER_NAME: &str = "player_name";
pub const CTX_MEDICAL_SEVERITY: &str = "medical_severity";
pub const CTX_MEDICAL_NOTES: &str = "medical_notes";
pub const CTX_MEDICATION_LOCATION: &str = "medication_location";
pub const CTX_EMERGENCY_ACTION: &str = "emergency_action";
pub const CTX_MEDICAL_TRIGGERS: &str = "medical_triggers";
pub const CTX_PAYMENT_DAY: &str = "payment_day";
pub const CTX_CONFIRMATION_ID: &str = "confirmation_id";

const MEDICAL_ROUTINE: u8 = 8;

/// Shared dependencies injected into every handler.
pub struct ToolDeps {
    pub sessions: Arc<SessionStore>,
    pub records: Arc<dyn RecordStore>,
    pub routines: Arc<RoutineTable>,
    pub sms: Arc<dyn ConfirmationSender>,
    pub club_name: String,
    pub season: String,
}

impl ToolDeps {
    fn routine_context(&self, session_id: &str) -> RoutineContext {
        RoutineContext {
            club_name: self.club_name.clone(),
            season: self.season.clone(),
            collected: self.sessions.context(session_id),
        }
    }

    fn active_routine(&self, session_id: &str) -> u8 {
        self.sessions
            .get_context(session_id, CTX_ROUTINE_ID)
            .and_then(|s| s.parse().ok())
            .filter(|id| self.routines.is_valid(*id))
            .unwrap_or(INITIAL_ROUTINE)
    }
}

/// Build the standard registry. Fails at startup if any tool lacks a handler.
pub fn standard_registry(deps: Arc<ToolDeps>) -> Result<ToolRegistry, RegistaError> {
    let mut handlers: HashMap<ToolId, Arc<dyn ToolHandler>> = HashMap::new();
    handlers.insert(
        ToolId::ValidateRegistrationCode,
        Arc::new(ValidateCode { deps: deps.clone() }),
    );
    handlers.insert(ToolId::LookupPlayer, Arc::new(LookupPlayer { deps: deps.clone() }));
    handlers.insert(
        ToolId::ValidatePersonName,
        Arc::new(ValidateName { deps: deps.clone() }),
    );
    handlers.insert(
        ToolId::ValidateAddress,
        Arc::new(ValidateAddr { deps: deps.clone() }),
    );
    handlers.insert(
        ToolId::AdvanceRoutine,
        Arc::new(AdvanceRoutine { deps: deps.clone() }),
    );
    handlers.insert(
        ToolId::RecordMedicalConditions,
        Arc::new(RecordMedical { deps: deps.clone() }),
    );
    handlers.insert(ToolId::SetPaymentDay, Arc::new(SetPaymentDay { deps: deps.clone() }));
    handlers.insert(
        ToolId::SaveRegistrant,
        Arc::new(SaveRegistrant { deps: deps.clone() }),
    );
    handlers.insert(ToolId::SendConfirmation, Arc::new(SendConfirmation { deps }));
    ToolRegistry::new(handlers)
}

fn arg_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(|v| v.as_str()).map(str::trim).filter(|s| !s.is_empty())
}

fn validation_payload(v: &Validation) -> Value {
    match v {
        Validation::Valid => json!({ "valid": true }),
        Validation::Invalid { reason } => json!({ "valid": false, "reason": reason }),
    }
}

// ─── validate_registration_code ─────────────────────────────

struct ValidateCode {
    deps: Arc<ToolDeps>,
}

#[async_trait]
impl ToolHandler for ValidateCode {
    fn def(&self) -> ToolDef {
        ToolDef {
            name: ToolId::ValidateRegistrationCode.name().into(),
            description: "Validate a registration code from the club's letter or email and route \
                the conversation to the returning-player or new-player path."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "code": { "type": "string", "description": "The code exactly as given, e.g. 200-tigers-u13-2526" }
                },
                "required": ["code"]
            }),
        }
    }

    async fn invoke(&self, ctx: &ToolContext, args: Value) -> Result<Value, RegistaError> {
        let Some(raw) = arg_str(&args, "code") else {
            return Ok(json!({ "valid": false, "reason": "no code was provided" }));
        };

        let code = match RegistrationCode::parse(raw, &self.deps.season) {
            Ok(code) => code,
            Err(e) => {
                // Unparseable is a conversational outcome, not an error.
                let reason = match &e {
                    CodeError::WrongSeason { expected, .. } => format!(
                        "this code is for a previous season; codes for the current season end in {expected}"
                    ),
                    other => other.to_string(),
                };
                return Ok(json!({ "valid": false, "reason": reason }));
            }
        };

        // Team + age group must exist in the record store.
        if !self.deps.records.team_exists(&code.team, &code.age_group).await? {
            return Ok(json!({
                "valid": false,
                "reason": format!(
                    "we don't run a {} team at {} this season — the code may be mistyped",
                    code.age_group, code.team
                )
            }));
        }

        let sessions = &self.deps.sessions;
        sessions.set_context(&ctx.session_id, CTX_REGISTRATION_CODE, &code.to_string());
        sessions.set_context(&ctx.session_id, CTX_TEAM, &code.team);
        sessions.set_context(&ctx.session_id, CTX_AGE_GROUP, &code.age_group);
        if let Some(ref slug) = code.player_slug {
            sessions.set_context(&ctx.session_id, CTX_PLAYER_SLUG, slug);
        }
        let next = self.deps.routines.next_after_code(code.prefix);
        sessions.set_context(&ctx.session_id, CTX_ROUTINE_ID, &next.to_string());

        let instructions = self
            .deps
            .routines
            .render(next, &self.deps.routine_context(&ctx.session_id))?;

        Ok(json!({
            "valid": true,
            "prefix": code.prefix.as_number(),
            "team": code.team,
            "age_group": code.age_group,
            "path": match code.prefix.as_number() {
                100 => "re_registration",
                _ => "new_registration",
            },
            "instructions": instructions,
        }))
    }
}

// ─── lookup_player ──────────────────────────────────────────

struct LookupPlayer {
    deps: Arc<ToolDeps>,
}

#[async_trait]
impl ToolHandler for LookupPlayer {
    fn def(&self) -> ToolDef {
        ToolDef {
            name: ToolId::LookupPlayer.name().into(),
            description: "Fetch a returning player's record from last season by name slug.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "slug": { "type": "string", "description": "Player name slug; defaults to the slug from the registration code" }
                },
                "required": []
            }),
        }
    }

    async fn invoke(&self, ctx: &ToolContext, args: Value) -> Result<Value, RegistaError> {
        let sessions = &self.deps.sessions;
        let slug = arg_str(&args, "slug")
            .map(str::to_string)
            .or_else(|| sessions.get_context(&ctx.session_id, CTX_PLAYER_SLUG));
        let (Some(slug), Some(team), Some(age_group)) = (
            slug,
            sessions.get_context(&ctx.session_id, CTX_TEAM),
            sessions.get_context(&ctx.session_id, CTX_AGE_GROUP),
        ) else {
            return Ok(json!({
                "found": false,
                "reason": "no validated registration code yet — validate the code first"
            }));
        };

        match self.deps.records.find_player(&slug, &team, &age_group).await? {
            Some(player) => {
                sessions.set_context(&ctx.session_id, CTX_PLAYER_NAME, &player.player_name);
                Ok(json!({ "found": true, "player": player }))
            }
            None => Ok(json!({
                "found": false,
                "reason": format!("no player '{slug}' found in {team} {age_group} — ask the parent to double-check the code")
            })),
        }
    }
}

// ─── validate_person_name ───────────────────────────────────

struct ValidateName {
    deps: Arc<ToolDeps>,
}

#[async_trait]
impl ToolHandler for ValidateName {
    fn def(&self) -> ToolDef {
        ToolDef {
            name: ToolId::ValidatePersonName.name().into(),
            description: "Validate a person's full name and store it against the given field."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "field": { "type": "string", "enum": ["player_name", "guardian_name", "second_guardian_name"] }
                },
                "required": ["name", "field"]
            }),
        }
    }

    async fn invoke(&self, ctx: &ToolContext, args: Value) -> Result<Value, RegistaError> {
        let Some(name) = arg_str(&args, "name") else {
            return Ok(json!({ "valid": false, "reason": "no name was provided" }));
        };
        let field = arg_str(&args, "field").unwrap_or(CTX_PLAYER_NAME);
        let outcome = validate_person_name(name);
        if outcome.is_valid() {
            self.deps.sessions.set_context(&ctx.session_id, field, name);
        }
        Ok(validation_payload(&outcome))
    }
}

// ─── validate_address ───────────────────────────────────────

struct ValidateAddr {
    deps: Arc<ToolDeps>,
}

#[async_trait]
impl ToolHandler for ValidateAddr {
    fn def(&self) -> ToolDef {
        ToolDef {
            name: ToolId::ValidateAddress.name().into(),
            description: "Validate a postal address (must include a number and a postcode) and \
                store it against the given field."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "address": { "type": "string" },
                    "field": { "type": "string", "enum": ["address", "second_address"] }
                },
                "required": ["address", "field"]
            }),
        }
    }

    async fn invoke(&self, ctx: &ToolContext, args: Value) -> Result<Value, RegistaError> {
        let Some(address) = arg_str(&args, "address") else {
            return Ok(json!({ "valid": false, "reason": "no address was provided" }));
        };
        let field = arg_str(&args, "field").unwrap_or("address");
        let outcome = validate_address(address);
        if outcome.is_valid() {
            self.deps.sessions.set_context(&ctx.session_id, field, address);
        }
        Ok(validation_payload(&outcome))
    }
}

// ─── advance_routine ────────────────────────────────────────

struct AdvanceRoutine {
    deps: Arc<ToolDeps>,
}

#[async_trait]
impl ToolHandler for AdvanceRoutine {
    fn def(&self) -> ToolDef {
        ToolDef {
            name: ToolId::AdvanceRoutine.name().into(),
            description: "Move to the next registration step once the current step's information \
                is captured. For yes/no questions, pass your classification of the parent's \
                answer; pass 'unclear' if you are not confident."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "classification": { "type": "string", "enum": ["affirmative", "negative", "unclear"] }
                },
                "required": []
            }),
        }
    }

    async fn invoke(&self, ctx: &ToolContext, args: Value) -> Result<Value, RegistaError> {
        let sessions = &self.deps.sessions;
        let current = self.deps.active_routine(&ctx.session_id);

        // The medical routine cannot advance while a serious condition's
        // follow-up captures are incomplete.
        if current == MEDICAL_ROUTINE {
            let severity = sessions
                .get_context(&ctx.session_id, CTX_MEDICAL_SEVERITY)
                .unwrap_or_default();
            if severity == "serious" {
                let follow_up = MedicalFollowUp {
                    medication_location: sessions.get_context(&ctx.session_id, CTX_MEDICATION_LOCATION),
                    emergency_action: sessions.get_context(&ctx.session_id, CTX_EMERGENCY_ACTION),
                    triggers: sessions.get_context(&ctx.session_id, CTX_MEDICAL_TRIGGERS),
                };
                if !capture_complete(MedicalSeverity::Serious, &follow_up) {
                    return Ok(json!({
                        "advanced": false,
                        "reason": "serious medical condition follow-up is incomplete",
                        "missing": follow_up.missing_fields(),
                    }));
                }
            }
        }

        // An absent classification is treated as unclear: linear routines
        // ignore the branch, and a 3-way routine must clarify, not guess.
        let branch = Branch::from_label(arg_str(&args, "classification").unwrap_or("unclear"));
        let next = self.deps.routines.transition(current, branch);
        sessions.set_context(&ctx.session_id, CTX_ROUTINE_ID, &next.to_string());

        let instructions = self
            .deps
            .routines
            .render(next, &self.deps.routine_context(&ctx.session_id))?;

        Ok(json!({
            "advanced": next != current,
            "routine_id": next,
            "instructions": instructions,
        }))
    }
}

// ─── record_medical_conditions ──────────────────────────────

struct RecordMedical {
    deps: Arc<ToolDeps>,
}

#[async_trait]
impl ToolHandler for RecordMedical {
    fn def(&self) -> ToolDef {
        ToolDef {
            name: ToolId::RecordMedicalConditions.name().into(),
            description: "Record the player's medical conditions. Serious conditions also need \
                medication_location, emergency_action and triggers before the step can complete."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "conditions": { "type": "string", "description": "The conditions as the parent described them, or 'none'" },
                    "medication_location": { "type": "string" },
                    "emergency_action": { "type": "string" },
                    "triggers": { "type": "string" }
                },
                "required": ["conditions"]
            }),
        }
    }

    async fn invoke(&self, ctx: &ToolContext, args: Value) -> Result<Value, RegistaError> {
        let sessions = &self.deps.sessions;
        let conditions = arg_str(&args, "conditions").unwrap_or("none");
        let severity = classify_condition(conditions);

        sessions.set_context(&ctx.session_id, CTX_MEDICAL_NOTES, conditions);
        let severity_label = match severity {
            MedicalSeverity::Serious => "serious",
            MedicalSeverity::Minor => "minor",
            MedicalSeverity::None => "none",
        };
        sessions.set_context(&ctx.session_id, CTX_MEDICAL_SEVERITY, severity_label);

        for (arg, key) in [
            ("medication_location", CTX_MEDICATION_LOCATION),
            ("emergency_action", CTX_EMERGENCY_ACTION),
            ("triggers", CTX_MEDICAL_TRIGGERS),
        ] {
            if let Some(value) = arg_str(&args, arg) {
                sessions.set_context(&ctx.session_id, key, value);
            }
        }

        let follow_up = MedicalFollowUp {
            medication_location: sessions.get_context(&ctx.session_id, CTX_MEDICATION_LOCATION),
            emergency_action: sessions.get_context(&ctx.session_id, CTX_EMERGENCY_ACTION),
            triggers: sessions.get_context(&ctx.session_id, CTX_MEDICAL_TRIGGERS),
        };
        let complete = capture_complete(severity, &follow_up);

        let mut payload = json!({
            "recorded": true,
            "severity": severity_label,
            "complete": complete,
        });
        if !complete {
            payload["missing"] = json!(follow_up.missing_fields());
        }
        Ok(payload)
    }
}

// ─── set_payment_day ────────────────────────────────────────

struct SetPaymentDay {
    deps: Arc<ToolDeps>,
}

#[async_trait]
impl ToolHandler for SetPaymentDay {
    fn def(&self) -> ToolDef {
        ToolDef {
            name: ToolId::SetPaymentDay.name().into(),
            description: "Set the monthly collection day. Days 29-31 collect on the last day of \
                the month."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "day": { "type": "integer", "minimum": 1, "maximum": 31 }
                },
                "required": ["day"]
            }),
        }
    }

    async fn invoke(&self, ctx: &ToolContext, args: Value) -> Result<Value, RegistaError> {
        let Some(day) = args.get("day").and_then(|v| v.as_i64()) else {
            return Ok(json!({ "valid": false, "reason": "no day was provided" }));
        };
        let Ok(day) = i32::try_from(day) else {
            return Ok(json!({
                "valid": false,
                "reason": format!("'{day}' is not a day of the month")
            }));
        };
        let normalized = match normalize_payment_day(day) {
            Ok(n) => n,
            Err(reason) => return Ok(json!({ "valid": false, "reason": reason })),
        };

        let sessions = &self.deps.sessions;
        sessions.set_context(&ctx.session_id, CTX_PAYMENT_DAY, &normalized.to_string());

        // Hand the normalized value to the payment boundary keyed by the code,
        // so retried writes converge on the same record.
        if let Some(code) = sessions.get_context(&ctx.session_id, CTX_REGISTRATION_CODE) {
            self.deps.records.set_payment_day(&code, normalized).await?;
        }

        Ok(json!({
            "valid": true,
            "payment_day": normalized,
            "last_day_of_month": normalized == LAST_DAY_OF_MONTH,
        }))
    }
}

// ─── save_registrant ────────────────────────────────────────

struct SaveRegistrant {
    deps: Arc<ToolDeps>,
}

#[async_trait]
impl ToolHandler for SaveRegistrant {
    fn def(&self) -> ToolDef {
        ToolDef {
            name: ToolId::SaveRegistrant.name().into(),
            description: "Save the completed registration to the club's records. Call only after \
                the parent has confirmed the summary."
                .into(),
            parameters: json!({ "type": "object", "properties": {}, "required": [] }),
        }
    }

    async fn invoke(&self, ctx: &ToolContext, _args: Value) -> Result<Value, RegistaError> {
        let sessions = &self.deps.sessions;
        let get = |key: &str| sessions.get_context(&ctx.session_id, key);

        let (Some(code), Some(player_name)) = (get(CTX_REGISTRATION_CODE), get(CTX_PLAYER_NAME))
        else {
            return Ok(json!({
                "saved": false,
                "reason": "registration is incomplete — code and player name are required"
            }));
        };

        let slug = get(CTX_PLAYER_SLUG)
            .unwrap_or_else(|| RegistrationCode::slug_for_name(&player_name));
        let correlation_id = format!("{code}#{slug}");

        let registrant = Registrant {
            correlation_id: correlation_id.clone(),
            player_name,
            team: get(CTX_TEAM).unwrap_or_default(),
            age_group: get(CTX_AGE_GROUP).unwrap_or_default(),
            season: self.deps.season.clone(),
            guardian_name: get("guardian_name"),
            address: get("address"),
            second_address: get("second_address"),
            medical_notes: get(CTX_MEDICAL_NOTES),
            payment_day: get(CTX_PAYMENT_DAY).and_then(|s| s.parse().ok()),
            fields: Default::default(),
        };

        self.deps.records.upsert_registrant(&registrant).await?;
        Ok(json!({ "saved": true, "correlation_id": correlation_id }))
    }
}

// ─── send_confirmation ──────────────────────────────────────

struct SendConfirmation {
    deps: Arc<ToolDeps>,
}

#[async_trait]
impl ToolHandler for SendConfirmation {
    fn def(&self) -> ToolDef {
        ToolDef {
            name: ToolId::SendConfirmation.name().into(),
            description: "Send the registration confirmation SMS to the guardian.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "to": { "type": "string", "description": "Guardian's mobile number" },
                    "message": { "type": "string" }
                },
                "required": ["to", "message"]
            }),
        }
    }

    async fn invoke(&self, ctx: &ToolContext, args: Value) -> Result<Value, RegistaError> {
        let (Some(to), Some(message)) = (arg_str(&args, "to"), arg_str(&args, "message")) else {
            return Ok(json!({ "sent": false, "reason": "both 'to' and 'message' are required" }));
        };

        let message_id = self.deps.sms.send(to, message).await?;
        self.deps
            .sessions
            .set_context(&ctx.session_id, CTX_CONFIRMATION_ID, &message_id);
        Ok(json!({ "sent": true, "correlation_id": message_id }))
    }
}
