// src/routine/medical.rs — Medical-condition handling inside routine 8
//
// Serious conditions need three follow-up captures before the routine may
// advance; minor conditions are recorded verbatim with no follow-up. The
// differential depth is a branch inside one routine, not a separate routine.

use serde::{Deserialize, Serialize};

/// Lowercase substrings that mark a condition as serious. Anything matching
/// one of these requires the full follow-up capture.
const SERIOUS_TRIGGERS: &[&str] = &[
    "anaphyla",
    "epipen",
    "epi-pen",
    "asthma",
    "inhaler",
    "diabet",
    "insulin",
    "epilep",
    "seizure",
    "severe allergy",
    "severe nut",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MedicalSeverity {
    Serious,
    Minor,
    None,
}

/// The three follow-up captures a serious condition requires.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicalFollowUp {
    /// Where medication/equipment is kept (e.g. "EpiPen in front kit pocket").
    pub medication_location: Option<String>,
    /// What to do in an emergency.
    pub emergency_action: Option<String>,
    /// Specific triggers to avoid.
    pub triggers: Option<String>,
}

impl MedicalFollowUp {
    pub fn is_complete(&self) -> bool {
        fn filled(field: &Option<String>) -> bool {
            field.as_deref().is_some_and(|s| !s.trim().is_empty())
        }
        filled(&self.medication_location)
            && filled(&self.emergency_action)
            && filled(&self.triggers)
    }

    /// Names of the follow-up fields still missing, for the reprompt.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.medication_location.as_deref().map_or(true, |s| s.trim().is_empty()) {
            missing.push("medication_location");
        }
        if self.emergency_action.as_deref().map_or(true, |s| s.trim().is_empty()) {
            missing.push("emergency_action");
        }
        if self.triggers.as_deref().map_or(true, |s| s.trim().is_empty()) {
            missing.push("triggers");
        }
        missing
    }
}

/// Classify free-text medical conditions by severity.
pub fn classify_condition(text: &str) -> MedicalSeverity {
    let lowered = text.trim().to_lowercase();
    if lowered.is_empty()
        || matches!(lowered.as_str(), "none" | "no" | "n/a" | "nothing" | "no conditions")
    {
        return MedicalSeverity::None;
    }
    if SERIOUS_TRIGGERS.iter().any(|t| lowered.contains(t)) {
        return MedicalSeverity::Serious;
    }
    MedicalSeverity::Minor
}

/// Whether the medical routine may advance given what has been captured.
pub fn capture_complete(severity: MedicalSeverity, follow_up: &MedicalFollowUp) -> bool {
    match severity {
        MedicalSeverity::Serious => follow_up.is_complete(),
        MedicalSeverity::Minor | MedicalSeverity::None => true,
    }
}
