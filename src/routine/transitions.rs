// src/routine/transitions.rs — Branch classification and transition rules

use serde::{Deserialize, Serialize};

use super::RoutineId;

/// Outcome of classifying a yes/no conversational answer.
///
/// The completion service does the classification and reports a label; this
/// code only maps labels onto the three branches. Anything it does not
/// recognize is `Indeterminate`, which always routes to a clarification
/// routine — the state machine never guesses an answer it cannot classify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    Affirmative,
    Negative,
    Indeterminate,
}

impl Branch {
    /// Map a model-reported classification label onto a branch. The label set
    /// is a policy seam: unrecognized labels degrade to Indeterminate.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "affirmative" | "yes" => Branch::Affirmative,
            "negative" | "no" => Branch::Negative,
            _ => Branch::Indeterminate,
        }
    }
}

/// How a routine decides its successor. `Branch` rules must be total over the
/// three branch values, which the struct shape enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionRule {
    /// Unconditional successor once the routine's captures are complete.
    Next(RoutineId),
    /// Three-way classified branch.
    Classified {
        affirmative: RoutineId,
        negative: RoutineId,
        indeterminate: RoutineId,
    },
    /// End of the registration flow.
    Terminal,
}

impl TransitionRule {
    /// All routine ids this rule can reach (used for construction-time
    /// validation that every target exists).
    pub fn targets(&self) -> Vec<RoutineId> {
        match *self {
            TransitionRule::Next(id) => vec![id],
            TransitionRule::Classified {
                affirmative,
                negative,
                indeterminate,
            } => vec![affirmative, negative, indeterminate],
            TransitionRule::Terminal => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_labels() {
        assert_eq!(Branch::from_label("affirmative"), Branch::Affirmative);
        assert_eq!(Branch::from_label("YES"), Branch::Affirmative);
        assert_eq!(Branch::from_label("no"), Branch::Negative);
        assert_eq!(Branch::from_label("unclear"), Branch::Indeterminate);
        assert_eq!(Branch::from_label("maybe??"), Branch::Indeterminate);
        assert_eq!(Branch::from_label(""), Branch::Indeterminate);
    }

    #[test]
    fn test_rule_targets() {
        assert_eq!(TransitionRule::Next(4).targets(), vec![4]);
        assert!(TransitionRule::Terminal.targets().is_empty());
        let rule = TransitionRule::Classified {
            affirmative: 8,
            negative: 7,
            indeterminate: 11,
        };
        assert_eq!(rule.targets(), vec![8, 7, 11]);
    }
}
