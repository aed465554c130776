// src/routine/mod.rs — Registration routine state machine
//
// An ordered catalog of conversational steps. Each routine carries an
// instructional template (minijinja) rendered into the system prompt, and a
// transition rule. The table is validated at construction: every transition
// target must exist.

pub mod medical;
pub mod transitions;

use std::collections::HashMap;

use minijinja::Environment;

use crate::infra::errors::RegistaError;
use crate::registration::CodePrefix;
pub use transitions::{Branch, TransitionRule};

pub type RoutineId = u8;

/// The entry routine for a fresh session.
pub const INITIAL_ROUTINE: RoutineId = 1;

pub struct Routine {
    pub id: RoutineId,
    pub name: &'static str,
    pub rule: TransitionRule,
    template: &'static str,
}

pub struct RoutineTable {
    routines: HashMap<RoutineId, Routine>,
    env: Environment<'static>,
}

/// Template context shared by every routine instruction.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RoutineContext {
    pub club_name: String,
    pub season: String,
    /// Session context map (registration_code, player_name, address, ...).
    pub collected: HashMap<String, String>,
}

impl RoutineTable {
    pub fn new() -> Result<Self, RegistaError> {
        let routines = catalog();
        let mut by_id: HashMap<RoutineId, Routine> = HashMap::new();
        for routine in routines {
            if by_id.insert(routine.id, routine).is_some() {
                return Err(RegistaError::Config(format!(
                    "duplicate routine id {}",
                    by_id.len()
                )));
            }
        }

        // Every transition target must exist in the table.
        for routine in by_id.values() {
            for target in routine.rule.targets() {
                if !by_id.contains_key(&target) {
                    return Err(RegistaError::Config(format!(
                        "routine {} ({}) references unknown routine {}",
                        routine.id, routine.name, target
                    )));
                }
            }
        }

        let mut env = Environment::new();
        for routine in by_id.values() {
            env.add_template(routine.name, routine.template)
                .map_err(|e| RegistaError::Config(format!("routine template {}: {e}", routine.name)))?;
        }

        Ok(Self {
            routines: by_id,
            env,
        })
    }

    pub fn get(&self, id: RoutineId) -> Option<&Routine> {
        self.routines.get(&id)
    }

    pub fn is_valid(&self, id: RoutineId) -> bool {
        self.routines.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.routines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }

    /// Render a routine's instruction template.
    pub fn render(&self, id: RoutineId, ctx: &RoutineContext) -> Result<String, RegistaError> {
        let routine = self
            .routines
            .get(&id)
            .ok_or_else(|| RegistaError::Config(format!("unknown routine id {id}")))?;
        let template = self
            .env
            .get_template(routine.name)
            .map_err(|e| RegistaError::Config(e.to_string()))?;
        template
            .render(ctx)
            .map_err(|e| RegistaError::Config(format!("rendering routine {id}: {e}")))
    }

    /// Classified transition. Unconditional rules advance regardless of the
    /// branch; terminal routines stay put.
    pub fn transition(&self, current: RoutineId, branch: Branch) -> RoutineId {
        let Some(routine) = self.routines.get(&current) else {
            return INITIAL_ROUTINE;
        };
        match routine.rule {
            TransitionRule::Next(next) => next,
            TransitionRule::Classified {
                affirmative,
                negative,
                indeterminate,
            } => match branch {
                Branch::Affirmative => affirmative,
                Branch::Negative => negative,
                Branch::Indeterminate => indeterminate,
            },
            TransitionRule::Terminal => current,
        }
    }

    /// Data-dependent routing out of the code-capture routine: returning
    /// players (prefix 100) confirm existing details, new players (200) start
    /// from scratch.
    pub fn next_after_code(&self, prefix: CodePrefix) -> RoutineId {
        match prefix {
            CodePrefix::ReRegistration => 2,
            CodePrefix::NewRegistration => 3,
        }
    }
}

/// The registration flow. Ids are stable; templates address the assistant, not
/// the parent — they are system-prompt instructions for the active step.
fn catalog() -> Vec<Routine> {
    vec![
        Routine {
            id: 1,
            name: "collect_code",
            rule: TransitionRule::Next(2),
            template: "You are the registration assistant for {{ club_name }}, season {{ season }}. \
                Greet the parent or guardian warmly and ask for their registration code. \
                When they provide one, call validate_registration_code before anything else. \
                If the code is invalid, explain the reason in plain language and ask them to \
                check the letter or email from the club. Never guess a code.",
        },
        Routine {
            id: 2,
            name: "returning_player",
            rule: TransitionRule::Next(4),
            template: "The code {{ collected.registration_code }} belongs to a returning player. \
                Call lookup_player with the player slug from the code to fetch last season's \
                record, then read the player's name and team back to the parent and ask them to \
                confirm the details are still correct. Capture any corrections.",
        },
        Routine {
            id: 3,
            name: "new_player",
            rule: TransitionRule::Next(4),
            template: "This is a new registration for team {{ collected.team }} \
                ({{ collected.age_group }}). Ask for the player's full name and date of birth. \
                Validate the name with validate_person_name and reprompt politely if it is \
                rejected.",
        },
        Routine {
            id: 4,
            name: "guardian_details",
            rule: TransitionRule::Next(5),
            template: "Ask for the main parent or guardian's full name, mobile number and email \
                address. Validate the name with validate_person_name.",
        },
        Routine {
            id: 5,
            name: "address_capture",
            rule: TransitionRule::Next(6),
            template: "Ask for the household address including postcode. Validate it with \
                validate_address; if rejected, say what was missing and ask again.",
        },
        Routine {
            id: 6,
            name: "same_address_question",
            rule: TransitionRule::Classified {
                affirmative: 8,
                negative: 7,
                indeterminate: 11,
            },
            template: "Ask whether the second parent or guardian (if there is one) lives at the \
                same address. Classify the answer strictly as affirmative, negative or unclear. \
                If there is no second guardian, treat it as affirmative.",
        },
        Routine {
            id: 7,
            name: "second_address_capture",
            rule: TransitionRule::Next(8),
            template: "Ask for the second parent or guardian's address including postcode and \
                validate it with validate_address.",
        },
        Routine {
            id: 8,
            name: "medical_conditions",
            rule: TransitionRule::Next(9),
            template: "Ask whether the player has any medical conditions the coaches should know \
                about. Record the answer with record_medical_conditions. For serious conditions \
                (anaphylaxis, asthma, diabetes, epilepsy and similar) you must also capture where \
                medication or equipment is kept, what to do in an emergency, and the specific \
                triggers — the tool will tell you which of the three are still missing. Minor \
                conditions are recorded as given, with no follow-up questions.",
        },
        Routine {
            id: 9,
            name: "payment_day",
            rule: TransitionRule::Next(10),
            template: "Ask which day of the month the monthly subscription should be collected. \
                Set it with set_payment_day. Days 29 to 31 are collected on the last day of the \
                month; mention this if the parent picks one of them.",
        },
        Routine {
            id: 10,
            name: "confirm_and_save",
            rule: TransitionRule::Terminal,
            template: "Summarize everything collected for {{ club_name }}: player, guardian(s), \
                address(es), medical notes and payment day. When the parent confirms, call \
                save_registrant and then send_confirmation. Thank them and let them know the \
                confirmation message is on its way.",
        },
        Routine {
            id: 11,
            name: "same_address_clarify",
            rule: TransitionRule::Classified {
                affirmative: 8,
                negative: 7,
                indeterminate: 11,
            },
            template: "The previous answer about the second guardian's address was unclear. \
                Apologize briefly and ask again as a simple yes/no question: does the second \
                parent or guardian live at the same address as the player?",
        },
    ]
}
