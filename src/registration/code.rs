// src/registration/code.rs — Registration code grammar
//
// Format: <prefix>-<team>-<age_group>-<season>[-<player-name-slug>]
//   100-tigers-u13-2526-john-smith   (re-registration, slug required)
//   200-tigers-u13-2526              (new registration, slug forbidden)

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodePrefix {
    /// 100 — returning player, code carries the player-name slug.
    ReRegistration,
    /// 200 — new player, no slug.
    NewRegistration,
}

impl CodePrefix {
    pub fn as_number(&self) -> u16 {
        match self {
            CodePrefix::ReRegistration => 100,
            CodePrefix::NewRegistration => 200,
        }
    }
}

/// Why a code string was rejected. Callers turn this into a conversational
/// reprompt; it is never surfaced raw to the end user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodeError {
    #[error("expected 4 or 5 dash-separated parts, found {0}")]
    WrongShape(usize),
    #[error("prefix '{0}' is not 100 or 200")]
    BadPrefix(String),
    #[error("team '{0}' must be letters only")]
    BadTeam(String),
    #[error("age group '{0}' must be 'u' followed by digits")]
    BadAgeGroup(String),
    #[error("season '{0}' must be 4 digits")]
    BadSeason(String),
    #[error("season '{found}' does not match the active season '{expected}'")]
    WrongSeason { found: String, expected: String },
    #[error("re-registration codes (100) require a player name slug")]
    MissingSlug,
    #[error("new registration codes (200) must not carry a player name slug")]
    UnexpectedSlug,
    #[error("player name slug '{0}' must be lowercase letters and hyphens")]
    BadSlug(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationCode {
    pub prefix: CodePrefix,
    pub team: String,
    pub age_group: String,
    pub season: String,
    pub player_slug: Option<String>,
}

impl RegistrationCode {
    /// Parse a code against the configured active season. Any deviation from
    /// the grammar yields a `CodeError`, never a panic.
    pub fn parse(input: &str, active_season: &str) -> Result<Self, CodeError> {
        let trimmed = input.trim();
        // Slug may itself contain hyphens, so cap the split at five parts.
        let parts: Vec<&str> = trimmed.splitn(5, '-').collect();
        if parts.len() < 4 {
            return Err(CodeError::WrongShape(parts.len()));
        }

        let prefix = match parts[0] {
            "100" => CodePrefix::ReRegistration,
            "200" => CodePrefix::NewRegistration,
            other => return Err(CodeError::BadPrefix(other.to_string())),
        };

        let team = parts[1];
        if team.is_empty() || !team.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CodeError::BadTeam(team.to_string()));
        }

        let age_group = parts[2];
        let valid_age = age_group
            .strip_prefix('u')
            .map(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false);
        if !valid_age {
            return Err(CodeError::BadAgeGroup(age_group.to_string()));
        }

        let season = parts[3];
        if season.len() != 4 || !season.chars().all(|c| c.is_ascii_digit()) {
            return Err(CodeError::BadSeason(season.to_string()));
        }
        if season != active_season {
            return Err(CodeError::WrongSeason {
                found: season.to_string(),
                expected: active_season.to_string(),
            });
        }

        let player_slug = match (prefix, parts.get(4)) {
            (CodePrefix::ReRegistration, None) => return Err(CodeError::MissingSlug),
            (CodePrefix::NewRegistration, Some(_)) => return Err(CodeError::UnexpectedSlug),
            (CodePrefix::ReRegistration, Some(slug)) => {
                let ok = !slug.is_empty()
                    && !slug.starts_with('-')
                    && !slug.ends_with('-')
                    && slug
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c == '-');
                if !ok {
                    return Err(CodeError::BadSlug(slug.to_string()));
                }
                Some(slug.to_string())
            }
            (CodePrefix::NewRegistration, None) => None,
        };

        Ok(Self {
            prefix,
            team: team.to_lowercase(),
            age_group: age_group.to_string(),
            season: season.to_string(),
            player_slug,
        })
    }

    /// Slugify a player's display name the way re-registration codes carry it.
    pub fn slug_for_name(name: &str) -> String {
        slug::slugify(name)
    }
}

impl fmt::Display for RegistrationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}",
            self.prefix.as_number(),
            self.team,
            self.age_group,
            self.season
        )?;
        if let Some(ref slug) = self.player_slug {
            write!(f, "-{slug}")?;
        }
        Ok(())
    }
}
