// src/registration/validate.rs — Pure field validators
//
// Every validator returns a structured outcome so the conversation can
// reprompt with a reason. Nothing in this module touches I/O or panics.

use serde::Serialize;

/// Sentinel the payment provider uses for "collect on the final day of the
/// month" regardless of month length.
pub const LAST_DAY_OF_MONTH: i32 = -1;

/// Outcome of a pure validation: either fine, or a reason to reprompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Validation {
    Valid,
    Invalid { reason: String },
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }

    fn invalid(reason: impl Into<String>) -> Self {
        Validation::Invalid {
            reason: reason.into(),
        }
    }
}

/// A person name: at least two parts, letters with hyphen/apostrophe allowed,
/// sensible length. Deliberately permissive about accents.
pub fn validate_person_name(name: &str) -> Validation {
    let trimmed = name.trim();
    if trimmed.len() < 2 || trimmed.len() > 100 {
        return Validation::invalid("name must be between 2 and 100 characters");
    }
    let parts: Vec<&str> = trimmed.split_whitespace().collect();
    if parts.len() < 2 {
        return Validation::invalid("please give both a first name and a surname");
    }
    for part in &parts {
        let ok = part
            .chars()
            .all(|c| c.is_alphabetic() || c == '-' || c == '\'' || c == '.');
        if !ok {
            return Validation::invalid(format!("'{part}' contains characters not allowed in a name"));
        }
    }
    Validation::Valid
}

/// Loose postal-address sanity check: needs a number or house name plus a
/// street line, and something that looks like a UK postcode at the end.
pub fn validate_address(address: &str) -> Validation {
    let trimmed = address.trim();
    if trimmed.len() < 10 {
        return Validation::invalid("address looks too short to be complete");
    }
    let has_number = trimmed.chars().any(|c| c.is_ascii_digit());
    if !has_number {
        return Validation::invalid("address should include a house number or flat number");
    }
    if !looks_like_postcode_tail(trimmed) {
        return Validation::invalid("address should end with a postcode, e.g. 'GU1 4XA'");
    }
    Validation::Valid
}

/// Final one or two whitespace-separated tokens shaped like a UK postcode:
/// outward code (letters+digits) and inward code (digit then two letters).
fn looks_like_postcode_tail(address: &str) -> bool {
    let tokens: Vec<&str> = address.split_whitespace().collect();
    if tokens.len() < 2 {
        return false;
    }
    let inward = tokens[tokens.len() - 1];
    let outward = tokens[tokens.len() - 2];

    let inward_ok = inward.len() == 3
        && inward.chars().next().is_some_and(|c| c.is_ascii_digit())
        && inward.chars().skip(1).all(|c| c.is_ascii_alphabetic());

    let outward_ok = (2..=4).contains(&outward.len())
        && outward.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && outward.chars().all(|c| c.is_ascii_alphanumeric());

    inward_ok && outward_ok
}

/// Normalize a payment-day selection for the payment provider.
///
/// Days 1–28 pass through unchanged. Days 29–31 become the last-day-of-month
/// sentinel so collection never fails in short months. The sentinel itself is
/// idempotent. Anything else is rejected.
pub fn normalize_payment_day(day: i32) -> Result<i32, String> {
    match day {
        LAST_DAY_OF_MONTH => Ok(LAST_DAY_OF_MONTH),
        1..=28 => Ok(day),
        29..=31 => Ok(LAST_DAY_OF_MONTH),
        other => Err(format!("'{other}' is not a day of the month")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_person_name_valid() {
        assert!(validate_person_name("John Smith").is_valid());
        assert!(validate_person_name("Anne-Marie O'Connor").is_valid());
    }

    #[test]
    fn test_person_name_needs_two_parts() {
        assert!(!validate_person_name("Cher").is_valid());
    }

    #[test]
    fn test_person_name_rejects_digits() {
        assert!(!validate_person_name("John Sm1th").is_valid());
    }

    #[test]
    fn test_address_valid() {
        assert!(validate_address("14 Meadow Lane, Guildford, GU1 4XA").is_valid());
    }

    #[test]
    fn test_address_needs_number() {
        assert!(!validate_address("Meadow Lane, Guildford, GUX XAXA").is_valid());
    }

    #[test]
    fn test_address_needs_postcode() {
        assert!(!validate_address("14 Meadow Lane, Guildford").is_valid());
    }

    #[test]
    fn test_payment_day_passthrough() {
        for d in 1..=28 {
            assert_eq!(normalize_payment_day(d), Ok(d));
        }
    }

    #[test]
    fn test_payment_day_late_days_become_sentinel() {
        for d in 29..=31 {
            assert_eq!(normalize_payment_day(d), Ok(LAST_DAY_OF_MONTH));
        }
    }

    #[test]
    fn test_payment_day_sentinel_idempotent() {
        assert_eq!(
            normalize_payment_day(LAST_DAY_OF_MONTH),
            Ok(LAST_DAY_OF_MONTH)
        );
    }

    #[test]
    fn test_payment_day_out_of_range_rejected() {
        assert!(normalize_payment_day(0).is_err());
        assert!(normalize_payment_day(32).is_err());
        assert!(normalize_payment_day(-2).is_err());
    }
}
