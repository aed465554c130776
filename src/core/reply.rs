// src/core/reply.rs — Structured final-reply schema
//
// The terminal model response must be a JSON object with exactly one required
// field holding the user-visible text. Extra fields are rejected: an
// undeclared field usually means the model leaked internal state into the
// reply contract.

use serde::Deserialize;

use crate::infra::errors::RegistaError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FinalReply {
    pub reply: String,
}

impl FinalReply {
    /// Parse terminal content. Accepts a bare JSON object or one wrapped in a
    /// markdown code fence; anything else is a contract violation.
    pub fn parse(content: &str) -> Result<Self, RegistaError> {
        let candidate = strip_code_fence(content.trim());
        let reply: FinalReply = serde_json::from_str(candidate)
            .map_err(|e| RegistaError::MalformedReply(e.to_string()))?;
        if reply.reply.trim().is_empty() {
            return Err(RegistaError::MalformedReply("reply text is empty".into()));
        }
        Ok(reply)
    }
}

/// Strip a ```json ... ``` (or bare ```) fence if the whole content is fenced.
fn strip_code_fence(content: &str) -> &str {
    let Some(rest) = content.strip_prefix("```") else {
        return content;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches(['\r', '\n']);
    rest.strip_suffix("```").map(str::trim).unwrap_or(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_bare_json() {
        let r = FinalReply::parse(r#"{"reply": "Welcome to the club!"}"#).unwrap();
        assert_eq!(r.reply, "Welcome to the club!");
    }

    #[test]
    fn test_parse_fenced_json() {
        let content = "```json\n{\"reply\": \"All done.\"}\n```";
        assert_eq!(FinalReply::parse(content).unwrap().reply, "All done.");
    }

    #[test]
    fn test_extra_fields_rejected() {
        let result = FinalReply::parse(r#"{"reply": "hi", "debug": "internal"}"#);
        assert!(matches!(result, Err(RegistaError::MalformedReply(_))));
    }

    #[test]
    fn test_missing_field_rejected() {
        assert!(FinalReply::parse(r#"{"text": "hi"}"#).is_err());
    }

    #[test]
    fn test_plain_text_rejected() {
        assert!(FinalReply::parse("Hello there!").is_err());
    }

    #[test]
    fn test_empty_reply_rejected() {
        assert!(FinalReply::parse(r#"{"reply": "   "}"#).is_err());
    }
}
