// src/provider/openai.rs — OpenAI-compatible chat completions provider
//
// Works against any endpoint speaking the /chat/completions wire format
// with the tools/tool_calls extension.

use async_trait::async_trait;

use super::{
    ChatRequest, ChatResponse, CompletionProvider, Message, Role, StopReason, TokenUsage, ToolCall,
};
use crate::infra::config::ProviderConfig;
use crate::infra::errors::RegistaError;

pub struct OpenAiProvider {
    id_str: String,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            id_str: "openai".into(),
            api_key,
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// Construct from config, reading the API key from the configured env var.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, RegistaError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            RegistaError::Config(format!(
                "environment variable {} is not set",
                config.api_key_env
            ))
        })?;
        Ok(Self::new(api_key, config.base_url.clone()))
    }

    fn wire_message(m: &Message) -> serde_json::Value {
        let role = match m.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        let mut msg = serde_json::json!({ "role": role, "content": m.content });
        if let Some(ref id) = m.tool_call_id {
            msg["tool_call_id"] = serde_json::json!(id);
        }
        if !m.tool_calls.is_empty() {
            msg["tool_calls"] = serde_json::Value::Array(
                m.tool_calls
                    .iter()
                    .map(|tc| {
                        serde_json::json!({
                            "id": tc.id,
                            "type": "function",
                            "function": {
                                "name": tc.name,
                                "arguments": tc.arguments.to_string(),
                            }
                        })
                    })
                    .collect(),
            );
        }
        msg
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn id(&self) -> &str {
        &self.id_str
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, RegistaError> {
        let mut messages = Vec::new();
        if let Some(ref system) = request.system {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        for m in &request.messages {
            messages.push(Self::wire_message(m));
        }

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": messages,
        });
        if !request.tools.is_empty() {
            body["tools"] = serde_json::Value::Array(
                request
                    .tools
                    .iter()
                    .map(|t| {
                        serde_json::json!({
                            "type": "function",
                            "function": {
                                "name": t.name,
                                "description": t.description,
                                "parameters": t.parameters,
                            }
                        })
                    })
                    .collect(),
            );
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if let Some(temp) = request.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| RegistaError::Provider {
                provider: self.id_str.clone(),
                message: e.to_string(),
                retriable: e.is_timeout() || e.is_connect(),
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after_ms = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(0);
            return Err(RegistaError::RateLimited {
                provider: self.id_str.clone(),
                retry_after_ms,
            });
        }
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(RegistaError::Provider {
                provider: self.id_str.clone(),
                message: format!("HTTP {status}: {error_body}"),
                retriable: status.is_server_error(),
            });
        }

        let resp: serde_json::Value =
            response.json().await.map_err(|e| RegistaError::Provider {
                provider: self.id_str.clone(),
                message: e.to_string(),
                retriable: false,
            })?;

        let message = &resp["choices"][0]["message"];
        let content = message["content"].as_str().unwrap_or("").to_string();

        let tool_calls = parse_tool_calls(message);

        let stop_reason = match resp["choices"][0]["finish_reason"].as_str() {
            Some("stop") => StopReason::EndTurn,
            Some("length") => StopReason::MaxTokens,
            Some("tool_calls") => StopReason::ToolUse,
            _ => StopReason::Unknown,
        };

        let usage = TokenUsage {
            input_tokens: resp["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: resp["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
        };

        Ok(ChatResponse {
            content,
            tool_calls,
            usage,
            stop_reason,
        })
    }
}

/// Parse the tool_calls array from an assistant wire message.
/// Arguments arrive as a JSON-encoded string; invalid JSON becomes an empty
/// object so the handler can report a structured validation failure.
fn parse_tool_calls(message: &serde_json::Value) -> Vec<ToolCall> {
    let Some(calls) = message["tool_calls"].as_array() else {
        return Vec::new();
    };
    calls
        .iter()
        .filter_map(|tc| {
            let id = tc["id"].as_str()?.to_string();
            let name = tc["function"]["name"].as_str()?.to_string();
            let arguments = tc["function"]["arguments"]
                .as_str()
                .and_then(|s| serde_json::from_str(s).ok())
                .unwrap_or_else(|| serde_json::json!({}));
            Some(ToolCall {
                id,
                name,
                arguments,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tool_calls() {
        let message = serde_json::json!({
            "tool_calls": [{
                "id": "call_abc",
                "type": "function",
                "function": {
                    "name": "validate_registration_code",
                    "arguments": "{\"code\": \"200-tigers-u13-2526\"}"
                }
            }]
        });
        let calls = parse_tool_calls(&message);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "validate_registration_code");
        assert_eq!(calls[0].arguments["code"], "200-tigers-u13-2526");
    }

    #[test]
    fn test_parse_tool_calls_bad_arguments() {
        let message = serde_json::json!({
            "tool_calls": [{
                "id": "call_abc",
                "function": { "name": "lookup_team", "arguments": "not json" }
            }]
        });
        let calls = parse_tool_calls(&message);
        assert_eq!(calls.len(), 1);
        assert!(calls[0].arguments.as_object().unwrap().is_empty());
    }

    #[test]
    fn test_parse_tool_calls_absent() {
        let message = serde_json::json!({"content": "hello"});
        assert!(parse_tool_calls(&message).is_empty());
    }

    #[test]
    fn test_wire_message_tool_result() {
        let m = Message::tool_result("call_1", "{\"ok\":true}");
        let wire = OpenAiProvider::wire_message(&m);
        assert_eq!(wire["role"], "tool");
        assert_eq!(wire["tool_call_id"], "call_1");
    }
}
