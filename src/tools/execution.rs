// src/tools/execution.rs — Tool execution strategies
//
// One agent configuration picks one strategy: either tool calls run against
// the in-process registry, or they are forwarded to a remote executor. Call
// sites never branch on a mode flag.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::{ToolContext, ToolId, ToolRegistry};
use crate::infra::config::ToolsConfig;
use crate::infra::errors::RegistaError;
use crate::provider::{ToolCall, ToolDef};

/// Executes a single tool call and returns the serialized result text that is
/// re-injected into the conversation. Handler-internal failures are converted
/// to a structured error payload here, never raised to the orchestrator.
#[async_trait]
pub trait ToolExecution: Send + Sync {
    fn tool_defs(&self) -> Vec<ToolDef>;

    async fn execute(&self, ctx: &ToolContext, call: &ToolCall) -> String;
}

/// Resolve the strategy named in config. Unknown modes are a startup error.
pub fn from_config(
    config: &ToolsConfig,
    registry: ToolRegistry,
) -> Result<Arc<dyn ToolExecution>, RegistaError> {
    match config.execution.as_str() {
        "local" => Ok(Arc::new(LocalToolExecution::new(registry))),
        "remote" => {
            let url = config.executor_url.clone().ok_or_else(|| {
                RegistaError::Config("tools.execution = \"remote\" requires tools.executor_url".into())
            })?;
            Ok(Arc::new(RemoteToolExecution::new(url, registry.tool_defs())))
        }
        other => Err(RegistaError::Config(format!(
            "unknown tools.execution mode '{other}' (expected 'local' or 'remote')"
        ))),
    }
}

fn error_payload(tool: &str, message: impl std::fmt::Display) -> String {
    json!({
        "error": message.to_string(),
        "tool": tool,
        "hint": "tell the user there was a temporary problem and offer to try again",
    })
    .to_string()
}

/// Runs handlers in-process against the closed registry.
pub struct LocalToolExecution {
    registry: ToolRegistry,
}

impl LocalToolExecution {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ToolExecution for LocalToolExecution {
    fn tool_defs(&self) -> Vec<ToolDef> {
        self.registry.tool_defs()
    }

    async fn execute(&self, ctx: &ToolContext, call: &ToolCall) -> String {
        let id = match ToolId::from_name(&call.name) {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(tool = %call.name, "Model requested unregistered tool");
                return error_payload(&call.name, e);
            }
        };
        match self.registry.get(id).invoke(ctx, call.arguments.clone()).await {
            Ok(result) => result.to_string(),
            Err(e) => {
                tracing::warn!(tool = %call.name, "Tool handler failed: {e}");
                error_payload(&call.name, e)
            }
        }
    }
}

/// Forwards tool calls to an external executor over HTTP. The advertised
/// schemas still come from the local registry so both modes offer the model
/// the same contract.
pub struct RemoteToolExecution {
    url: String,
    defs: Vec<ToolDef>,
    client: reqwest::Client,
}

impl RemoteToolExecution {
    pub fn new(url: String, defs: Vec<ToolDef>) -> Self {
        Self {
            url,
            defs,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ToolExecution for RemoteToolExecution {
    fn tool_defs(&self) -> Vec<ToolDef> {
        self.defs.clone()
    }

    async fn execute(&self, ctx: &ToolContext, call: &ToolCall) -> String {
        let body = json!({
            "session_id": ctx.session_id,
            "tool": call.name,
            "arguments": call.arguments,
        });
        let response = self.client.post(&self.url).json(&body).send().await;
        match response {
            Ok(resp) if resp.status().is_success() => {
                resp.text().await.unwrap_or_else(|e| error_payload(&call.name, e))
            }
            Ok(resp) => {
                let status = resp.status();
                tracing::warn!(tool = %call.name, %status, "Remote executor rejected tool call");
                error_payload(&call.name, format!("remote executor returned HTTP {status}"))
            }
            Err(e) => {
                tracing::warn!(tool = %call.name, "Remote executor unreachable: {e}");
                error_payload(&call.name, e)
            }
        }
    }
}
