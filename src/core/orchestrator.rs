// src/core/orchestrator.rs — Turn controller
//
// Drives the model-call / tool-call / resume loop for one user turn. Messages
// produced during the turn are staged locally and committed to the session
// store only when the turn completes, so a timeout or transport failure never
// leaves an unpaired tool-call message in history.

use std::sync::Arc;

use super::reply::FinalReply;
use crate::infra::errors::RegistaError;
use crate::provider::{ChatRequest, CompletionProvider, Message};
use crate::routine::{RoutineContext, RoutineTable, INITIAL_ROUTINE};
use crate::session::SessionStore;
use crate::tools::handlers::CTX_ROUTINE_ID;
use crate::tools::{execution::ToolExecution, ToolContext};

/// What the parent sees when a turn dies on a contract violation. Internal
/// detail goes to the log, never to the user.
const APOLOGY: &str =
    "Sorry, something went wrong on our side just then. Could you say that again?";

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub max_rounds: usize,
    pub club_name: String,
    pub season: String,
}

pub struct Orchestrator {
    provider: Arc<dyn CompletionProvider>,
    sessions: Arc<SessionStore>,
    routines: Arc<RoutineTable>,
    tools: Arc<dyn ToolExecution>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        sessions: Arc<SessionStore>,
        routines: Arc<RoutineTable>,
        tools: Arc<dyn ToolExecution>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            provider,
            sessions,
            routines,
            tools,
            config,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Run one conversational turn and return the user-visible reply.
    ///
    /// Transport errors surface as retryable `Err` with nothing committed;
    /// contract violations degrade to an apology with session continuity
    /// preserved. Tool handler failures never reach here — the execution
    /// strategy feeds them back into the conversation as structured payloads.
    pub async fn advance(
        &self,
        session_id: &str,
        user_input: &str,
    ) -> Result<String, RegistaError> {
        let history = self.sessions.history(session_id);
        let mut staged: Vec<Message> = vec![Message::user(user_input)];
        let tool_ctx = ToolContext {
            session_id: session_id.to_string(),
        };

        for round in 0..self.config.max_rounds {
            // Re-render each round: tool execution may have advanced the routine.
            let system = self.system_prompt(session_id)?;

            let mut messages = history.clone();
            messages.extend(staged.iter().cloned());

            let request = ChatRequest {
                model: self.config.model.clone(),
                messages,
                tools: self.tools.tool_defs(),
                max_tokens: Some(self.config.max_tokens),
                temperature: Some(self.config.temperature),
                system: Some(system),
            };

            let response = self.provider.chat(request).await?;

            if response.tool_calls.is_empty() {
                return Ok(self.finish_turn(session_id, staged, &response.content));
            }

            tracing::debug!(
                session = session_id,
                round,
                tool_calls = response.tool_calls.len(),
                "Dispatching tool calls"
            );

            // The assistant message must carry the tool_calls array so each
            // Role::Tool result can be correlated to its originating call.
            staged.push(Message::assistant_with_tool_calls(
                &response.content,
                response.tool_calls.clone(),
            ));
            for tc in &response.tool_calls {
                let result = self.tools.execute(&tool_ctx, tc).await;
                staged.push(Message::tool_result(&tc.id, &result));
            }
        }

        tracing::error!(
            session = session_id,
            max_rounds = self.config.max_rounds,
            "Turn exceeded tool round limit"
        );
        staged.push(Message::assistant(APOLOGY));
        self.sessions.append_all(session_id, staged);
        Ok(APOLOGY.to_string())
    }

    /// Parse the terminal content and commit the whole turn. A malformed
    /// reply is fatal for the turn but not for the session.
    fn finish_turn(&self, session_id: &str, mut staged: Vec<Message>, content: &str) -> String {
        match FinalReply::parse(content) {
            Ok(parsed) => {
                staged.push(Message::assistant(&parsed.reply));
                self.sessions.append_all(session_id, staged);
                parsed.reply
            }
            Err(e) => {
                tracing::error!(session = session_id, "Malformed final reply: {e}");
                staged.push(Message::assistant(APOLOGY));
                self.sessions.append_all(session_id, staged);
                APOLOGY.to_string()
            }
        }
    }

    /// System instructions: the active routine's rendered template plus the
    /// reply contract.
    fn system_prompt(&self, session_id: &str) -> Result<String, RegistaError> {
        let routine_id = self
            .sessions
            .get_context(session_id, CTX_ROUTINE_ID)
            .and_then(|s| s.parse().ok())
            .filter(|id| self.routines.is_valid(*id))
            .unwrap_or(INITIAL_ROUTINE);

        let ctx = RoutineContext {
            club_name: self.config.club_name.clone(),
            season: self.config.season.clone(),
            collected: self.sessions.context(session_id),
        };
        let instructions = self.routines.render(routine_id, &ctx)?;

        Ok(format!(
            "{instructions}\n\n\
             Use the provided tools for every validation and record operation; never invent \
             results. Call advance_routine when the current step is complete. When you are not \
             calling a tool, respond with exactly one JSON object of the form \
             {{\"reply\": \"<message to the parent>\"}} and nothing else."
        ))
    }
}
