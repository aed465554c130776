// src/core/mod.rs

pub mod orchestrator;
pub mod reply;

pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use reply::FinalReply;
