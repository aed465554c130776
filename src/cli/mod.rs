// src/cli/mod.rs — CLI definition (clap derive)

pub mod chat;
pub mod queue;
pub mod serve;

use std::path::Path;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::core::{Orchestrator, OrchestratorConfig};
use crate::infra::config::Config;
use crate::infra::paths;
use crate::provider::openai::OpenAiProvider;
use crate::provider::retry::{BackoffPolicy, RetryProvider};
use crate::queue::NotificationQueue;
use crate::records::http::HttpRecordStore;
use crate::records::RecordStore;
use crate::routine::RoutineTable;
use crate::session::SessionStore;
use crate::tools::execution;
use crate::tools::handlers::{standard_registry, ToolDeps};
use crate::tools::sms::HttpSmsGateway;

#[derive(Parser)]
#[command(name = "regista", about = "Conversational club registration assistant", version)]
pub struct Cli {
    /// Config file path
    #[arg(long)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API and the background notification processor
    Serve,
    /// Interactive chat session on stdin/stdout
    Chat {
        /// Session id to resume; a fresh one is used when omitted
        #[arg(long)]
        session: Option<String>,
    },
    /// Notification queue maintenance
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
}

#[derive(Subcommand, Clone)]
pub enum QueueAction {
    /// Run a single processing pass and exit
    Process,
    /// Remove processed and failed records past the retention horizon
    Cleanup,
    /// Show record counts by status
    Status,
}

/// Everything the serve and chat paths share: one wired orchestrator plus the
/// queue and record store behind it.
pub struct Runtime {
    pub orchestrator: Arc<Orchestrator>,
    pub queue: Arc<NotificationQueue>,
    pub records: Arc<dyn RecordStore>,
}

/// Wire the full stack from config. Fails fast on missing credentials or a
/// misconfigured execution mode.
pub fn build_runtime(config: &Config) -> anyhow::Result<Runtime> {
    let provider = Arc::new(RetryProvider::new(Arc::new(OpenAiProvider::from_config(
        &config.provider,
    )?)));
    let sessions = Arc::new(SessionStore::new(config.session.max_history));
    let routines = Arc::new(RoutineTable::new()?);
    let records: Arc<dyn RecordStore> = Arc::new(HttpRecordStore::from_config(&config.records)?);
    let sms = Arc::new(HttpSmsGateway::from_config(&config.sms));

    let deps = Arc::new(ToolDeps {
        sessions: sessions.clone(),
        records: records.clone(),
        routines: routines.clone(),
        sms,
        club_name: config.club.name.clone(),
        season: config.club.season.clone(),
    });
    let registry = standard_registry(deps)?;
    let tools = execution::from_config(&config.tools, registry)?;

    let orchestrator = Orchestrator::new(
        provider,
        sessions,
        routines,
        tools,
        OrchestratorConfig {
            model: config.provider.model.clone(),
            max_tokens: config.provider.max_tokens,
            temperature: config.provider.temperature,
            max_rounds: config.tools.max_rounds,
            club_name: config.club.name.clone(),
            season: config.club.season.clone(),
        },
    );

    Ok(Runtime {
        orchestrator: Arc::new(orchestrator),
        queue: Arc::new(open_queue(config)?),
        records,
    })
}

/// Open the notification queue at the configured path, or the default data
/// dir when unset.
pub fn open_queue(config: &Config) -> anyhow::Result<NotificationQueue> {
    let path = if config.queue.db_path.is_empty() {
        paths::queue_db_path()
    } else {
        Path::new(&config.queue.db_path).to_path_buf()
    };
    Ok(NotificationQueue::open(&path)?)
}

/// The queue's retry spacing from config. No jitter: the schedule is visible
/// in the database and should be predictable.
pub fn queue_backoff(config: &Config) -> BackoffPolicy {
    BackoffPolicy::new(
        std::time::Duration::from_millis(config.queue.backoff_initial_ms),
        config.queue.backoff_factor,
        std::time::Duration::from_millis(config.queue.backoff_max_ms),
    )
}
