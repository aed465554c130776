// src/cli/serve.rs — Run the API server and the notification processor

use std::time::Duration;

use crate::api::{self, ApiState};
use crate::cli::{build_runtime, queue_backoff};
use crate::infra::config::Config;
use crate::queue::processor::{Processor, ProcessorConfig};

pub async fn run_serve(config: &Config) -> anyhow::Result<()> {
    let runtime = build_runtime(config)?;

    let processor = Processor::new(
        runtime.queue.clone(),
        runtime.records.clone(),
        ProcessorConfig {
            poll_interval: Duration::from_secs(config.queue.poll_interval_seconds),
            max_retries: config.queue.max_retries,
            retention_days: config.queue.retention_days,
            stale_claim_seconds: config.queue.stale_claim_seconds,
            backoff: queue_backoff(config),
        },
    );
    tokio::spawn(processor.run());

    let state = ApiState {
        orchestrator: runtime.orchestrator,
        queue: runtime.queue,
        token: config.api.token.clone(),
        turn_timeout: Duration::from_secs(config.session.turn_timeout_seconds),
    };
    api::start_server(&config.api, state).await
}
