// src/cli/queue.rs — One-shot queue maintenance commands

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::cli::{open_queue, queue_backoff, QueueAction};
use crate::infra::config::Config;
use crate::queue::processor::{Processor, ProcessorConfig};
use crate::records::http::HttpRecordStore;

pub async fn run_queue(config: &Config, action: QueueAction) -> anyhow::Result<()> {
    let queue = Arc::new(open_queue(config)?);

    match action {
        QueueAction::Process => {
            let records = Arc::new(HttpRecordStore::from_config(&config.records)?);
            let processor = Processor::new(
                queue,
                records,
                ProcessorConfig {
                    poll_interval: Duration::from_secs(config.queue.poll_interval_seconds),
                    max_retries: config.queue.max_retries,
                    retention_days: config.queue.retention_days,
                    stale_claim_seconds: config.queue.stale_claim_seconds,
                    backoff: queue_backoff(config),
                },
            );
            let summary = processor.run_once().await?;
            println!(
                "claimed {} | processed {} | retried {} | failed {} | cleaned {}",
                summary.claimed, summary.processed, summary.retried, summary.failed, summary.cleaned,
            );
        }
        QueueAction::Cleanup => {
            let horizon = Utc::now() - chrono::Duration::days(config.queue.retention_days);
            let removed = queue.cleanup(horizon)?;
            println!("removed {removed} record(s)");
        }
        QueueAction::Status => {
            let counts = queue.counts()?;
            println!("pending   {}", counts.pending);
            println!("inflight  {}", counts.inflight);
            println!("processed {}", counts.processed);
            println!("failed    {}", counts.failed);
        }
    }

    Ok(())
}
