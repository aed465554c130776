// src/queue/processor.rs — Background delivery-status processor
//
// Periodically drains due notifications and writes their delivery metrics to
// the record store. Delivery is at-least-once: a crash between the remote
// write and `mark_processed` replays on the next pass, and the remote upsert
// absorbs the duplicate.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::{NotificationQueue, NotificationStatus};
use crate::infra::errors::RegistaError;
use crate::provider::retry::BackoffPolicy;
use crate::records::RecordStore;

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub poll_interval: Duration,
    pub max_retries: u32,
    pub retention_days: i64,
    pub stale_claim_seconds: i64,
    pub backoff: BackoffPolicy,
}

/// Outcome of one processing pass, for logging and the CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassSummary {
    pub claimed: usize,
    pub processed: usize,
    pub retried: usize,
    pub failed: usize,
    pub released: usize,
    pub cleaned: usize,
}

pub struct Processor {
    queue: Arc<NotificationQueue>,
    records: Arc<dyn RecordStore>,
    config: ProcessorConfig,
}

impl Processor {
    pub fn new(
        queue: Arc<NotificationQueue>,
        records: Arc<dyn RecordStore>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            queue,
            records,
            config,
        }
    }

    /// Poll until the process exits. Each pass is independent; a failing pass
    /// is logged and the next one starts on schedule.
    pub async fn run(self) {
        info!(
            poll_interval_s = self.config.poll_interval.as_secs(),
            "Notification processor started"
        );
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match self.run_once().await {
                Ok(summary) if summary.claimed > 0 || summary.cleaned > 0 => {
                    info!(
                        claimed = summary.claimed,
                        processed = summary.processed,
                        retried = summary.retried,
                        failed = summary.failed,
                        cleaned = summary.cleaned,
                        "Notification pass complete"
                    );
                }
                Ok(_) => debug!("Notification pass complete, nothing due"),
                Err(e) => error!("Notification pass aborted: {e}"),
            }
        }
    }

    /// One full pass: recover stale claims, drain due records, prune old
    /// terminal rows. A single record's failure is recorded and isolated;
    /// it never stops the rest of the batch.
    pub async fn run_once(&self) -> Result<PassSummary, RegistaError> {
        let now = Utc::now();
        let mut summary = PassSummary::default();

        summary.released = self
            .queue
            .release_stale(self.config.stale_claim_seconds, now)?;
        if summary.released > 0 {
            warn!(
                released = summary.released,
                "Released stale in-flight notifications"
            );
        }

        let due = self.queue.claim_due(now)?;
        summary.claimed = due.len();

        for record in due {
            match self
                .records
                .upsert_delivery_status(&record.correlation_id, &record.metrics)
                .await
            {
                Ok(()) => {
                    self.queue.mark_processed(record.id)?;
                    summary.processed += 1;
                }
                Err(e) => {
                    warn!(
                        id = record.id,
                        correlation_id = %record.correlation_id,
                        retry_count = record.retry_count,
                        "Delivery status write failed: {e}"
                    );
                    let status = self.queue.record_failure(
                        record.id,
                        &self.config.backoff,
                        self.config.max_retries,
                        Utc::now(),
                    )?;
                    match status {
                        NotificationStatus::Failed => {
                            error!(
                                id = record.id,
                                correlation_id = %record.correlation_id,
                                "Notification exhausted retries, parked as failed"
                            );
                            summary.failed += 1;
                        }
                        _ => summary.retried += 1,
                    }
                }
            }
        }

        let horizon = now - chrono::Duration::days(self.config.retention_days);
        summary.cleaned = self.queue.cleanup(horizon)?;

        Ok(summary)
    }
}
