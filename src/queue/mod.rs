// src/queue/mod.rs — Durable delivery-confirmation queue
//
// Decouples the fast webhook path from slow, retryable delivery-status writes
// to the record store. Records are claimed with an optimistic compare-and-set
// on the status column, so two processor passes can never double-send the
// same confirmation.

pub mod processor;
pub mod schema;

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::infra::errors::RegistaError;
use crate::provider::retry::BackoffPolicy;

/// Lifecycle of a notification record.
///
/// pending → processed (terminal, exactly once)
/// pending → pending with retry_count+1 (failure below the ceiling)
/// pending → failed (terminal, failure at the ceiling)
///
/// `inflight` is the transient claimed state between those edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Inflight,
    Processed,
    Failed,
}

impl NotificationStatus {
    fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Inflight => "inflight",
            NotificationStatus::Processed => "processed",
            NotificationStatus::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "inflight" => NotificationStatus::Inflight,
            "processed" => NotificationStatus::Processed,
            "failed" => NotificationStatus::Failed,
            _ => NotificationStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationRecord {
    pub id: i64,
    pub correlation_id: String,
    pub metrics: serde_json::Value,
    pub retry_count: u32,
    pub status: NotificationStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct QueueCounts {
    pub pending: u64,
    pub inflight: u64,
    pub processed: u64,
    pub failed: u64,
}

pub struct NotificationQueue {
    conn: Mutex<Connection>,
}

impl NotificationQueue {
    pub fn open(path: &Path) -> Result<Self, RegistaError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        schema::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, RegistaError> {
        let conn = Connection::open_in_memory()?;
        schema::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Persist a record before returning. A write failure propagates to the
    /// caller — the webhook path has no other durability guarantee.
    pub fn enqueue(
        &self,
        correlation_id: &str,
        metrics: &serde_json::Value,
    ) -> Result<i64, RegistaError> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO notifications (correlation_id, metrics, status, created_at, next_attempt_at)
             VALUES (?1, ?2, 'pending', ?3, ?3)",
            params![correlation_id, metrics.to_string(), now],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Claim every pending record due at `now`. Each claim is a
    /// compare-and-set; a record that loses the race to a concurrent pass is
    /// skipped.
    pub fn claim_due(&self, now: DateTime<Utc>) -> Result<Vec<NotificationRecord>, RegistaError> {
        let now_str = now.to_rfc3339();
        let conn = self.conn.lock().unwrap();

        let ids: Vec<i64> = {
            let mut stmt = conn.prepare(
                "SELECT id FROM notifications
                 WHERE status = 'pending' AND next_attempt_at <= ?1
                 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![now_str], |r| r.get(0))?;
            rows.collect::<Result<_, _>>()?
        };

        let mut claimed = Vec::new();
        for id in ids {
            let updated = conn.execute(
                "UPDATE notifications SET status = 'inflight', claimed_at = ?1
                 WHERE id = ?2 AND status = 'pending'",
                params![now_str, id],
            )?;
            if updated == 0 {
                continue; // another pass got there first
            }
            if let Some(record) = Self::fetch(&conn, id)? {
                claimed.push(record);
            }
        }
        Ok(claimed)
    }

    fn fetch(conn: &Connection, id: i64) -> Result<Option<NotificationRecord>, RegistaError> {
        let record = conn
            .query_row(
                "SELECT id, correlation_id, metrics, retry_count, status, created_at
                 FROM notifications WHERE id = ?1",
                params![id],
                |row| {
                    let metrics_raw: String = row.get(2)?;
                    let status_raw: String = row.get(4)?;
                    let created_raw: String = row.get(5)?;
                    Ok(NotificationRecord {
                        id: row.get(0)?,
                        correlation_id: row.get(1)?,
                        metrics: serde_json::from_str(&metrics_raw)
                            .unwrap_or(serde_json::Value::Null),
                        retry_count: row.get(3)?,
                        status: NotificationStatus::parse(&status_raw),
                        created_at: created_raw
                            .parse()
                            .unwrap_or_else(|_| Utc::now()),
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    pub fn get(&self, id: i64) -> Result<Option<NotificationRecord>, RegistaError> {
        let conn = self.conn.lock().unwrap();
        Self::fetch(&conn, id)
    }

    /// Mark a claimed record processed. Returns false if it was already
    /// terminal, which is harmless: remote writes are idempotent upserts.
    pub fn mark_processed(&self, id: i64) -> Result<bool, RegistaError> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE notifications SET status = 'processed', claimed_at = NULL
             WHERE id = ?1 AND status IN ('inflight', 'pending')",
            params![id],
        )?;
        Ok(updated > 0)
    }

    /// Record a failed delivery attempt: bump retry_count, then either
    /// reschedule from the backoff policy or park at `failed` once the
    /// ceiling is reached.
    pub fn record_failure(
        &self,
        id: i64,
        policy: &BackoffPolicy,
        max_retries: u32,
        now: DateTime<Utc>,
    ) -> Result<NotificationStatus, RegistaError> {
        let conn = self.conn.lock().unwrap();
        let retry_count: u32 = match conn
            .query_row(
                "SELECT retry_count FROM notifications WHERE id = ?1 AND status IN ('inflight', 'pending')",
                params![id],
                |r| r.get(0),
            )
            .optional()?
        {
            Some(count) => count,
            None => return Ok(NotificationStatus::Failed),
        };

        let attempts = retry_count + 1;
        if attempts >= max_retries {
            conn.execute(
                "UPDATE notifications
                 SET status = 'failed', retry_count = ?1, claimed_at = NULL
                 WHERE id = ?2",
                params![attempts, id],
            )?;
            return Ok(NotificationStatus::Failed);
        }

        let delay = policy.delay_for_attempt(retry_count);
        let next = now + Duration::milliseconds(delay.as_millis() as i64);
        conn.execute(
            "UPDATE notifications
             SET status = 'pending', retry_count = ?1, next_attempt_at = ?2, claimed_at = NULL
             WHERE id = ?3",
            params![attempts, next.to_rfc3339(), id],
        )?;
        Ok(NotificationStatus::Pending)
    }

    /// Return records stuck in-flight (crash between remote write and mark)
    /// to pending so a later pass retries them. The remote upsert keyed by
    /// correlation id makes the replay safe.
    pub fn release_stale(&self, stale_after_seconds: i64, now: DateTime<Utc>) -> Result<usize, RegistaError> {
        let cutoff = (now - Duration::seconds(stale_after_seconds)).to_rfc3339();
        let conn = self.conn.lock().unwrap();
        let released = conn.execute(
            "UPDATE notifications
             SET status = 'pending', claimed_at = NULL, next_attempt_at = ?1
             WHERE status = 'inflight' AND claimed_at < ?2",
            params![now.to_rfc3339(), cutoff],
        )?;
        Ok(released)
    }

    /// Remove terminal records older than the horizon. Pending records below
    /// the retry ceiling are never touched.
    pub fn cleanup(&self, older_than: DateTime<Utc>) -> Result<usize, RegistaError> {
        let conn = self.conn.lock().unwrap();
        let removed = conn.execute(
            "DELETE FROM notifications
             WHERE status IN ('processed', 'failed') AND created_at < ?1",
            params![older_than.to_rfc3339()],
        )?;
        Ok(removed)
    }

    pub fn counts(&self) -> Result<QueueCounts, RegistaError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM notifications GROUP BY status")?;
        let rows = stmt.query_map([], |r| {
            let status: String = r.get(0)?;
            let count: i64 = r.get(1)?;
            Ok((status, count as u64))
        })?;

        let mut counts = QueueCounts::default();
        for row in rows {
            let (status, count) = row?;
            match NotificationStatus::parse(&status) {
                NotificationStatus::Pending => counts.pending = count,
                NotificationStatus::Inflight => counts.inflight = count,
                NotificationStatus::Processed => counts.processed = count,
                NotificationStatus::Failed => counts.failed = count,
            }
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration as StdDuration;

    fn queue() -> NotificationQueue {
        NotificationQueue::in_memory().unwrap()
    }

    fn policy() -> BackoffPolicy {
        BackoffPolicy::new(
            StdDuration::from_millis(100),
            2.0,
            StdDuration::from_secs(10),
        )
    }

    #[test]
    fn test_enqueue_then_claim() {
        let q = queue();
        let id = q.enqueue("msg-1", &serde_json::json!({"status": "delivered"})).unwrap();
        let claimed = q.claim_due(Utc::now()).unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, id);
        assert_eq!(claimed[0].correlation_id, "msg-1");
        assert_eq!(claimed[0].status, NotificationStatus::Inflight);
    }

    #[test]
    fn test_claim_is_exclusive() {
        let q = queue();
        q.enqueue("msg-1", &serde_json::json!({})).unwrap();
        let first = q.claim_due(Utc::now()).unwrap();
        let second = q.claim_due(Utc::now()).unwrap();
        assert_eq!(first.len(), 1);
        assert!(second.is_empty(), "second pass must not re-claim an in-flight record");
    }

    #[test]
    fn test_mark_processed_exactly_once() {
        let q = queue();
        let id = q.enqueue("msg-1", &serde_json::json!({})).unwrap();
        q.claim_due(Utc::now()).unwrap();
        assert!(q.mark_processed(id).unwrap());
        assert!(!q.mark_processed(id).unwrap());
        assert_eq!(q.get(id).unwrap().unwrap().status, NotificationStatus::Processed);
    }

    #[test]
    fn test_failure_below_ceiling_reschedules() {
        let q = queue();
        let id = q.enqueue("msg-1", &serde_json::json!({})).unwrap();
        q.claim_due(Utc::now()).unwrap();
        let status = q.record_failure(id, &policy(), 3, Utc::now()).unwrap();
        assert_eq!(status, NotificationStatus::Pending);
        let record = q.get(id).unwrap().unwrap();
        assert_eq!(record.retry_count, 1);

        // Not yet due: backoff pushed next_attempt_at into the future.
        assert!(q.claim_due(Utc::now()).unwrap().is_empty());
        // Due once the backoff delay elapses.
        let later = Utc::now() + Duration::seconds(30);
        assert_eq!(q.claim_due(later).unwrap().len(), 1);
    }

    #[test]
    fn test_retry_ceiling_reaches_failed_exactly() {
        let q = queue();
        let max_retries = 3;
        let id = q.enqueue("msg-1", &serde_json::json!({})).unwrap();

        let mut attempts = 0;
        let mut now = Utc::now();
        loop {
            now += Duration::hours(1);
            let claimed = q.claim_due(now).unwrap();
            if claimed.is_empty() {
                break;
            }
            attempts += 1;
            q.record_failure(id, &policy(), max_retries, now).unwrap();
        }
        assert_eq!(attempts, max_retries);
        assert_eq!(q.get(id).unwrap().unwrap().status, NotificationStatus::Failed);
        assert_eq!(q.get(id).unwrap().unwrap().retry_count, max_retries);
    }

    #[test]
    fn test_release_stale_returns_inflight_to_pending() {
        let q = queue();
        q.enqueue("msg-1", &serde_json::json!({})).unwrap();
        q.claim_due(Utc::now()).unwrap();

        // Not yet stale.
        assert_eq!(q.release_stale(60, Utc::now()).unwrap(), 0);
        // Stale from the perspective of a much later pass.
        let later = Utc::now() + Duration::seconds(120);
        assert_eq!(q.release_stale(60, later).unwrap(), 1);
        assert_eq!(q.claim_due(later).unwrap().len(), 1);
    }

    #[test]
    fn test_cleanup_spares_pending() {
        let q = queue();
        let processed = q.enqueue("done", &serde_json::json!({})).unwrap();
        let pending = q.enqueue("waiting", &serde_json::json!({})).unwrap();
        q.claim_due(Utc::now()).unwrap();
        q.mark_processed(processed).unwrap();
        // "waiting" was also claimed; put it back to pending.
        q.record_failure(pending, &policy(), 5, Utc::now()).unwrap();

        let removed = q.cleanup(Utc::now() + Duration::days(30)).unwrap();
        assert_eq!(removed, 1);
        assert!(q.get(processed).unwrap().is_none());
        assert!(q.get(pending).unwrap().is_some());
    }

    #[test]
    fn test_counts() {
        let q = queue();
        q.enqueue("a", &serde_json::json!({})).unwrap();
        let b = q.enqueue("b", &serde_json::json!({})).unwrap();
        q.claim_due(Utc::now()).unwrap();
        q.mark_processed(b).unwrap();
        let counts = q.counts().unwrap();
        assert_eq!(counts.processed, 1);
        assert_eq!(counts.inflight, 1);
        assert_eq!(counts.pending, 0);
    }
}
