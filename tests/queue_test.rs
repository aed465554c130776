// tests/queue_test.rs — Notification queue + processor end to end

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;

use regista::infra::errors::RegistaError;
use regista::provider::retry::BackoffPolicy;
use regista::queue::processor::{Processor, ProcessorConfig};
use regista::queue::{NotificationQueue, NotificationStatus};
use regista::records::{PlayerRecord, RecordStore, Registrant};

/// Record store that counts delivery-status writes and can be told to fail.
struct CountingStore {
    writes: Mutex<Vec<(String, serde_json::Value)>>,
    fail_attempts: AtomicUsize,
}

impl CountingStore {
    fn new() -> Self {
        Self {
            writes: Mutex::new(Vec::new()),
            fail_attempts: AtomicUsize::new(0),
        }
    }

    fn failing(attempts: usize) -> Self {
        let store = Self::new();
        store.fail_attempts.store(attempts, Ordering::SeqCst);
        store
    }
}

#[async_trait]
impl RecordStore for CountingStore {
    async fn team_exists(&self, _team: &str, _age_group: &str) -> Result<bool, RegistaError> {
        Ok(true)
    }

    async fn find_player(
        &self,
        _slug: &str,
        _team: &str,
        _age_group: &str,
    ) -> Result<Option<PlayerRecord>, RegistaError> {
        Ok(None)
    }

    async fn upsert_registrant(&self, _registrant: &Registrant) -> Result<(), RegistaError> {
        Ok(())
    }

    async fn set_payment_day(&self, _correlation_id: &str, _day: i32) -> Result<(), RegistaError> {
        Ok(())
    }

    async fn upsert_delivery_status(
        &self,
        correlation_id: &str,
        metrics: &serde_json::Value,
    ) -> Result<(), RegistaError> {
        if self.fail_attempts.load(Ordering::SeqCst) > 0 {
            self.fail_attempts.fetch_sub(1, Ordering::SeqCst);
            return Err(RegistaError::RecordStore {
                message: "record store unavailable".into(),
                retriable: true,
            });
        }
        self.writes
            .lock()
            .unwrap()
            .push((correlation_id.to_string(), metrics.clone()));
        Ok(())
    }
}

fn processor_config(max_retries: u32) -> ProcessorConfig {
    ProcessorConfig {
        poll_interval: Duration::from_millis(10),
        max_retries,
        retention_days: 14,
        stale_claim_seconds: 120,
        // Tiny backoff so retried records come due again within the test.
        backoff: BackoffPolicy::new(Duration::from_millis(1), 2.0, Duration::from_millis(4)),
    }
}

fn file_queue() -> (tempfile::TempDir, Arc<NotificationQueue>) {
    let dir = tempfile::tempdir().unwrap();
    let queue = NotificationQueue::open(&dir.path().join("notifications.db")).unwrap();
    (dir, Arc::new(queue))
}

#[tokio::test]
async fn test_enqueued_records_reach_the_store() {
    let (_dir, queue) = file_queue();
    let store = Arc::new(CountingStore::new());

    for i in 0..3 {
        queue
            .enqueue(&format!("msg-{i}"), &json!({ "status": "delivered" }))
            .unwrap();
    }

    let processor = Processor::new(queue.clone(), store.clone(), processor_config(5));
    let summary = processor.run_once().await.unwrap();
    assert_eq!(summary.claimed, 3);
    assert_eq!(summary.processed, 3);

    let writes = store.writes.lock().unwrap();
    assert_eq!(writes.len(), 3);
    assert_eq!(writes[0].0, "msg-0");
    assert_eq!(writes[0].1["status"], "delivered");

    let counts = queue.counts().unwrap();
    assert_eq!(counts.processed, 3);
    assert_eq!(counts.pending, 0);
}

#[tokio::test]
async fn test_transient_failure_retries_then_succeeds() {
    let (_dir, queue) = file_queue();
    // Fail the first two attempts, succeed after.
    let store = Arc::new(CountingStore::failing(2));
    queue.enqueue("msg-1", &json!({ "status": "delivered" })).unwrap();

    let processor = Processor::new(queue.clone(), store.clone(), processor_config(5));

    let summary = processor.run_once().await.unwrap();
    assert_eq!(summary.retried, 1);

    let mut processed = 0;
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        processed += processor.run_once().await.unwrap().processed;
        if processed > 0 {
            break;
        }
    }
    assert_eq!(processed, 1);
    assert_eq!(store.writes.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_retry_ceiling_parks_record_as_failed() {
    let (_dir, queue) = file_queue();
    let store = Arc::new(CountingStore::failing(usize::MAX));
    let id = queue.enqueue("msg-1", &json!({})).unwrap();

    let processor = Processor::new(queue.clone(), store, processor_config(3));

    let mut attempts = 0;
    for _ in 0..40 {
        let summary = processor.run_once().await.unwrap();
        attempts += summary.retried + summary.failed;
        if queue.get(id).unwrap().unwrap().status == NotificationStatus::Failed {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let record = queue.get(id).unwrap().unwrap();
    assert_eq!(record.status, NotificationStatus::Failed);
    assert_eq!(record.retry_count, 3);
    assert_eq!(attempts, 3);

    // A failed record is terminal: further passes ignore it.
    let summary = processor.run_once().await.unwrap();
    assert_eq!(summary.claimed, 0);
}

#[tokio::test]
async fn test_concurrent_passes_never_double_deliver() {
    let (_dir, queue) = file_queue();
    let store = Arc::new(CountingStore::new());

    for i in 0..10 {
        queue.enqueue(&format!("msg-{i}"), &json!({})).unwrap();
    }

    let a = Processor::new(queue.clone(), store.clone(), processor_config(5));
    let b = Processor::new(queue.clone(), store.clone(), processor_config(5));
    let (ra, rb) = tokio::join!(a.run_once(), b.run_once());
    let total = ra.unwrap().processed + rb.unwrap().processed;

    assert_eq!(total, 10);
    assert_eq!(store.writes.lock().unwrap().len(), 10);
    assert_eq!(queue.counts().unwrap().processed, 10);
}

#[tokio::test]
async fn test_durability_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notifications.db");

    {
        let queue = NotificationQueue::open(&path).unwrap();
        queue.enqueue("msg-1", &json!({ "status": "delivered" })).unwrap();
    }

    // Reopen: the pending record survived the restart.
    let queue = Arc::new(NotificationQueue::open(&path).unwrap());
    assert_eq!(queue.counts().unwrap().pending, 1);

    let store = Arc::new(CountingStore::new());
    let processor = Processor::new(queue.clone(), store.clone(), processor_config(5));
    let summary = processor.run_once().await.unwrap();
    assert_eq!(summary.processed, 1);
    assert_eq!(store.writes.lock().unwrap().len(), 1);
}
