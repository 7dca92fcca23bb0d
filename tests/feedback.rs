// Feedback coordinator tests — threshold triggering under concurrency,
// manual retraining, failure handling and store degradation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crossmodal::db::memory::MemoryStore;
use crossmodal::db::models::{FeedbackEvent, FeedbackSummary, Verdict};
use crossmodal::db::FeedbackStore;
use crossmodal::error::FeedbackError;
use crossmodal::feedback::{
    CoordinatorSettings, FeedbackCoordinator, Modality, Retrainer, SimulatedRetrainer,
};
use crossmodal::metrics::Metrics;
use crossmodal::pipeline::health::HealthState;

// ============================================================
// Fakes
// ============================================================

/// Holds every run in data collection until the gate is opened.
struct GatedRetrainer {
    gate: Arc<Notify>,
}

#[async_trait]
impl Retrainer for GatedRetrainer {
    async fn collect_training_data(
        &self,
        store: &dyn FeedbackStore,
    ) -> anyhow::Result<FeedbackSummary> {
        self.gate.notified().await;
        store.feedback_summary().await
    }

    async fn retrain(&self, _modality: Modality, _data: &FeedbackSummary) -> anyhow::Result<()> {
        Ok(())
    }

    async fn complete(&self, _data: &FeedbackSummary) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Fails while retraining one modality.
struct FailingRetrainer {
    fail_on: Modality,
}

#[async_trait]
impl Retrainer for FailingRetrainer {
    async fn retrain(&self, modality: Modality, _data: &FeedbackSummary) -> anyhow::Result<()> {
        if modality == self.fail_on {
            anyhow::bail!("out of GPU memory");
        }
        Ok(())
    }

    async fn complete(&self, _data: &FeedbackSummary) -> anyhow::Result<()> {
        Ok(())
    }
}

struct PanickingRetrainer;

#[async_trait]
impl Retrainer for PanickingRetrainer {
    async fn retrain(&self, _modality: Modality, _data: &FeedbackSummary) -> anyhow::Result<()> {
        panic!("retrainer bug");
    }

    async fn complete(&self, _data: &FeedbackSummary) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Feedback store that accepts reads but rejects every write.
struct ReadOnlyStore;

#[async_trait]
impl FeedbackStore for ReadOnlyStore {
    async fn append_feedback(&self, _key: &str, _event: &FeedbackEvent) -> anyhow::Result<()> {
        anyhow::bail!("bucket is read-only")
    }

    async fn feedback_count(&self) -> anyhow::Result<u64> {
        Ok(0)
    }

    async fn feedback_summary(&self) -> anyhow::Result<FeedbackSummary> {
        Ok(FeedbackSummary::default())
    }

    async fn get_state(&self, _key: &str) -> anyhow::Result<Option<String>> {
        Ok(None)
    }

    async fn set_state(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
        anyhow::bail!("bucket is read-only")
    }
}

async fn seeded_store(count: usize) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for i in 0..count {
        let event = FeedbackEvent::new(format!("mod_seed{i}"), Verdict::Correct);
        store
            .append_feedback(&event.storage_key(), &event)
            .await
            .unwrap();
    }
    store
}

async fn coordinator(
    store: Arc<dyn FeedbackStore>,
    retrainer: Arc<dyn Retrainer>,
    threshold: u64,
) -> Arc<FeedbackCoordinator> {
    Arc::new(
        FeedbackCoordinator::initialize(
            store,
            retrainer,
            Arc::new(Metrics::new().unwrap()),
            CoordinatorSettings { threshold },
        )
        .await
        .unwrap(),
    )
}

async fn wait_until_idle(coordinator: &FeedbackCoordinator) {
    for _ in 0..400 {
        if !coordinator.stats().await.in_flight {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("retraining never finished");
}

// ============================================================
// Threshold triggering
// ============================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn hundredth_event_triggers_exactly_once_under_concurrency() {
    let gate = Arc::new(Notify::new());
    let store = seeded_store(99).await;
    let c = coordinator(
        store.clone(),
        Arc::new(GatedRetrainer { gate: gate.clone() }),
        100,
    )
    .await;
    assert_eq!(c.stats().await.pending, 99);

    let mut tasks = Vec::new();
    for i in 0..25 {
        let c = c.clone();
        tasks.push(tokio::spawn(async move {
            c.submit(FeedbackEvent::new(format!("mod_new{i}"), Verdict::Incorrect))
                .await
                .unwrap()
        }));
    }

    let mut triggered = 0;
    for task in tasks {
        let receipt = task.await.unwrap();
        assert!(receipt.stored);
        if receipt.retraining_triggered {
            triggered += 1;
        }
    }
    assert_eq!(triggered, 1);

    let stats = c.stats().await;
    assert_eq!(stats.total, 124);
    assert!(stats.in_flight);
    assert_eq!(stats.pending, 24);

    gate.notify_one();
    wait_until_idle(&c).await;
    let stats = c.stats().await;
    assert_eq!(stats.runs, 1);
    assert_eq!(stats.failures, 0);
    assert_eq!(store.feedback_count().await.unwrap(), 124);
}

#[tokio::test]
async fn below_threshold_never_triggers() {
    let c = coordinator(
        Arc::new(MemoryStore::new()),
        Arc::new(SimulatedRetrainer::new(Duration::from_millis(1))),
        5,
    )
    .await;
    for i in 0..4 {
        let receipt = c
            .submit(FeedbackEvent::new(format!("mod_{i}"), Verdict::Partial))
            .await
            .unwrap();
        assert!(!receipt.retraining_triggered);
        assert_eq!(receipt.feedback_count, i + 1);
    }
    assert_eq!(c.stats().await.pending, 4);
}

#[tokio::test]
async fn duplicate_prediction_ids_are_all_counted() {
    let store = Arc::new(MemoryStore::new());
    let c = coordinator(
        store.clone(),
        Arc::new(SimulatedRetrainer::new(Duration::from_millis(1))),
        100,
    )
    .await;
    for verdict in [Verdict::Correct, Verdict::Incorrect] {
        c.submit(FeedbackEvent::new("mod_same", verdict))
            .await
            .unwrap();
    }
    assert_eq!(c.stats().await.total, 2);
    assert_eq!(store.feedback_entries().await.len(), 2);
}

// ============================================================
// Manual retraining
// ============================================================

#[tokio::test]
async fn manual_retrain_while_running_is_rejected() {
    let gate = Arc::new(Notify::new());
    let c = coordinator(
        Arc::new(MemoryStore::new()),
        Arc::new(GatedRetrainer { gate: gate.clone() }),
        100,
    )
    .await;

    let handle = c.retrain().await.unwrap();
    assert!(matches!(
        c.retrain().await,
        Err(FeedbackError::RetrainingInFlight)
    ));

    gate.notify_one();
    handle.await.unwrap();

    let stats = c.stats().await;
    assert!(!stats.in_flight);
    assert_eq!(stats.runs, 1);
    assert!(c.retrain().await.is_ok());
}

// ============================================================
// Failures
// ============================================================

#[tokio::test]
async fn failed_run_releases_flag_and_degrades_health() {
    let c = coordinator(
        Arc::new(MemoryStore::new()),
        Arc::new(FailingRetrainer {
            fail_on: Modality::Text,
        }),
        100,
    )
    .await;

    c.retrain().await.unwrap().await.unwrap();

    let stats = c.stats().await;
    assert!(!stats.in_flight);
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.runs, 0);
    let err = stats.last_error.unwrap();
    assert!(err.contains("text retraining failed"), "{err}");
    assert!(err.contains("out of GPU memory"), "{err}");

    assert_eq!(c.health().await.status, HealthState::Degraded);

    // The flag was released, so a new run can start
    assert!(c.retrain().await.is_ok());
}

#[tokio::test]
async fn panicking_retrainer_is_contained() {
    let c = coordinator(
        Arc::new(MemoryStore::new()),
        Arc::new(PanickingRetrainer),
        100,
    )
    .await;

    c.retrain().await.unwrap().await.unwrap();

    let stats = c.stats().await;
    assert!(!stats.in_flight);
    assert_eq!(stats.failures, 1);
    assert!(stats.last_error.is_some());
}

#[tokio::test]
async fn store_failure_reports_not_stored_and_is_not_counted() {
    let c = coordinator(
        Arc::new(ReadOnlyStore),
        Arc::new(SimulatedRetrainer::new(Duration::from_millis(1))),
        1,
    )
    .await;

    let receipt = c
        .submit(FeedbackEvent::new("mod_a", Verdict::Correct))
        .await
        .unwrap();
    assert!(!receipt.stored);
    assert!(!receipt.retraining_triggered);
    assert_eq!(receipt.feedback_count, 0);

    let stats = c.stats().await;
    assert_eq!(stats.total, 0);
    assert_eq!(stats.pending, 0);
    assert!(!stats.in_flight);
}

#[tokio::test]
async fn checkpoint_save_failure_does_not_fail_the_run() {
    // ReadOnlyStore rejects set_state; the run itself must still succeed
    let c = coordinator(
        Arc::new(ReadOnlyStore),
        Arc::new(SimulatedRetrainer::new(Duration::from_millis(1))),
        100,
    )
    .await;

    c.retrain().await.unwrap().await.unwrap();
    let stats = c.stats().await;
    assert_eq!(stats.runs, 1);
    assert_eq!(stats.failures, 0);
    assert_eq!(c.health().await.status, HealthState::Healthy);
}
