//! Enrichment orchestrator.
//!
//! Drives one run through `Idle -> Running -> Done`, submitting batches
//! strictly one after another. Each batch goes `pending -> processing ->
//! completed | error`; a failed batch never aborts the run.

use crate::ai::AddressExtractor;
use crate::config::EnrichmentConfig;
use crate::error::{EnrichmentError, Result};
use crate::mapper;
use crate::pipeline::progress::{
    CancellationToken, ClosureProgressReporter, ProgressReporter, ProgressUpdate, RunState,
};
use crate::planner;
use crate::types::{Batch, BatchStatus, ColumnMapping, Dataset, EnrichmentItem};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Suspension used between batches and between retries.
///
/// Injected so tests can run without real delays.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Blocks the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Returns immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSleeper;

impl Sleeper for NoopSleeper {
    fn sleep(&self, _duration: Duration) {}
}

/// Read-only view of a run, safe to take from another thread.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSnapshot {
    pub state: RunState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping: Option<ColumnMapping>,
    pub batches: Vec<Batch>,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: bool,
}

impl RunSnapshot {
    pub fn total_batches(&self) -> usize {
        self.batches.len()
    }

    pub fn resolved(&self) -> usize {
        self.completed + self.failed
    }

    /// Resolved batches / total batches; 1.0 for a finished empty run.
    pub fn progress(&self) -> f32 {
        match (self.state, self.batches.len()) {
            (RunState::Idle, _) => 0.0,
            (_, 0) => 1.0,
            (_, total) => self.resolved() as f32 / total as f32,
        }
    }
}

/// Cloneable handle for observing a run in progress.
#[derive(Debug, Clone, Default)]
pub struct RunMonitor {
    inner: Arc<RwLock<RunSnapshot>>,
}

impl RunMonitor {
    pub fn snapshot(&self) -> RunSnapshot {
        self.inner.read().clone()
    }

    pub fn state(&self) -> RunState {
        self.inner.read().state
    }

    pub fn progress(&self) -> f32 {
        self.inner.read().progress()
    }

    fn update(&self, f: impl FnOnce(&mut RunSnapshot)) {
        let mut guard = self.inner.write();
        f(&mut *guard);
    }
}

/// Result of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    /// Working dataset after all merges.
    pub dataset: Dataset,
    pub batches: Vec<Batch>,
    pub cancelled: bool,
    pub duration_ms: u64,
}

impl RunOutcome {
    pub fn completed_batches(&self) -> usize {
        self.count(BatchStatus::Completed)
    }

    pub fn failed_batches(&self) -> usize {
        self.count(BatchStatus::Error)
    }

    pub fn pending_batches(&self) -> usize {
        self.count(BatchStatus::Pending)
    }

    fn count(&self, status: BatchStatus) -> usize {
        self.batches.iter().filter(|b| b.status == status).count()
    }
}

/// Merge extraction items into the dataset by identifier.
///
/// Only existing rows are updated (first row whose identifier matches).
/// Returns the number of rows updated.
pub fn merge_items(
    dataset: &mut Dataset,
    mapping: &ColumnMapping,
    identifier_column: &str,
    items: &[EnrichmentItem],
) -> usize {
    let mut merged = 0;
    for item in items {
        let Some(index) = dataset.position_by(identifier_column, &item.id) else {
            debug!("Ignoring result for unknown identifier '{}'", item.id);
            continue;
        };
        let row = &mut dataset.rows[index];
        row.insert(mapping.district.clone(), item.district.clone());
        row.insert(mapping.subdistrict.clone(), item.subdistrict.clone());
        merged += 1;
    }
    merged
}

/// Sequential batch runner.
///
/// # Example
///
/// ```rust,ignore
/// use address_enricher::{Orchestrator, EnrichmentConfig};
/// use address_enricher::ai::OpenAiExtractor;
/// use std::sync::Arc;
///
/// let orchestrator = Orchestrator::builder()
///     .config(EnrichmentConfig::default())
///     .extractor(Arc::new(OpenAiExtractor::new(api_key)?))
///     .on_progress(|update| println!("[{:.0}%] {}", update.percent(), update.message))
///     .build()?;
///
/// let monitor = orchestrator.monitor();
/// let outcome = orchestrator.run(dataset, &mapping)?;
/// ```
pub struct Orchestrator {
    config: EnrichmentConfig,
    extractor: Arc<dyn AddressExtractor>,
    sleeper: Arc<dyn Sleeper>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: CancellationToken,
    monitor: RunMonitor,
}

static_assertions::assert_impl_all!(Orchestrator: Send, Sync);

impl Orchestrator {
    /// Create a new orchestrator builder.
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    pub fn config(&self) -> &EnrichmentConfig {
        &self.config
    }

    /// Handle for observing runs of this orchestrator.
    pub fn monitor(&self) -> RunMonitor {
        self.monitor.clone()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation_token
    }

    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    /// Run enrichment over `dataset` using a frozen copy of `mapping`.
    ///
    /// Batches are planned from the uploaded rows, then district and
    /// sub-district are cleared on every row before the first batch. The run always reaches `Done`: batch failures are recorded on
    /// the batch and the final dataset is returned regardless.
    ///
    /// # Errors
    ///
    /// Only precondition failures: an incomplete mapping, a mapped column
    /// missing from the headers, or a missing identifier column.
    pub fn run(&self, mut dataset: Dataset, mapping: &ColumnMapping) -> Result<RunOutcome> {
        let start_time = Instant::now();
        let mapping = mapping.clone();
        let id_column = self.config.identifier_column.as_str();

        mapper::validate(&dataset.headers, &mapping)?;
        if !dataset.has_header(id_column) {
            return Err(EnrichmentError::MissingIdentifierColumn(id_column.to_string()));
        }

        // Planned before clearing: the address column may double as a target.
        let mut batches =
            planner::plan(&dataset.rows, &mapping, id_column, self.config.batch_size);
        let total = batches.len();

        for row in &mut dataset.rows {
            row.insert(mapping.district.clone(), String::new());
            row.insert(mapping.subdistrict.clone(), String::new());
        }

        self.monitor.update(|s| {
            *s = RunSnapshot {
                state: RunState::Running,
                mapping: Some(mapping.clone()),
                batches: batches.clone(),
                ..Default::default()
            }
        });

        info!(
            "Starting enrichment: {} rows, {} batches of up to {} via {}",
            dataset.len(),
            total,
            self.config.batch_size,
            self.extractor.name()
        );
        self.report_progress(ProgressUpdate::started(total));

        let mut resolved = 0;
        let mut cancelled = false;

        for i in 0..total {
            if self.cancellation_token.is_cancelled() {
                cancelled = true;
                break;
            }

            batches[i].status = BatchStatus::Processing;
            self.sync_batch(&batches[i]);
            self.report_progress(ProgressUpdate::for_batch(
                &batches[i],
                resolved,
                total,
                format!("Processing batch {} of {}", i + 1, total),
            ));

            let message = match self.extract_with_retry(&batches[i]) {
                Ok(items) => {
                    let merged = merge_items(&mut dataset, &mapping, id_column, &items);
                    let batch = &mut batches[i];
                    batch.status = BatchStatus::Completed;
                    batch.result = Some(items);
                    info!("Batch {} completed: {} rows updated", batch.index, merged);
                    format!("Batch {} completed: {} addresses processed", batch.index, merged)
                }
                Err(e) => {
                    let batch = &mut batches[i];
                    batch.status = BatchStatus::Error;
                    batch.error = Some(e.to_string());
                    warn!("Batch {} failed: {}", batch.index, e);
                    format!("Batch {} failed: {}", batch.index, e)
                }
            };

            resolved += 1;
            self.sync_batch(&batches[i]);
            self.report_progress(ProgressUpdate::for_batch(&batches[i], resolved, total, message));

            if i + 1 < total {
                if self.cancellation_token.is_cancelled() {
                    cancelled = true;
                    break;
                }
                self.sleeper.sleep(self.config.inter_batch_delay());
            }
        }

        let outcome = RunOutcome {
            dataset,
            batches,
            cancelled,
            duration_ms: start_time.elapsed().as_millis() as u64,
        };

        self.monitor.update(|s| {
            s.state = RunState::Done;
            s.cancelled = cancelled;
        });

        let message = if cancelled {
            format!("Enrichment cancelled after {} of {} batches", resolved, total)
        } else {
            format!(
                "Enrichment finished: {} of {} batches completed",
                outcome.completed_batches(),
                total
            )
        };
        info!("{}", message);
        self.report_progress(ProgressUpdate::done(resolved, total, message));

        Ok(outcome)
    }

    fn sync_batch(&self, batch: &Batch) {
        self.monitor.update(|s| {
            if let Some(slot) = s.batches.get_mut(batch.index - 1) {
                *slot = batch.clone();
            }
            s.completed = s
                .batches
                .iter()
                .filter(|b| b.status == BatchStatus::Completed)
                .count();
            s.failed = s
                .batches
                .iter()
                .filter(|b| b.status == BatchStatus::Error)
                .count();
        });
    }

    fn extract_with_retry(&self, batch: &Batch) -> Result<Vec<EnrichmentItem>> {
        let policy = self.config.retry;
        let mut attempt = 0;

        loop {
            match self.extractor.extract(&batch.records) {
                Ok(items) => return Ok(items),
                Err(e) if attempt < policy.max_retries && !self.cancellation_token.is_cancelled() => {
                    attempt += 1;
                    let delay = policy.delay_for(attempt);
                    warn!(
                        "Batch {} attempt {} failed ({}), retrying in {}ms",
                        batch.index,
                        attempt,
                        e,
                        delay.as_millis()
                    );
                    self.sleeper.sleep(delay);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Builder for [`Orchestrator`].
#[derive(Default)]
pub struct OrchestratorBuilder {
    config: Option<EnrichmentConfig>,
    extractor: Option<Arc<dyn AddressExtractor>>,
    sleeper: Option<Arc<dyn Sleeper>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: Option<CancellationToken>,
}

impl OrchestratorBuilder {
    /// Set the run configuration.
    pub fn config(mut self, config: EnrichmentConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the extraction provider (required).
    pub fn extractor(mut self, extractor: Arc<dyn AddressExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Replace the default thread sleeper.
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Set a progress reporter.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a closure for progress updates.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Set a cancellation token.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if no extractor was set or the config is invalid.
    pub fn build(self) -> Result<Orchestrator> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let extractor = self.extractor.ok_or_else(|| {
            EnrichmentError::InvalidConfig("an address extractor is required".to_string())
        })?;

        Ok(Orchestrator {
            config,
            extractor,
            sleeper: self.sleeper.unwrap_or_else(|| Arc::new(ThreadSleeper)),
            progress_reporter: self.progress_reporter,
            cancellation_token: self.cancellation_token.unwrap_or_default(),
            monitor: RunMonitor::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AddressRecord, Row};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    /// Echoes every record back with fixed values; fails on listed batch calls.
    struct EchoExtractor {
        calls: Mutex<usize>,
        fail_on: Vec<usize>,
    }

    impl EchoExtractor {
        fn new(fail_on: Vec<usize>) -> Self {
            Self {
                calls: Mutex::new(0),
                fail_on,
            }
        }
    }

    impl AddressExtractor for EchoExtractor {
        fn extract(&self, records: &[AddressRecord]) -> Result<Vec<EnrichmentItem>> {
            let call = {
                let mut calls = self.calls.lock();
                *calls += 1;
                *calls
            };
            if self.fail_on.contains(&call) {
                return Err(EnrichmentError::Upstream {
                    status: 500,
                    message: "Internal Server Error".to_string(),
                });
            }
            Ok(records
                .iter()
                .map(|r| EnrichmentItem::new(&r.id, format!("Kec {}", r.id), format!("Kel {}", r.id)))
                .collect())
        }

        fn name(&self) -> &str {
            "Echo"
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        sleeps: Mutex<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.sleeps.lock().push(duration);
        }
    }

    fn mapping() -> ColumnMapping {
        ColumnMapping::new("alamat", "kecamatan", "kelurahan")
    }

    fn dataset(n: usize) -> Dataset {
        let headers = ["conversation_id", "alamat", "kecamatan", "kelurahan"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let rows = (0..n)
            .map(|i| {
                let mut row = Row::new();
                row.insert("conversation_id".to_string(), format!("c{}", i));
                row.insert("alamat".to_string(), format!("Jl. {}", i));
                row.insert("kecamatan".to_string(), "old".to_string());
                row.insert("kelurahan".to_string(), "old".to_string());
                row
            })
            .collect();
        Dataset::new(headers, rows)
    }

    fn orchestrator(
        extractor: Arc<dyn AddressExtractor>,
        sleeper: Arc<dyn Sleeper>,
        config: EnrichmentConfig,
    ) -> Orchestrator {
        Orchestrator::builder()
            .config(config)
            .extractor(extractor)
            .sleeper(sleeper)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_extractor() {
        assert!(matches!(
            Orchestrator::builder().build(),
            Err(EnrichmentError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_delay_only_between_batches() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let orch = orchestrator(
            Arc::new(EchoExtractor::new(vec![])),
            sleeper.clone(),
            EnrichmentConfig::default(),
        );

        let outcome = orch.run(dataset(25), &mapping()).unwrap();
        assert_eq!(outcome.completed_batches(), 3);
        assert_eq!(*sleeper.sleeps.lock(), vec![Duration::from_secs(1); 2]);
    }

    #[test]
    fn test_failed_batch_does_not_stop_run() {
        let orch = orchestrator(
            Arc::new(EchoExtractor::new(vec![2])),
            Arc::new(NoopSleeper),
            EnrichmentConfig::default(),
        );

        let outcome = orch.run(dataset(25), &mapping()).unwrap();
        let statuses: Vec<BatchStatus> = outcome.batches.iter().map(|b| b.status).collect();
        assert_eq!(
            statuses,
            vec![BatchStatus::Completed, BatchStatus::Error, BatchStatus::Completed]
        );
        assert!(outcome.batches[1].error.as_deref().unwrap().contains("500"));
        assert_eq!(outcome.dataset.cell(0, "kecamatan"), "Kec c0");
        // rows of the failed batch stay cleared
        assert_eq!(outcome.dataset.cell(15, "kecamatan"), "");
        assert_eq!(outcome.dataset.cell(24, "kelurahan"), "Kel c24");
        assert_eq!(orch.monitor().state(), RunState::Done);
    }

    #[test]
    fn test_retry_recovers_batch() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let config = EnrichmentConfig::builder()
            .inter_batch_delay_ms(0)
            .max_retries(1)
            .build()
            .unwrap();
        let orch = orchestrator(Arc::new(EchoExtractor::new(vec![1])), sleeper.clone(), config);

        let outcome = orch.run(dataset(5), &mapping()).unwrap();
        assert_eq!(outcome.completed_batches(), 1);
        assert_eq!(*sleeper.sleeps.lock(), vec![Duration::from_millis(1000)]);
    }

    #[test]
    fn test_shared_address_and_district_column_still_plans() {
        let seen = Arc::new(Mutex::new(Vec::new()));

        struct CapturingExtractor(Arc<Mutex<Vec<String>>>);

        impl AddressExtractor for CapturingExtractor {
            fn extract(&self, records: &[AddressRecord]) -> Result<Vec<EnrichmentItem>> {
                self.0.lock().extend(records.iter().map(|r| r.address.clone()));
                Ok(Vec::new())
            }

            fn name(&self) -> &str {
                "Capturing"
            }
        }

        let orch = orchestrator(
            Arc::new(CapturingExtractor(seen.clone())),
            Arc::new(NoopSleeper),
            EnrichmentConfig::default(),
        );

        let outcome = orch
            .run(dataset(3), &ColumnMapping::new("alamat", "alamat", "kelurahan"))
            .unwrap();
        assert_eq!(outcome.batches.len(), 1);
        assert_eq!(outcome.completed_batches(), 1);
        assert_eq!(*seen.lock(), vec!["Jl. 0", "Jl. 1", "Jl. 2"]);
        // the shared column is cleared like any district column
        assert_eq!(outcome.dataset.cell(0, "alamat"), "");
    }

    #[test]
    fn test_merge_ignores_unknown_identifiers() {
        let mut ds = dataset(2);
        let merged = merge_items(
            &mut ds,
            &mapping(),
            "conversation_id",
            &[
                EnrichmentItem::new("c1", "Coblong", ""),
                EnrichmentItem::new("zzz", "Nowhere", "Nowhere"),
            ],
        );
        assert_eq!(merged, 1);
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.cell(1, "kecamatan"), "Coblong");
        assert_eq!(ds.cell(1, "kelurahan"), "");
    }

    #[test]
    fn test_run_rejects_unknown_mapping_column() {
        let orch = orchestrator(
            Arc::new(EchoExtractor::new(vec![])),
            Arc::new(NoopSleeper),
            EnrichmentConfig::default(),
        );
        let result = orch.run(dataset(1), &ColumnMapping::new("alamat", "kabupaten", "kelurahan"));
        assert!(matches!(result, Err(EnrichmentError::ColumnNotFound(_))));
        assert_eq!(orch.monitor().state(), RunState::Idle);
    }

    #[test]
    fn test_snapshot_progress() {
        let mut snapshot = RunSnapshot::default();
        assert_eq!(snapshot.progress(), 0.0);

        snapshot.state = RunState::Running;
        snapshot.batches = vec![Batch::new(1, Vec::new()), Batch::new(2, Vec::new())];
        snapshot.failed = 1;
        assert_eq!(snapshot.progress(), 0.5);

        snapshot.batches.clear();
        snapshot.failed = 0;
        snapshot.state = RunState::Done;
        assert_eq!(snapshot.progress(), 1.0);
    }
}
