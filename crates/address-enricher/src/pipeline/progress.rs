//! Progress reporting and cancellation support for enrichment runs.
//!
//! This module provides types for tracking run progress and supporting
//! cancellation from external threads (e.g., a UI cancel button).
//!
//! # Example
//!
//! ```rust,ignore
//! use address_enricher::{CancellationToken, Orchestrator};
//!
//! let token = CancellationToken::new();
//! let token_clone = token.clone();
//!
//! std::thread::spawn(move || {
//!     std::thread::sleep(std::time::Duration::from_secs(5));
//!     token_clone.cancel();
//! });
//!
//! let outcome = Orchestrator::builder()
//!     .extractor(extractor)
//!     .cancellation_token(token)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.percent(), update.message);
//!     })
//!     .build()?
//!     .run(dataset, &mapping)?;
//! ```

use crate::types::{Batch, BatchStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// State of an enrichment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// No run has started yet.
    #[default]
    Idle,
    /// Batches are being submitted.
    Running,
    /// Every batch resolved, or the run was cancelled.
    Done,
}

impl RunState {
    /// Returns a human-readable name for the state.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Running => "Running",
            Self::Done => "Done",
        }
    }
}

/// Progress update emitted while a run advances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Run state at the time of the update
    pub run_state: RunState,

    /// Batch this update refers to (1-based), if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_index: Option<usize>,

    /// Total number of batches in the run
    pub total_batches: usize,

    /// Status of the referenced batch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_status: Option<BatchStatus>,

    /// Resolved batches / total batches (0.0 - 1.0)
    pub progress: f32,

    /// Human-readable message describing current activity
    pub message: String,

    /// Number of resolved batches
    pub items_processed: usize,

    /// Same as `total_batches`, kept for progress-bar consumers
    pub items_total: usize,
}

impl ProgressUpdate {
    fn ratio(resolved: usize, total: usize) -> f32 {
        if total == 0 {
            1.0
        } else {
            (resolved as f32 / total as f32).clamp(0.0, 1.0)
        }
    }

    /// Update emitted when a run starts.
    pub fn started(total_batches: usize) -> Self {
        Self {
            run_state: RunState::Running,
            batch_index: None,
            total_batches,
            batch_status: None,
            progress: 0.0,
            message: format!("Starting enrichment of {} batches", total_batches),
            items_processed: 0,
            items_total: total_batches,
        }
    }

    /// Update emitted for a batch transition.
    pub fn for_batch(
        batch: &Batch,
        resolved: usize,
        total_batches: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            run_state: RunState::Running,
            batch_index: Some(batch.index),
            total_batches,
            batch_status: Some(batch.status),
            progress: Self::ratio(resolved, total_batches),
            message: message.into(),
            items_processed: resolved,
            items_total: total_batches,
        }
    }

    /// Update emitted when the run reaches `Done`.
    pub fn done(resolved: usize, total_batches: usize, message: impl Into<String>) -> Self {
        Self {
            run_state: RunState::Done,
            batch_index: None,
            total_batches,
            batch_status: None,
            progress: Self::ratio(resolved, total_batches),
            message: message.into(),
            items_processed: resolved,
            items_total: total_batches,
        }
    }

    /// Progress as a percentage (0 - 100).
    pub fn percent(&self) -> f32 {
        self.progress * 100.0
    }
}

/// Trait for receiving progress updates during a run.
///
/// Implementations must be `Send + Sync` so the run can execute on a
/// background thread while a UI consumes the updates.
pub trait ProgressReporter: Send + Sync {
    /// Called after every batch transition and at start/end of the run.
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    /// Creates a new closure-based progress reporter.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

/// Token for cancelling a running enrichment.
///
/// Cloning shares the flag. The orchestrator checks it before each batch and
/// before each inter-batch delay; batches not yet started stay `pending` and
/// merges already applied are kept.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

static_assertions::assert_impl_all!(CancellationToken: Send, Sync);
static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

impl CancellationToken {
    /// Creates a new cancellation token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation of the run.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Reset the token for reuse in another run.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}
