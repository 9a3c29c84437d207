//! Batch orchestration for enrichment runs.

mod orchestrator;
mod progress;

pub use orchestrator::{
    NoopSleeper, Orchestrator, OrchestratorBuilder, RunMonitor, RunOutcome, RunSnapshot, Sleeper,
    ThreadSleeper, merge_items,
};
pub use progress::{
    CancellationToken, ClosureProgressReporter, ProgressReporter, ProgressUpdate, RunState,
};
