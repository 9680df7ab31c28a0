use crate::snapshot::SnapshotCoordinator;
use engine_config::report::summary::{CompletionSummary, Progress};
use engine_core::{error::JobError, metrics::Metrics};
use model::core::operation::Operation;
use std::{
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use uuid::Uuid;

/// State shared by every worker of one bulk job.
///
/// Counters only grow. The first fatal error is kept and is terminal: it
/// cancels the job token so no worker starts another dispatch.
pub struct JobState {
    id: Uuid,
    operation: Operation,
    started: Instant,
    metrics: Metrics,
    error: Mutex<Option<JobError>>,
    cancel: CancellationToken,
    live_workers: AtomicUsize,
    peak_workers: AtomicUsize,
    worker_limit: usize,
    snapshot: SnapshotCoordinator,
}

impl JobState {
    pub fn new(operation: Operation, worker_limit: usize, snapshot: SnapshotCoordinator) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation,
            started: Instant::now(),
            metrics: Metrics::new(),
            error: Mutex::new(None),
            cancel: CancellationToken::new(),
            live_workers: AtomicUsize::new(0),
            peak_workers: AtomicUsize::new(0),
            worker_limit,
            snapshot,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn snapshot(&self) -> &SnapshotCoordinator {
        &self.snapshot
    }

    pub fn worker_limit(&self) -> usize {
        self.worker_limit
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Records the job's fatal error. Returns `true` for the first error only;
    /// that caller is responsible for emitting it.
    pub fn fail(&self, err: JobError) -> bool {
        let mut slot = self.error.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            debug!(job_id = %self.id, error = %err, "Ignoring error after job already failed");
            return false;
        }

        error!(job_id = %self.id, operation = %self.operation, error = %err, "Bulk job failed");
        *slot = Some(err);
        self.cancel.cancel();
        true
    }

    pub fn error(&self) -> Option<JobError> {
        self.error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_failed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the job has failed.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    pub fn record_success(&self, count: u64) {
        self.metrics.increment_succeeded(count);
    }

    pub fn record_failure(&self, count: u64) {
        self.metrics.increment_failed(count);
    }

    pub fn record_batch(&self) {
        self.metrics.increment_batches(1);
    }

    pub fn record_retry(&self) {
        self.metrics.increment_retries(1);
    }

    pub fn progress(&self) -> Progress {
        let snapshot = self.metrics.snapshot();
        Progress {
            succeeded: snapshot.succeeded,
            failed: snapshot.failed,
            time_elapsed: self.elapsed(),
        }
    }

    pub fn summary(&self) -> CompletionSummary {
        let progress = self.progress();
        CompletionSummary {
            job_id: self.id,
            operation: self.operation,
            succeeded: progress.succeeded,
            failed: progress.failed,
            time_elapsed: progress.time_elapsed,
            error: self.error().map(|e| e.to_string()),
            consistent_snapshot_timestamp: self.snapshot.timestamp(),
        }
    }

    /// Registers a live worker; the count drops again when the guard does.
    pub fn enter_worker(self: &Arc<Self>, index: usize) -> WorkerGuard {
        let live = self.live_workers.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_workers.fetch_max(live, Ordering::SeqCst);
        debug!(job_id = %self.id, worker = index, live, "Worker started");
        WorkerGuard {
            state: Arc::clone(self),
            index,
        }
    }

    pub fn live_workers(&self) -> usize {
        self.live_workers.load(Ordering::SeqCst)
    }

    /// Most workers that were ever live at once.
    pub fn peak_workers(&self) -> usize {
        self.peak_workers.load(Ordering::SeqCst)
    }
}

pub struct WorkerGuard {
    state: Arc<JobState>,
    index: usize,
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        let live = self.state.live_workers.fetch_sub(1, Ordering::SeqCst) - 1;
        debug!(job_id = %self.state.id, worker = self.index, live, "Worker finished");
    }
}
