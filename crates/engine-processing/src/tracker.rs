use crate::job::JobState;
use engine_config::{hooks::CompletionHook, report::summary::CompletionSummary};
use engine_core::error::JobError;
use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

pub type OutputSender<O> = mpsc::Sender<Result<O, JobError>>;

/// Ends a job: closes its output stream, then reports the summary once.
pub struct CompletionTracker<O> {
    state: Arc<JobState>,
    output: OutputSender<O>,
    on_completion: Option<CompletionHook>,
}

impl<O> CompletionTracker<O> {
    pub fn new(
        state: Arc<JobState>,
        output: OutputSender<O>,
        on_completion: Option<CompletionHook>,
    ) -> Self {
        Self {
            state,
            output,
            on_completion,
        }
    }

    /// Sender for a worker; the stream ends once every clone and the tracker are gone.
    pub fn sender(&self) -> OutputSender<O> {
        self.output.clone()
    }

    /// Call after every worker has exited.
    pub fn finish(self) -> CompletionSummary {
        let Self {
            state,
            output,
            on_completion,
        } = self;

        let live = state.live_workers();
        if live > 0 {
            warn!(job_id = %state.id(), live, "Finishing job with workers still registered");
        }
        drop(output);

        let summary = state.summary();
        let metrics = state.metrics().snapshot();
        info!(
            job_id = %summary.job_id,
            operation = %summary.operation,
            succeeded = summary.succeeded,
            failed = summary.failed,
            batches = metrics.batches,
            retries = metrics.retries,
            elapsed_ms = summary.time_elapsed.as_millis() as u64,
            error = summary.error.as_deref().unwrap_or(""),
            "Bulk job completed"
        );

        if let Some(hook) = on_completion {
            if catch_unwind(AssertUnwindSafe(|| hook(&summary))).is_err() {
                warn!(job_id = %summary.job_id, "Completion callback panicked");
            }
        }

        summary
    }
}
