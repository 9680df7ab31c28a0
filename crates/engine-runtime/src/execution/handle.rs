use crate::error::BulkError;
use engine_config::report::summary::{CompletionSummary, Progress};
use engine_core::error::JobError;
use engine_processing::job::JobState;
use futures::Stream;
use model::{
    core::{identifiers::Timestamp, operation::Operation},
    partition::PartitionSet,
};
use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tokio::{sync::mpsc, task::JoinHandle};
use uuid::Uuid;

/// A running bulk job.
///
/// Yields the job's outputs as workers produce them; a fatal error shows up
/// once as an `Err` item. Write-style jobs yield nothing but that error.
/// The stream must be drained (or the handle closed) for the job to make
/// progress, which [`JobHandle::finish`] does.
///
/// Handles returned by the query pipelines describe the query job; see
/// [`compose`](crate::execution::pipeline::compose).
pub struct JobHandle<O> {
    state: Arc<JobState>,
    partitions: Arc<PartitionSet>,
    output: mpsc::Receiver<Result<O, JobError>>,
    completion: JoinHandle<Result<CompletionSummary, BulkError>>,
}

/// Everything a job produced, collected.
#[derive(Debug)]
pub struct JobOutput<O> {
    pub items: Vec<O>,
    pub errors: Vec<JobError>,
    pub summary: CompletionSummary,
}

impl<O> JobHandle<O> {
    pub(crate) fn new(
        state: Arc<JobState>,
        partitions: Arc<PartitionSet>,
        output: mpsc::Receiver<Result<O, JobError>>,
        completion: JoinHandle<Result<CompletionSummary, BulkError>>,
    ) -> Self {
        Self {
            state,
            partitions,
            output,
            completion,
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.state.id()
    }

    pub fn operation(&self) -> Operation {
        self.state.operation()
    }

    pub fn partitions(&self) -> &Arc<PartitionSet> {
        &self.partitions
    }

    /// Number of workers the job runs with.
    pub fn worker_count(&self) -> usize {
        self.state.worker_limit()
    }

    pub fn snapshot_timestamp(&self) -> Option<Timestamp> {
        self.state.snapshot().timestamp()
    }

    pub fn progress(&self) -> Progress {
        self.state.progress()
    }

    pub(crate) fn state(&self) -> &Arc<JobState> {
        &self.state
    }

    pub async fn next(&mut self) -> Option<Result<O, JobError>> {
        self.output.recv().await
    }

    /// Stops taking output; workers stop once their next send fails.
    pub fn close(&mut self) {
        self.output.close();
    }

    /// Discards remaining output and waits for the completion summary.
    pub async fn finish(mut self) -> Result<CompletionSummary, BulkError> {
        while self.output.recv().await.is_some() {}
        self.completion.await?
    }

    pub async fn collect(mut self) -> Result<JobOutput<O>, BulkError> {
        let mut items = Vec::new();
        let mut errors = Vec::new();
        while let Some(next) = self.output.recv().await {
            match next {
                Ok(item) => items.push(item),
                Err(err) => errors.push(err),
            }
        }

        let summary = self.completion.await??;
        Ok(JobOutput {
            items,
            errors,
            summary,
        })
    }
}

impl<O> Stream for JobHandle<O> {
    type Item = Result<O, JobError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().output.poll_recv(cx)
    }
}
