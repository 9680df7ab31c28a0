use crate::{
    accumulator::{Accumulated, BatchAccumulator},
    error::BatchError,
    job::JobState,
    ops::{BatchOperation, BatchOutcome},
    resolver::{DispositionResolver, Resolution},
    tracker::OutputSender,
};
use engine_config::hooks::BatchSuccessHook;
use engine_core::{error::JobError, executor::RequestExecutor, retry::RetryPolicy};
use model::{core::identifiers::BatchId, partition::Forest, records::batch::Batch};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Stable short id for a worker's n-th batch within a job.
pub fn make_batch_id(job_id: &Uuid, worker: usize, sequence: u64) -> BatchId {
    let mut h = blake3::Hasher::new();
    h.update(job_id.as_bytes());
    h.update(&(worker as u64).to_le_bytes());
    h.update(&sequence.to_le_bytes());
    let hex = h.finalize().to_hex();
    BatchId::new(&hex.as_str()[..16])
}

/// Everything a batch worker shares with the other workers of its job.
pub struct WorkerContext<Op: BatchOperation> {
    pub state: Arc<JobState>,
    pub executor: Arc<dyn RequestExecutor>,
    pub operation: Arc<Op>,
    pub accumulator: Arc<BatchAccumulator<Op::Item>>,
    pub resolver: Arc<DispositionResolver<Op::Item>>,
    pub retry_policy: RetryPolicy,
    pub output: OutputSender<Op::Output>,
    pub on_batch_success: Option<BatchSuccessHook>,
}

impl<Op: BatchOperation> Clone for WorkerContext<Op> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            executor: self.executor.clone(),
            operation: self.operation.clone(),
            accumulator: self.accumulator.clone(),
            resolver: self.resolver.clone(),
            retry_policy: self.retry_policy.clone(),
            output: self.output.clone(),
            on_batch_success: self.on_batch_success.clone(),
        }
    }
}

/// Whether the worker keeps pulling batches after the current one.
enum Flow {
    Continue,
    Stop,
}

/// Loops accumulate, dispatch, handle outcome against one forest until the
/// input runs out or the job fails.
pub struct BatchWorker<Op: BatchOperation> {
    index: usize,
    forest: Forest,
    ctx: WorkerContext<Op>,
    sequence: u64,
}

impl<Op: BatchOperation> BatchWorker<Op> {
    pub fn new(index: usize, forest: Forest, ctx: WorkerContext<Op>) -> Self {
        Self {
            index,
            forest,
            ctx,
            sequence: 0,
        }
    }

    pub async fn run(mut self) {
        let state = self.ctx.state.clone();
        debug!(worker = self.index, forest = %self.forest.name, "Worker running");

        loop {
            if state.is_failed() {
                break;
            }

            let (items, last) = tokio::select! {
                biased;
                _ = state.cancelled() => break,
                next = self.ctx.accumulator.next_batch() => match next {
                    Accumulated::Full(items) => (items, false),
                    Accumulated::Last(items) => (items, true),
                    Accumulated::Exhausted => break,
                },
            };

            let batch_id = make_batch_id(&state.id(), self.index, self.sequence);
            let batch = Batch::new(batch_id, items);
            self.sequence += 1;

            if let Flow::Stop = self.process(batch).await {
                break;
            }
            if last {
                break;
            }
        }

        debug!(worker = self.index, batches = self.sequence, "Worker exiting");
    }

    async fn process(&self, mut batch: Batch<Op::Item>) -> Flow {
        let state = &self.ctx.state;
        let mut budget = self.ctx.retry_policy.budget();

        loop {
            if state.is_failed() {
                return Flow::Stop;
            }

            debug!(
                batch_id = %batch.id,
                forest = %self.forest.name,
                items = batch.len(),
                attempt = batch.attempt,
                "Dispatching batch"
            );

            let error = match self.dispatch(&batch).await {
                Ok(outcome) => return self.complete(&batch, outcome).await,
                Err(BatchError::Fatal(err)) => {
                    state.record_failure(batch.len() as u64);
                    self.abort(err).await;
                    return Flow::Stop;
                }
                Err(BatchError::Request(error)) => error,
            };

            warn!(
                batch_id = %batch.id,
                forest = %self.forest.name,
                attempt = batch.attempt,
                error = %error,
                "Batch failed"
            );

            let count = batch.len() as u64;
            let items = std::mem::take(&mut batch.items);
            let progress = state.progress();
            match self
                .ctx
                .resolver
                .resolve(&batch.id, &progress, items, &error, &mut budget)
            {
                Resolution::Retry(items) => {
                    state.record_retry();
                    self.ctx.retry_policy.wait(batch.attempt).await;
                    batch.retry_with(items);
                }
                Resolution::Skip => {
                    info!(batch_id = %batch.id, items = count, "Skipping failed batch");
                    state.record_failure(count);
                    return Flow::Continue;
                }
                Resolution::Abort(err) => {
                    state.record_failure(count);
                    self.abort(err).await;
                    return Flow::Stop;
                }
            }
        }
    }

    async fn dispatch(
        &self,
        batch: &Batch<Op::Item>,
    ) -> Result<BatchOutcome<Op::Output>, BatchError> {
        let snapshot = self.ctx.state.snapshot();
        let timestamp = snapshot.timestamp();
        let request =
            self.ctx
                .operation
                .build_request(&self.forest, &batch.items, timestamp.as_ref());

        let response = self.ctx.executor.dispatch(request).await?;
        snapshot.observe(&response, &self.forest.name)?;

        Ok(self.ctx.operation.handle_response(&batch.items, response)?)
    }

    async fn complete(&self, batch: &Batch<Op::Item>, outcome: BatchOutcome<Op::Output>) -> Flow {
        let state = &self.ctx.state;
        state.record_success(outcome.succeeded);
        state.record_failure(outcome.failed);
        state.record_batch();

        debug!(
            batch_id = %batch.id,
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            "Batch completed"
        );

        for output in outcome.outputs {
            if self.ctx.output.send(Ok(output)).await.is_err() {
                warn!(worker = self.index, "Output stream closed; stopping worker");
                return Flow::Stop;
            }
        }

        if let Some(hook) = &self.ctx.on_batch_success {
            hook(&state.progress());
        }

        if state.is_failed() {
            Flow::Stop
        } else {
            Flow::Continue
        }
    }

    async fn abort(&self, err: JobError) {
        if self.ctx.state.fail(err.clone()) {
            let _ = self.ctx.output.send(Err(err)).await;
        }
    }
}
