use crate::{
    error::BulkError,
    execution::{handle::JobHandle, pool::WorkerPool},
};
use engine_config::{
    hooks::JobHooks,
    options::JobOptions,
    report::summary::CompletionSummary,
    settings::{error::SettingsError, validated::ValidatedOptions},
};
use engine_core::executor::RequestExecutor;
use engine_processing::{
    accumulator::{BatchAccumulator, Input},
    job::JobState,
    ops::{
        BatchOperation, read::ReadOperation, remove::RemoveOperation,
        transform::TransformOperation, write::WriteOperation,
    },
    partition::PartitionDirectory,
    query::{QueryContext, QueryWorker},
    resolver::DispositionResolver,
    snapshot::SnapshotCoordinator,
    tracker::CompletionTracker,
    worker::{BatchWorker, WorkerContext},
};
use model::{
    core::operation::Operation,
    partition::PartitionSet,
    records::document::{Document, ReadItem},
};
use serde_json::Value;
use std::{future::Future, sync::Arc};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{Instrument, info, info_span};

/// Outputs buffered between workers and the caller before workers block.
pub(crate) const OUTPUT_BUFFER: usize = 256;

/// Validates options against the operation and the shape of the input.
pub(crate) fn prepare<T: Send + 'static>(
    operation: Operation,
    options: &JobOptions<T>,
    input: &Input<T>,
) -> Result<ValidatedOptions, SettingsError> {
    let validated = options.validate(operation)?;
    let actual = input.kind();
    if actual != validated.input_kind {
        return Err(SettingsError::InputKindMismatch {
            expected: validated.input_kind,
            actual,
        });
    }
    Ok(validated)
}

/// Writes every document of `input`.
pub async fn write_all(
    executor: Arc<dyn RequestExecutor>,
    input: Input<Document>,
    options: JobOptions<Document>,
) -> Result<JobHandle<()>, BulkError> {
    let validated = prepare(Operation::Write, &options, &input)?;
    let operation = WriteOperation::new(&validated);
    start_batch_job(executor, operation, validated, options.hooks, input, None).await
}

/// Reads the documents named by the URIs of `input`.
pub async fn read_all(
    executor: Arc<dyn RequestExecutor>,
    input: Input<String>,
    options: JobOptions<String>,
) -> Result<JobHandle<ReadItem>, BulkError> {
    read_all_on(executor, input, options, None).await
}

/// Applies a server-side transform to the documents named by `input`.
pub async fn transform_all(
    executor: Arc<dyn RequestExecutor>,
    input: Input<String>,
    options: JobOptions<String>,
) -> Result<JobHandle<()>, BulkError> {
    transform_all_on(executor, input, options, None).await
}

/// Deletes the documents named by `input`.
pub async fn remove_all(
    executor: Arc<dyn RequestExecutor>,
    input: Input<String>,
    options: JobOptions<String>,
) -> Result<JobHandle<()>, BulkError> {
    remove_all_on(executor, input, options, None).await
}

/// Streams pages of the URIs matching `query`, one worker per forest.
pub async fn query_all(
    executor: Arc<dyn RequestExecutor>,
    query: Value,
    options: JobOptions<String>,
) -> Result<JobHandle<Vec<String>>, BulkError> {
    let validated = options.validate(Operation::QueryUris)?;
    start_query_job(executor, query, validated, options.hooks).await
}

pub(crate) async fn read_all_on(
    executor: Arc<dyn RequestExecutor>,
    input: Input<String>,
    options: JobOptions<String>,
    partitions: Option<Arc<PartitionSet>>,
) -> Result<JobHandle<ReadItem>, BulkError> {
    let validated = prepare(Operation::Read, &options, &input)?;
    let operation = ReadOperation::new(&validated);
    start_batch_job(executor, operation, validated, options.hooks, input, partitions).await
}

pub(crate) async fn transform_all_on(
    executor: Arc<dyn RequestExecutor>,
    input: Input<String>,
    options: JobOptions<String>,
    partitions: Option<Arc<PartitionSet>>,
) -> Result<JobHandle<()>, BulkError> {
    let validated = prepare(Operation::Transform, &options, &input)?;
    let operation = TransformOperation::new(&validated);
    start_batch_job(executor, operation, validated, options.hooks, input, partitions).await
}

pub(crate) async fn remove_all_on(
    executor: Arc<dyn RequestExecutor>,
    input: Input<String>,
    options: JobOptions<String>,
    partitions: Option<Arc<PartitionSet>>,
) -> Result<JobHandle<()>, BulkError> {
    let validated = prepare(Operation::Remove, &options, &input)?;
    start_batch_job(executor, RemoveOperation, validated, options.hooks, input, partitions).await
}

async fn resolve_partitions(
    executor: &Arc<dyn RequestExecutor>,
    partitions: Option<Arc<PartitionSet>>,
) -> Result<Arc<PartitionSet>, BulkError> {
    match partitions {
        Some(partitions) => Ok(partitions),
        None => {
            let discovered = PartitionDirectory::new(executor.clone()).discover().await?;
            Ok(Arc::new(discovered))
        }
    }
}

fn new_state<T>(
    operation: Operation,
    validated: &ValidatedOptions,
    hooks: &JobHooks<T>,
    partitions: &PartitionSet,
) -> Arc<JobState> {
    let worker_count = validated.worker_count(partitions);
    let snapshot = SnapshotCoordinator::new(
        validated.consistent_snapshot.clone(),
        hooks.on_initial_timestamp.clone(),
    );
    let state = Arc::new(JobState::new(operation, worker_count, snapshot));

    info!(
        job_id = %state.id(),
        operation = %operation,
        forests = partitions.forests().len(),
        hosts = partitions.hosts().len(),
        workers = worker_count,
        batch_size = validated.batch_size,
        snapshot = ?validated.consistent_snapshot,
        "Starting bulk job"
    );

    state
}

/// Spawns the task that runs the pool and then reports completion.
fn launch<O, F, Fut>(
    pool: WorkerPool,
    state: Arc<JobState>,
    tracker: CompletionTracker<O>,
    make_worker: F,
) -> JoinHandle<Result<CompletionSummary, BulkError>>
where
    O: Send + 'static,
    F: FnMut(usize) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let span = info_span!(
        "bulk_job",
        job_id = %state.id(),
        operation = %state.operation()
    );

    tokio::spawn(
        async move {
            pool.run(tracker.sender(), make_worker).await;
            Ok(tracker.finish())
        }
        .instrument(span),
    )
}

pub(crate) async fn start_batch_job<Op: BatchOperation>(
    executor: Arc<dyn RequestExecutor>,
    operation: Op,
    validated: ValidatedOptions,
    hooks: JobHooks<Op::Item>,
    input: Input<Op::Item>,
    partitions: Option<Arc<PartitionSet>>,
) -> Result<JobHandle<Op::Output>, BulkError> {
    let partitions = resolve_partitions(&executor, partitions).await?;
    let state = new_state(operation.operation(), &validated, &hooks, &partitions);

    let (tx, rx) = mpsc::channel(OUTPUT_BUFFER);
    let tracker = CompletionTracker::new(state.clone(), tx, hooks.on_completion.clone());
    let ctx = WorkerContext {
        state: state.clone(),
        executor,
        operation: Arc::new(operation),
        accumulator: Arc::new(BatchAccumulator::new(input, validated.batch_size)),
        resolver: Arc::new(DispositionResolver::new(hooks.on_batch_error)),
        retry_policy: validated.retry_policy.clone(),
        output: tracker.sender(),
        on_batch_success: hooks.on_batch_success,
    };

    let forests = partitions.clone();
    let pool = WorkerPool::new(state.clone(), state.worker_limit());
    let completion = launch(pool, state.clone(), tracker, move |index| {
        BatchWorker::new(index, forests.forest_for(index).clone(), ctx.clone()).run()
    });

    Ok(JobHandle::new(state, partitions, rx, completion))
}

pub(crate) async fn start_query_job(
    executor: Arc<dyn RequestExecutor>,
    query: Value,
    validated: ValidatedOptions,
    hooks: JobHooks<String>,
) -> Result<JobHandle<Vec<String>>, BulkError> {
    let partitions = resolve_partitions(&executor, None).await?;
    let state = new_state(Operation::QueryUris, &validated, &hooks, &partitions);

    let (tx, rx) = mpsc::channel(OUTPUT_BUFFER);
    let tracker = CompletionTracker::new(state.clone(), tx, hooks.on_completion.clone());
    let ctx = QueryContext {
        state: state.clone(),
        executor,
        query: Arc::new(query),
        page_length: validated.batch_size,
        retry_policy: validated.retry_policy.clone(),
        resolver: Arc::new(DispositionResolver::new(hooks.on_batch_error)),
        output: tracker.sender(),
        on_batch_success: hooks.on_batch_success,
    };

    let forests = partitions.clone();
    // Each query worker owns one forest, so a forest that ends early must not
    // keep the others from running.
    let pool = WorkerPool::new(state.clone(), state.worker_limit()).hand_off_first_dispatch();
    let completion = launch(pool, state.clone(), tracker, move |index| {
        QueryWorker::new(index, forests.forest_for(index).clone(), ctx.clone()).run()
    });

    Ok(JobHandle::new(state, partitions, rx, completion))
}
