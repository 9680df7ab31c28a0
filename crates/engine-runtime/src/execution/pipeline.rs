use crate::{
    error::BulkError,
    execution::{
        handle::JobHandle,
        jobs::{OUTPUT_BUFFER, read_all_on, remove_all_on, start_query_job, transform_all_on},
    },
};
use engine_config::{
    hooks::CompletionHook, options::JobOptions, report::summary::CompletionSummary,
    settings::InputKind,
};
use engine_core::{error::JobError, executor::RequestExecutor};
use engine_processing::{accumulator::Input, tracker::OutputSender};
use futures::{StreamExt, stream};
use model::{
    core::operation::Operation, partition::PartitionSet, records::document::ReadItem,
    snapshot::ConsistentSnapshot,
};
use serde_json::Value;
use std::{
    future::Future,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};
use tokio::sync::mpsc;
use tracing::{Instrument, debug, info, info_span, warn};

/// URI pages queued between a query and its consumer.
const PAGE_BUFFER: usize = 4;

/// Reads every document matching `query`.
pub async fn query_to_read_all(
    executor: Arc<dyn RequestExecutor>,
    query: Value,
    query_options: JobOptions<String>,
    read_options: JobOptions<String>,
) -> Result<JobHandle<ReadItem>, BulkError> {
    let consumer_executor = executor.clone();
    compose(
        executor,
        query,
        query_options,
        Operation::Read,
        read_options,
        move |input, options, partitions| async move {
            read_all_on(consumer_executor, input, options, Some(partitions)).await
        },
    )
    .await
}

/// Transforms every document matching `query`.
pub async fn query_to_transform_all(
    executor: Arc<dyn RequestExecutor>,
    query: Value,
    query_options: JobOptions<String>,
    transform_options: JobOptions<String>,
) -> Result<JobHandle<()>, BulkError> {
    let consumer_executor = executor.clone();
    compose(
        executor,
        query,
        query_options,
        Operation::Transform,
        transform_options,
        move |input, options, partitions| async move {
            transform_all_on(consumer_executor, input, options, Some(partitions)).await
        },
    )
    .await
}

/// Deletes every document matching `query`.
pub async fn query_to_remove_all(
    executor: Arc<dyn RequestExecutor>,
    query: Value,
    query_options: JobOptions<String>,
    remove_options: JobOptions<String>,
) -> Result<JobHandle<()>, BulkError> {
    let consumer_executor = executor.clone();
    compose(
        executor,
        query,
        query_options,
        Operation::Remove,
        remove_options,
        move |input, options, partitions| async move {
            remove_all_on(consumer_executor, input, options, Some(partitions)).await
        },
    )
    .await
}

/// Feeds the URI pages of a query job into a consumer job.
///
/// Pages become whole consumer batches when the query pages more than one
/// URI at a time, and single items otherwise. The consumer is started on the
/// first non-empty page, so a query that matches nothing never starts one.
/// The returned handle streams the consumer's outputs together with errors
/// from either job, and `finish` yields the consumer's summary. Its job id,
/// operation, progress and worker count are those of the query job, which is
/// the only job guaranteed to exist.
pub async fn compose<O, F, Fut>(
    executor: Arc<dyn RequestExecutor>,
    query: Value,
    query_options: JobOptions<String>,
    consumer_operation: Operation,
    mut consumer_options: JobOptions<String>,
    start_consumer: F,
) -> Result<JobHandle<O>, BulkError>
where
    O: Send + 'static,
    F: FnOnce(Input<String>, JobOptions<String>, Arc<PartitionSet>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<JobHandle<O>, BulkError>> + Send + 'static,
{
    let producer_options = query_options.validate(Operation::QueryUris)?;
    let input_kind = if producer_options.batch_size > 1 {
        InputKind::Arrays
    } else {
        InputKind::Items
    };
    consumer_options.settings.input_kind = Some(input_kind);
    consumer_options.validate(consumer_operation)?;
    let on_completion = consumer_options.hooks.on_completion.take();

    let producer = start_query_job(executor, query, producer_options, query_options.hooks).await?;
    let state = producer.state().clone();
    let partitions = producer.partitions().clone();

    let span = info_span!(
        "pipeline",
        job_id = %state.id(),
        consumer = %consumer_operation
    );
    let (tx, rx) = mpsc::channel(OUTPUT_BUFFER);
    let completion = tokio::spawn(
        run_composite(
            producer,
            Consumer {
                operation: consumer_operation,
                input_kind,
                options: consumer_options,
                start: start_consumer,
            },
            tx,
            on_completion,
        )
        .instrument(span),
    );

    Ok(JobHandle::new(state, partitions, rx, completion))
}

struct Consumer<F> {
    operation: Operation,
    input_kind: InputKind,
    options: JobOptions<String>,
    start: F,
}

async fn run_composite<O, F, Fut>(
    mut producer: JobHandle<Vec<String>>,
    consumer: Consumer<F>,
    output: OutputSender<O>,
    on_completion: Option<CompletionHook>,
) -> Result<CompletionSummary, BulkError>
where
    O: Send + 'static,
    F: FnOnce(Input<String>, JobOptions<String>, Arc<PartitionSet>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<JobHandle<O>, BulkError>> + Send + 'static,
{
    let summary = match first_page(&mut producer, &output).await {
        None => {
            info!(job_id = %producer.job_id(), "Query matched nothing; consumer not started");
            producer.finish().await?
        }
        Some(first) => {
            let Consumer {
                operation,
                input_kind,
                mut options,
                start,
            } = consumer;

            if options.settings.consistent_snapshot == ConsistentSnapshot::Off
                && operation.supports_snapshot()
            {
                if let Some(ts) = producer.snapshot_timestamp() {
                    debug!(timestamp = %ts, "Pinning consumer to the query's snapshot");
                    options.settings.consistent_snapshot = ConsistentSnapshot::At(ts);
                }
            }

            let (page_tx, page_rx) = mpsc::channel(PAGE_BUFFER);
            let input = page_input(page_rx, input_kind);
            let partitions = producer.partitions().clone();

            match start(input, options, partitions).await {
                Ok(consumer) => pump(producer, consumer, first, page_tx, &output).await?,
                Err(err) => {
                    warn!(error = %err, "Consumer job failed to start");
                    let failure = JobError::Consumer(err.to_string());
                    let _ = output.send(Err(failure.clone())).await;
                    producer.close();
                    let mut summary = producer.finish().await?;
                    summary.error.get_or_insert_with(|| failure.to_string());
                    summary
                }
            }
        }
    };

    drop(output);
    if let Some(hook) = on_completion {
        if catch_unwind(AssertUnwindSafe(|| hook(&summary))).is_err() {
            warn!(job_id = %summary.job_id, "Completion callback panicked");
        }
    }

    Ok(summary)
}

fn page_input(pages: mpsc::Receiver<Vec<String>>, kind: InputKind) -> Input<String> {
    match kind {
        InputKind::Arrays => Input::from_batch_receiver(pages),
        InputKind::Items => Input::items(
            stream::unfold(pages, |mut pages| async move {
                pages.recv().await.map(|page| (page, pages))
            })
            .flat_map(stream::iter),
        ),
    }
}

/// Waits for the first non-empty page, forwarding query errors meanwhile.
async fn first_page<O>(
    producer: &mut JobHandle<Vec<String>>,
    output: &OutputSender<O>,
) -> Option<Vec<String>> {
    while let Some(next) = producer.next().await {
        match next {
            Ok(page) if !page.is_empty() => return Some(page),
            Ok(_) => {}
            Err(err) => {
                let _ = output.send(Err(err)).await;
            }
        }
    }
    None
}

async fn pump<O: Send + 'static>(
    mut producer: JobHandle<Vec<String>>,
    mut consumer: JobHandle<O>,
    first: Vec<String>,
    page_tx: mpsc::Sender<Vec<String>>,
    output: &OutputSender<O>,
) -> Result<CompletionSummary, BulkError> {
    let errors = output.clone();
    let feeder = tokio::spawn(
        async move {
            let mut pending = Some(first);
            loop {
                let page = match pending.take() {
                    Some(page) => page,
                    None => match producer.next().await {
                        Some(Ok(page)) => page,
                        Some(Err(err)) => {
                            let _ = errors.send(Err(err)).await;
                            continue;
                        }
                        None => break,
                    },
                };

                if page_tx.send(page).await.is_err() {
                    debug!("Consumer stopped taking pages; closing query");
                    producer.close();
                    break;
                }
            }

            drop(page_tx);
            producer.finish().await
        }
        .in_current_span(),
    );

    while let Some(next) = consumer.next().await {
        if output.send(next).await.is_err() {
            debug!("Pipeline output closed; closing consumer");
            consumer.close();
            break;
        }
    }

    let mut summary = consumer.finish().await?;
    match feeder.await? {
        Ok(query) => {
            if summary.error.is_none() {
                summary.error = query.error;
            }
        }
        Err(err) => warn!(error = %err, "Query job did not report a summary"),
    }

    Ok(summary)
}
