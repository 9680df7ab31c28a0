use crate::settings::{InputKind, OutputStreamType, TransformSpec, TransformStrategy};
use engine_core::retry::RetryPolicy;
use model::{
    core::operation::Operation,
    partition::{PartitionSet, PartitionUnit},
    records::document::{Category, DocumentMetadata},
    snapshot::ConsistentSnapshot,
};
use std::time::Duration;

/// Largest batch (or query page) a job may request.
pub const MAX_BATCH_SIZE: usize = 100_000;

pub const DEFAULT_MULTIPLIER: usize = 4;

pub fn default_batch_size(operation: Operation) -> usize {
    match operation {
        Operation::Write => 100,
        Operation::Read => 250,
        Operation::QueryUris => 1000,
        Operation::Transform => 100,
        Operation::Remove => 100,
    }
}

pub fn default_retry_policy(operation: Operation) -> RetryPolicy {
    match operation {
        Operation::Read => RetryPolicy::for_reads(),
        _ => RetryPolicy::for_writes(),
    }
}

/// Immutable, validated configuration for one bulk job.
#[derive(Debug, Clone)]
pub struct ValidatedOptions {
    pub operation: Operation,
    /// Items per batch; the page length for query jobs.
    pub batch_size: usize,
    pub input_kind: InputKind,
    pub partition_unit: PartitionUnit,
    pub multiplier: usize,
    pub output_stream_type: OutputStreamType,
    pub categories: Vec<Category>,
    pub transform: Option<TransformSpec>,
    pub transform_strategy: TransformStrategy,
    pub consistent_snapshot: ConsistentSnapshot,
    pub default_metadata: Option<DocumentMetadata>,
    pub retry_policy: RetryPolicy,
}

impl ValidatedOptions {
    pub fn default(operation: Operation) -> Self {
        ValidatedOptionsBuilder::new(operation).build()
    }

    pub fn from_builder(builder: ValidatedOptionsBuilder) -> Self {
        let operation = builder.operation;
        let mut retry_policy = default_retry_policy(operation);
        if let Some(delay) = builder.retry_delay {
            retry_policy = retry_policy.with_base_delay(delay);
        }

        Self {
            operation,
            batch_size: builder
                .batch_size
                .unwrap_or_else(|| default_batch_size(operation)),
            input_kind: builder.input_kind.unwrap_or_default(),
            partition_unit: builder.partition_unit.unwrap_or_default(),
            multiplier: builder.multiplier.unwrap_or(DEFAULT_MULTIPLIER),
            output_stream_type: builder.output_stream_type.unwrap_or_default(),
            categories: builder
                .categories
                .unwrap_or_else(|| vec![Category::Content]),
            transform: builder.transform,
            transform_strategy: builder.transform_strategy.unwrap_or_default(),
            consistent_snapshot: builder.consistent_snapshot.unwrap_or_default(),
            default_metadata: builder.default_metadata,
            retry_policy,
        }
    }

    /// Number of concurrent workers for the given partitions.
    ///
    /// Query jobs always page one worker per forest.
    pub fn worker_count(&self, partitions: &PartitionSet) -> usize {
        match self.operation {
            Operation::QueryUris => partitions.cardinality(PartitionUnit::Forests),
            _ => self.multiplier * partitions.cardinality(self.partition_unit),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

#[derive(Debug)]
pub struct ValidatedOptionsBuilder {
    pub operation: Operation,
    pub batch_size: Option<usize>,
    pub input_kind: Option<InputKind>,
    pub partition_unit: Option<PartitionUnit>,
    pub multiplier: Option<usize>,
    pub output_stream_type: Option<OutputStreamType>,
    pub categories: Option<Vec<Category>>,
    pub transform: Option<TransformSpec>,
    pub transform_strategy: Option<TransformStrategy>,
    pub consistent_snapshot: Option<ConsistentSnapshot>,
    pub default_metadata: Option<DocumentMetadata>,
    pub retry_delay: Option<Duration>,
}

impl ValidatedOptionsBuilder {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            batch_size: None,
            input_kind: None,
            partition_unit: None,
            multiplier: None,
            output_stream_type: None,
            categories: None,
            transform: None,
            transform_strategy: None,
            consistent_snapshot: None,
            default_metadata: None,
            retry_delay: None,
        }
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn input_kind(mut self, input_kind: InputKind) -> Self {
        self.input_kind = Some(input_kind);
        self
    }

    pub fn concurrency(mut self, unit: PartitionUnit, multiplier: usize) -> Self {
        self.partition_unit = Some(unit);
        self.multiplier = Some(multiplier);
        self
    }

    pub fn transform(mut self, transform: TransformSpec) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn consistent_snapshot(mut self, mode: ConsistentSnapshot) -> Self {
        self.consistent_snapshot = Some(mode);
        self
    }

    pub fn build(self) -> ValidatedOptions {
        ValidatedOptions::from_builder(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::partition::Forest;

    fn partitions() -> PartitionSet {
        PartitionSet::new(vec![
            Forest::new("f1", "h1"),
            Forest::new("f2", "h1"),
            Forest::new("f3", "h2"),
        ])
        .unwrap()
    }

    #[test]
    fn defaults_follow_the_operation() {
        let write = ValidatedOptions::default(Operation::Write);
        assert_eq!(write.batch_size(), 100);
        assert_eq!(write.retry_policy.max_retries, 2);
        assert_eq!(write.multiplier, 4);

        let read = ValidatedOptions::default(Operation::Read);
        assert_eq!(read.batch_size(), 250);
        assert_eq!(read.retry_policy.max_retries, 100);
        assert!(read.categories.contains(&Category::Content));

        assert_eq!(ValidatedOptions::default(Operation::QueryUris).batch_size(), 1000);
    }

    #[test]
    fn worker_count_scales_with_partition_unit() {
        let by_forest = ValidatedOptionsBuilder::new(Operation::Write)
            .concurrency(PartitionUnit::Forests, 4)
            .build();
        assert_eq!(by_forest.worker_count(&partitions()), 12);

        let by_host = ValidatedOptionsBuilder::new(Operation::Write)
            .concurrency(PartitionUnit::Hosts, 4)
            .build();
        assert_eq!(by_host.worker_count(&partitions()), 8);
    }

    #[test]
    fn query_runs_one_worker_per_forest() {
        let query = ValidatedOptions::default(Operation::QueryUris);
        assert_eq!(query.worker_count(&partitions()), 3);
    }
}
