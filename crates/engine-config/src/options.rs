use crate::{
    hooks::JobHooks,
    report::summary::{CompletionSummary, Progress},
    settings::{
        ConcurrentRequests, InputKind, JobSettings, OutputStreamType, TransformSpec,
        TransformStrategy, error::SettingsError, validated::ValidatedOptions,
        validator::SettingsValidator,
    },
};
use engine_core::{error::ExecutorError, retry::Disposition};
use model::{
    core::{identifiers::Timestamp, operation::Operation},
    partition::PartitionUnit,
    records::document::{Category, DocumentMetadata},
    snapshot::ConsistentSnapshot,
};
use std::{sync::Arc, time::Duration};

/// Options and callbacks for one bulk job over items of type `T`.
#[derive(Debug, Clone)]
pub struct JobOptions<T> {
    pub settings: JobSettings,
    pub hooks: JobHooks<T>,
}

impl<T> Default for JobOptions<T> {
    fn default() -> Self {
        Self {
            settings: JobSettings::default(),
            hooks: JobHooks::default(),
        }
    }
}

impl<T> JobOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the option keys from JSON; callbacks are attached afterwards.
    pub fn from_json(raw: &str) -> Result<Self, SettingsError> {
        Ok(Self {
            settings: serde_json::from_str(raw)?,
            hooks: JobHooks::default(),
        })
    }

    pub fn from_settings(settings: JobSettings) -> Self {
        Self {
            settings,
            hooks: JobHooks::default(),
        }
    }

    pub fn validate(&self, operation: Operation) -> Result<ValidatedOptions, SettingsError> {
        SettingsValidator::new(operation)
            .validate(&self.settings, self.hooks.on_initial_timestamp.is_some())
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.settings.batch_size = Some(batch_size);
        self
    }

    pub fn concurrent_requests(mut self, multiple_of: PartitionUnit, multiplier: usize) -> Self {
        self.settings.concurrent_requests = Some(ConcurrentRequests {
            multiple_of,
            multiplier,
        });
        self
    }

    pub fn input_kind(mut self, input_kind: InputKind) -> Self {
        self.settings.input_kind = Some(input_kind);
        self
    }

    pub fn output_stream_type(mut self, output: OutputStreamType) -> Self {
        self.settings.output_stream_type = Some(output);
        self
    }

    pub fn categories(mut self, categories: Vec<Category>) -> Self {
        self.settings.categories = Some(categories);
        self
    }

    pub fn transform(mut self, transform: TransformSpec) -> Self {
        self.settings.transform = Some(transform);
        self
    }

    pub fn transform_strategy(mut self, strategy: TransformStrategy) -> Self {
        self.settings.transform_strategy = Some(strategy);
        self
    }

    pub fn consistent_snapshot(mut self, mode: ConsistentSnapshot) -> Self {
        self.settings.consistent_snapshot = mode;
        self
    }

    pub fn default_metadata(mut self, metadata: DocumentMetadata) -> Self {
        self.settings.default_metadata = Some(metadata);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.settings.retry_delay_ms = Some(delay.as_millis() as u64);
        self
    }

    pub fn on_batch_success<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Progress) + Send + Sync + 'static,
    {
        self.hooks.on_batch_success = Some(Arc::new(hook));
        self
    }

    pub fn on_batch_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Progress, &[T], &ExecutorError) -> Disposition<T> + Send + Sync + 'static,
    {
        self.hooks.on_batch_error = Some(Arc::new(hook));
        self
    }

    pub fn on_completion<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CompletionSummary) + Send + Sync + 'static,
    {
        self.hooks.on_completion = Some(Arc::new(hook));
        self
    }

    pub fn on_initial_timestamp<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Timestamp) + Send + Sync + 'static,
    {
        self.hooks.on_initial_timestamp = Some(Arc::new(hook));
        self
    }
}
