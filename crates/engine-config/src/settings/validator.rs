use crate::settings::{
    InputKind, JobSettings,
    error::SettingsError,
    validated::{MAX_BATCH_SIZE, ValidatedOptions, ValidatedOptionsBuilder},
};
use model::core::operation::Operation;
use std::time::Duration;
use tracing::{debug, warn};

/// Validates job options for one operation before the job starts.
pub struct SettingsValidator {
    operation: Operation,
}

impl SettingsValidator {
    pub fn new(operation: Operation) -> Self {
        Self { operation }
    }

    /// `has_initial_timestamp_hook` reports whether the caller registered an
    /// initial timestamp callback, which needs a consistent snapshot.
    pub fn validate(
        &self,
        settings: &JobSettings,
        has_initial_timestamp_hook: bool,
    ) -> Result<ValidatedOptions, SettingsError> {
        let mut builder = ValidatedOptionsBuilder::new(self.operation);
        let mut errors: Vec<String> = Vec::new();

        self.validate_input_kind(settings, &mut builder, &mut errors);
        self.validate_batch_size(settings, &mut builder, &mut errors);
        self.validate_concurrency(settings, &mut builder, &mut errors);
        self.validate_read_output(settings, &mut builder, &mut errors);
        self.validate_transform(settings, &mut builder, &mut errors);
        self.validate_snapshot(settings, has_initial_timestamp_hook, &mut builder, &mut errors);
        self.validate_default_metadata(settings, &mut builder, &mut errors);

        if let Some(ms) = settings.retry_delay_ms {
            builder.retry_delay = Some(Duration::from_millis(ms));
        }

        if !errors.is_empty() {
            warn!(operation = %self.operation, errors = ?errors, "Rejected job options");
            return Err(SettingsError::ValidationFailed(errors));
        }

        let validated = builder.build();
        debug!(
            operation = %self.operation,
            batch_size = validated.batch_size,
            input_kind = %validated.input_kind,
            multiplier = validated.multiplier,
            snapshot = ?validated.consistent_snapshot,
            "Job options validated"
        );

        Ok(validated)
    }

    fn unsupported(&self, option: &str, errors: &mut Vec<String>) {
        errors.push(format!(
            "{option} is not supported for {} jobs",
            self.operation
        ));
    }

    fn validate_input_kind(
        &self,
        settings: &JobSettings,
        builder: &mut ValidatedOptionsBuilder,
        errors: &mut Vec<String>,
    ) {
        let Some(kind) = settings.input_kind else {
            return;
        };

        if self.operation == Operation::QueryUris {
            self.unsupported("inputKind", errors);
            return;
        }
        builder.input_kind = Some(kind);
    }

    fn validate_batch_size(
        &self,
        settings: &JobSettings,
        builder: &mut ValidatedOptionsBuilder,
        errors: &mut Vec<String>,
    ) {
        let Some(size) = settings.batch_size else {
            return;
        };

        if size == 0 || size > MAX_BATCH_SIZE {
            errors.push(format!(
                "batchSize must be between 1 and {MAX_BATCH_SIZE}, got {size}"
            ));
            return;
        }

        if settings.input_kind == Some(InputKind::Arrays) {
            errors.push(
                "batchSize cannot be set when the input yields whole batches (inputKind: array)"
                    .to_string(),
            );
            return;
        }

        builder.batch_size = Some(size);
    }

    fn validate_concurrency(
        &self,
        settings: &JobSettings,
        builder: &mut ValidatedOptionsBuilder,
        errors: &mut Vec<String>,
    ) {
        let Some(concurrency) = settings.concurrent_requests else {
            return;
        };

        if self.operation == Operation::QueryUris {
            self.unsupported("concurrentRequests", errors);
            return;
        }

        if concurrency.multiplier == 0 {
            errors.push("concurrentRequests.multiplier must be at least 1".to_string());
            return;
        }

        builder.partition_unit = Some(concurrency.multiple_of);
        builder.multiplier = Some(concurrency.multiplier);
    }

    fn validate_read_output(
        &self,
        settings: &JobSettings,
        builder: &mut ValidatedOptionsBuilder,
        errors: &mut Vec<String>,
    ) {
        let is_read = self.operation == Operation::Read;

        if let Some(categories) = &settings.categories {
            if !is_read {
                self.unsupported("categories", errors);
            } else if categories.is_empty() {
                errors.push("categories must name at least one category".to_string());
            } else {
                builder.categories = Some(categories.clone());
            }
        }

        if let Some(output) = settings.output_stream_type {
            if is_read {
                builder.output_stream_type = Some(output);
            } else {
                self.unsupported("outputStreamType", errors);
            }
        }
    }

    fn validate_transform(
        &self,
        settings: &JobSettings,
        builder: &mut ValidatedOptionsBuilder,
        errors: &mut Vec<String>,
    ) {
        match (&settings.transform, self.operation) {
            (None, Operation::Transform) => {
                errors.push("transform is required for transform jobs".to_string());
            }
            (Some(_), Operation::Remove | Operation::QueryUris) => {
                self.unsupported("transform", errors);
            }
            (Some(spec), _) if spec.name.trim().is_empty() => {
                errors.push("transform name must not be empty".to_string());
            }
            (Some(spec), _) => builder.transform = Some(spec.clone()),
            (None, _) => {}
        }

        if let Some(strategy) = settings.transform_strategy {
            if self.operation == Operation::Transform {
                builder.transform_strategy = Some(strategy);
            } else {
                self.unsupported("transformStrategy", errors);
            }
        }
    }

    fn validate_snapshot(
        &self,
        settings: &JobSettings,
        has_initial_timestamp_hook: bool,
        builder: &mut ValidatedOptionsBuilder,
        errors: &mut Vec<String>,
    ) {
        let mode = &settings.consistent_snapshot;

        if mode.is_enabled() && !self.operation.supports_snapshot() {
            self.unsupported("consistentSnapshot", errors);
            return;
        }

        if has_initial_timestamp_hook && !mode.is_enabled() {
            errors.push(
                "onInitialTimestamp requires consistentSnapshot to be true or a timestamp"
                    .to_string(),
            );
            return;
        }

        builder.consistent_snapshot = Some(mode.clone());
    }

    fn validate_default_metadata(
        &self,
        settings: &JobSettings,
        builder: &mut ValidatedOptionsBuilder,
        errors: &mut Vec<String>,
    ) {
        let Some(metadata) = &settings.default_metadata else {
            return;
        };

        if self.operation != Operation::Write {
            self.unsupported("defaultMetadata", errors);
            return;
        }
        builder.default_metadata = Some(metadata.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{ConcurrentRequests, TransformSpec};
    use model::{
        core::identifiers::Timestamp, partition::PartitionUnit, snapshot::ConsistentSnapshot,
    };

    fn errors_of(result: Result<ValidatedOptions, SettingsError>) -> Vec<String> {
        match result {
            Err(SettingsError::ValidationFailed(errors)) => errors,
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn batch_size_must_be_in_range() {
        let validator = SettingsValidator::new(Operation::Write);
        for size in [0, MAX_BATCH_SIZE + 1] {
            let settings = JobSettings {
                batch_size: Some(size),
                ..Default::default()
            };
            let errors = errors_of(validator.validate(&settings, false));
            assert!(errors[0].contains("batchSize"));
        }

        let settings = JobSettings {
            batch_size: Some(MAX_BATCH_SIZE),
            ..Default::default()
        };
        let validated = validator.validate(&settings, false).unwrap();
        assert_eq!(validated.batch_size, MAX_BATCH_SIZE);
    }

    #[test]
    fn batch_size_conflicts_with_array_input() {
        let settings = JobSettings {
            batch_size: Some(10),
            input_kind: Some(InputKind::Arrays),
            ..Default::default()
        };
        let errors = errors_of(SettingsValidator::new(Operation::Read).validate(&settings, false));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("inputKind: array"));
    }

    #[test]
    fn zero_multiplier_is_rejected() {
        let settings = JobSettings {
            concurrent_requests: Some(ConcurrentRequests {
                multiple_of: PartitionUnit::Hosts,
                multiplier: 0,
            }),
            ..Default::default()
        };
        let errors = errors_of(SettingsValidator::new(Operation::Remove).validate(&settings, false));
        assert!(errors[0].contains("multiplier"));
    }

    #[test]
    fn transform_jobs_need_a_transform() {
        let errors = errors_of(
            SettingsValidator::new(Operation::Transform).validate(&JobSettings::default(), false),
        );
        assert!(errors[0].contains("required"));

        let settings = JobSettings {
            transform: Some(TransformSpec::new("enrich")),
            ..Default::default()
        };
        let errors = errors_of(SettingsValidator::new(Operation::Remove).validate(&settings, false));
        assert!(errors[0].contains("not supported for remove"));
    }

    #[test]
    fn initial_timestamp_hook_needs_a_snapshot() {
        let validator = SettingsValidator::new(Operation::Read);
        let errors = errors_of(validator.validate(&JobSettings::default(), true));
        assert!(errors[0].contains("onInitialTimestamp"));

        let settings = JobSettings {
            consistent_snapshot: ConsistentSnapshot::At(Timestamp::from("42")),
            ..Default::default()
        };
        assert!(validator.validate(&settings, true).is_ok());
    }

    #[test]
    fn snapshot_is_rejected_for_writes() {
        let settings = JobSettings {
            consistent_snapshot: ConsistentSnapshot::Latest,
            ..Default::default()
        };
        let errors = errors_of(SettingsValidator::new(Operation::Write).validate(&settings, false));
        assert!(errors[0].contains("consistentSnapshot"));
    }

    #[test]
    fn every_problem_is_reported() {
        let settings = JobSettings {
            batch_size: Some(0),
            concurrent_requests: Some(ConcurrentRequests::default()),
            input_kind: Some(InputKind::Items),
            ..Default::default()
        };
        let errors =
            errors_of(SettingsValidator::new(Operation::QueryUris).validate(&settings, false));
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn retry_delay_feeds_the_policy() {
        let settings = JobSettings {
            retry_delay_ms: Some(25),
            ..Default::default()
        };
        let validated = SettingsValidator::new(Operation::Write)
            .validate(&settings, false)
            .unwrap();
        assert_eq!(validated.retry_policy.base_delay, Duration::from_millis(25));
        assert_eq!(validated.retry_policy.max_retries, 2);
    }
}
