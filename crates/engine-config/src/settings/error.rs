use crate::settings::InputKind;
use thiserror::Error;

/// Errors raised while validating job options, before any stream activity.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// One or more options were invalid for the operation.
    #[error("Invalid job options: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    /// The supplied input stream does not match the configured input kind.
    #[error("Input stream yields {actual} but the job is configured for {expected}")]
    InputKindMismatch {
        expected: InputKind,
        actual: InputKind,
    },

    /// The options could not be parsed.
    #[error("Failed to parse job options: {0}")]
    Parse(#[from] serde_json::Error),
}
