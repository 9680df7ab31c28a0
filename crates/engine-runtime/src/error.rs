use engine_config::settings::error::SettingsError;
use engine_processing::error::DiscoveryError;
use thiserror::Error;

/// Errors that keep a bulk job from starting or from reporting its result.
#[derive(Debug, Error)]
pub enum BulkError {
    /// The job options were rejected.
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// The forests backing the job could not be resolved.
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// The job's coordinating task was cancelled or panicked.
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}
