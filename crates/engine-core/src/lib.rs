pub mod error;
pub mod executor;
pub mod metrics;
pub mod retry;
