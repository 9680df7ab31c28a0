pub mod accumulator;
pub mod error;
pub mod job;
pub mod ops;
pub mod partition;
pub mod query;
pub mod resolver;
pub mod snapshot;
pub mod tracker;
pub mod worker;
