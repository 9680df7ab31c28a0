pub mod error;
pub mod execution;


pub use error::BulkError;
pub use execution::{
    handle::{JobHandle, JobOutput},
    jobs::{query_all, read_all, remove_all, transform_all, write_all},
    pipeline::{query_to_read_all, query_to_remove_all, query_to_transform_all},
};
