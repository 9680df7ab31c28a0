pub mod handle;
pub mod jobs;
pub mod pipeline;
pub mod pool;
