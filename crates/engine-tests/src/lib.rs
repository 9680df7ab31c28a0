#![allow(dead_code)]

use memory::MemoryDatabase;
use model::partition::Forest;
use std::sync::Arc;

pub mod integration;
pub mod memory;
pub mod utils;

/// Two hosts with two forests each.
pub fn cluster() -> Vec<Forest> {
    vec![
        Forest::new("docs-1", "node-a"),
        Forest::new("docs-2", "node-a"),
        Forest::new("docs-3", "node-b"),
        Forest::new("docs-4", "node-b"),
    ]
}

pub fn database(forests: Vec<Forest>) -> Arc<MemoryDatabase> {
    Arc::new(MemoryDatabase::new(forests))
}
