use crate::memory::MemoryDatabase;
use engine_config::report::summary::CompletionSummary;
use engine_core::executor::RequestExecutor;
use model::records::document::{Document, DocumentMetadata, ReadItem};
use serde_json::json;
use std::sync::Arc;

pub const CUSTOMERS: &str = "customers";

pub fn executor(db: &Arc<MemoryDatabase>) -> Arc<dyn RequestExecutor> {
    db.clone()
}

/// JSON customer documents under `/customers/`, zero-padded so URI order
/// matches creation order.
pub fn customers(count: usize) -> Vec<Document> {
    (0..count)
        .map(|i| {
            Document::json(
                format!("/customers/{i:05}.json"),
                json!({ "id": i, "name": format!("customer {i}") }),
            )
        })
        .collect()
}

/// Same as [`customers`], tagged with the customers collection.
pub fn collected_customers(count: usize) -> Vec<Document> {
    customers(count)
        .into_iter()
        .map(|doc| doc.with_metadata(DocumentMetadata::default().collection(CUSTOMERS)))
        .collect()
}

pub fn uris_of(documents: &[Document]) -> Vec<String> {
    documents.iter().map(|d| d.uri.clone()).collect()
}

pub fn read_uris(items: &[ReadItem]) -> Vec<String> {
    let mut uris: Vec<String> = items
        .iter()
        .filter_map(|item| match item {
            ReadItem::Document(doc) => Some(doc.uri.clone()),
            ReadItem::Chunk(_) => None,
        })
        .collect();
    uris.sort();
    uris
}

pub fn assert_counts(summary: &CompletionSummary, succeeded: u64, failed: u64) {
    assert_eq!(
        (summary.succeeded, summary.failed),
        (succeeded, failed),
        "unexpected counts in {summary:?}"
    );
}
