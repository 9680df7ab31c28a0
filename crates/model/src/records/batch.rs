use crate::core::identifiers::BatchId;

/// A bounded group of items accumulated for a single request.
///
/// Owned by the worker that accumulated it until it succeeds, is retried with
/// replacement items, or is abandoned.
#[derive(Debug, Clone)]
pub struct Batch<T> {
    pub id: BatchId,
    pub items: Vec<T>,
    pub attempt: usize,
}

impl<T> Batch<T> {
    pub fn new(id: BatchId, items: Vec<T>) -> Self {
        Self {
            id,
            items,
            attempt: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Substitutes the batch content for the next attempt.
    pub fn retry_with(&mut self, items: Vec<T>) {
        self.items = items;
        self.attempt += 1;
    }
}
