use crate::ops::{BatchOperation, BatchOutcome, DOCUMENTS_PATH};
use engine_core::{
    error::ExecutorError,
    executor::{Request, Response},
};
use model::{
    core::{identifiers::Timestamp, operation::Operation},
    partition::Forest,
};

/// Deletes batches of documents by URI.
#[derive(Debug, Default)]
pub struct RemoveOperation;

impl BatchOperation for RemoveOperation {
    type Item = String;
    type Output = ();

    fn operation(&self) -> Operation {
        Operation::Remove
    }

    fn build_request(&self, forest: &Forest, items: &[String], _: Option<&Timestamp>) -> Request {
        items.iter().fold(
            Request::delete(DOCUMENTS_PATH).host(forest.host.as_str()),
            |request, uri| request.param("uri", uri.as_str()),
        )
    }

    fn handle_response(
        &self,
        items: &[String],
        _: Response,
    ) -> Result<BatchOutcome<()>, ExecutorError> {
        Ok(BatchOutcome::completed(items.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::executor::{Method, RequestBody};

    #[test]
    fn uris_become_repeated_params() {
        let uris = vec!["/a.json".to_string(), "/b.json".to_string()];
        let request = RemoveOperation.build_request(&Forest::new("f1", "h1"), &uris, None);

        assert_eq!(request.method, Method::Delete);
        assert_eq!(request.path, DOCUMENTS_PATH);
        assert_eq!(request.param_values("uri"), vec!["/a.json", "/b.json"]);
        assert_eq!(request.body, RequestBody::Empty);
    }
}
