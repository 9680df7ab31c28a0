use crate::ops::{BatchOperation, BatchOutcome, DOCUMENTS_PATH, with_timestamp, with_transform};
use engine_config::settings::{OutputStreamType, TransformSpec, validated::ValidatedOptions};
use engine_core::{
    error::ExecutorError,
    executor::{Request, RequestBody, Response},
};
use model::{
    core::{identifiers::Timestamp, operation::Operation},
    partition::Forest,
    records::document::{Category, ReadItem},
};
use tracing::debug;

/// Reads batches of URIs from the worker's forest and emits what comes back.
pub struct ReadOperation {
    categories: Vec<Category>,
    output: OutputStreamType,
    transform: Option<TransformSpec>,
}

impl ReadOperation {
    pub fn new(options: &ValidatedOptions) -> Self {
        Self {
            categories: options.categories.clone(),
            output: options.output_stream_type,
            transform: options.transform.clone(),
        }
    }
}

impl BatchOperation for ReadOperation {
    type Item = String;
    type Output = ReadItem;

    fn operation(&self) -> Operation {
        Operation::Read
    }

    fn build_request(
        &self,
        forest: &Forest,
        items: &[String],
        timestamp: Option<&Timestamp>,
    ) -> Request {
        let request = self.categories.iter().fold(
            Request::post(DOCUMENTS_PATH).param("forest-name", forest.name.as_str()),
            |request, category| request.param("category", category.as_param()),
        );
        let request = with_timestamp(request, timestamp);

        with_transform(request, self.transform.as_ref())
            .host(forest.host.as_str())
            .body(RequestBody::UriList(items.to_vec()))
    }

    /// URIs the server did not return count as failed reads.
    fn handle_response(
        &self,
        items: &[String],
        response: Response,
    ) -> Result<BatchOutcome<ReadItem>, ExecutorError> {
        let documents = response.into_documents()?;
        let found = documents.len();
        let missing = items.len().saturating_sub(found);
        if missing > 0 {
            debug!(requested = items.len(), found, "Some documents were not found");
        }

        let outputs = match self.output {
            OutputStreamType::Object => documents.into_iter().map(ReadItem::Document).collect(),
            OutputStreamType::Chunked => documents
                .into_iter()
                .filter_map(|doc| doc.content.map(|content| ReadItem::Chunk(content.to_bytes())))
                .collect(),
        };

        Ok(BatchOutcome {
            succeeded: found as u64,
            failed: missing as u64,
            outputs,
        })
    }
}
