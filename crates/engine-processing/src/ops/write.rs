use crate::ops::{BatchOperation, BatchOutcome, DOCUMENTS_PATH, with_transform};
use engine_config::settings::{TransformSpec, validated::ValidatedOptions};
use engine_core::{
    error::ExecutorError,
    executor::{Request, RequestBody, Response},
};
use model::{
    core::{identifiers::Timestamp, operation::Operation},
    partition::Forest,
    records::document::{Document, DocumentMetadata},
};

/// Writes batches of documents into the worker's forest.
pub struct WriteOperation {
    default_metadata: Option<DocumentMetadata>,
    transform: Option<TransformSpec>,
}

impl WriteOperation {
    pub fn new(options: &ValidatedOptions) -> Self {
        Self {
            default_metadata: options.default_metadata.clone(),
            transform: options.transform.clone(),
        }
    }

    fn prepare(&self, document: &Document) -> Document {
        match &self.default_metadata {
            Some(metadata) if !document.has_metadata() => {
                document.clone().with_metadata(metadata.clone())
            }
            _ => document.clone(),
        }
    }
}

impl BatchOperation for WriteOperation {
    type Item = Document;
    type Output = ();

    fn operation(&self) -> Operation {
        Operation::Write
    }

    fn build_request(&self, forest: &Forest, items: &[Document], _: Option<&Timestamp>) -> Request {
        let documents = items.iter().map(|doc| self.prepare(doc)).collect();
        let request = Request::post(DOCUMENTS_PATH)
            .param("forest-name", forest.name.as_str())
            .host(forest.host.as_str());

        with_transform(request, self.transform.as_ref()).body(RequestBody::Documents(documents))
    }

    fn handle_response(
        &self,
        items: &[Document],
        _: Response,
    ) -> Result<BatchOutcome<()>, ExecutorError> {
        Ok(BatchOutcome::completed(items.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_config::settings::validated::ValidatedOptionsBuilder;
    use engine_core::executor::Method;
    use serde_json::json;

    #[test]
    fn request_targets_the_forest_with_default_metadata() {
        let mut builder = ValidatedOptionsBuilder::new(Operation::Write)
            .transform(TransformSpec::new("stamp").param("by", "bulk"));
        builder.default_metadata = Some(DocumentMetadata::default().collection("imported"));
        let op = WriteOperation::new(&builder.build());

        let own = DocumentMetadata::default().collection("mine");
        let docs = vec![
            Document::json("/a.json", json!({"a": 1})),
            Document::json("/b.json", json!({"b": 2})).with_metadata(own.clone()),
        ];
        let request = op.build_request(&Forest::new("docs-1", "h1"), &docs, None);

        assert_eq!(request.method, Method::Post);
        assert_eq!(request.path, DOCUMENTS_PATH);
        assert_eq!(request.param_value("forest-name"), Some("docs-1"));
        assert_eq!(request.param_value("transform"), Some("stamp"));
        assert_eq!(request.param_value("trans:by"), Some("bulk"));
        assert_eq!(request.host.as_deref(), Some("h1"));

        let RequestBody::Documents(sent) = &request.body else {
            panic!("expected documents body");
        };
        assert_eq!(
            sent[0].metadata.as_ref().map(|m| m.collections.clone()),
            Some(vec!["imported".to_string()])
        );
        assert_eq!(sent[1].metadata.as_ref(), Some(&own));
    }

    #[test]
    fn every_document_counts_as_written() {
        let op = WriteOperation::new(&ValidatedOptions::default(Operation::Write));
        let docs = vec![Document::text("/a.txt", "a"), Document::text("/b.txt", "b")];
        let outcome = op.handle_response(&docs, Response::empty()).unwrap();
        assert_eq!(outcome, BatchOutcome::completed(2));
    }
}
