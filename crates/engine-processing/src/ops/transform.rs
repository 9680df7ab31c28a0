use crate::ops::{BatchOperation, BatchOutcome, with_timestamp, with_transform};
use engine_config::settings::{TransformSpec, TransformStrategy, validated::ValidatedOptions};
use engine_core::{
    error::ExecutorError,
    executor::{Request, RequestBody, Response},
};
use model::{
    core::{identifiers::Timestamp, operation::Operation},
    partition::Forest,
};

pub const APPLY_TRANSFORM_PATH: &str = "/v1/internal/apply-transform";

/// Applies a server-side transform to documents in place.
pub struct TransformOperation {
    transform: Option<TransformSpec>,
    strategy: TransformStrategy,
}

impl TransformOperation {
    pub fn new(options: &ValidatedOptions) -> Self {
        Self {
            transform: options.transform.clone(),
            strategy: options.transform_strategy,
        }
    }
}

impl BatchOperation for TransformOperation {
    type Item = String;
    type Output = ();

    fn operation(&self) -> Operation {
        Operation::Transform
    }

    fn build_request(
        &self,
        forest: &Forest,
        items: &[String],
        timestamp: Option<&Timestamp>,
    ) -> Request {
        let request = Request::post(APPLY_TRANSFORM_PATH).param("result", self.strategy.as_param());
        let request = with_transform(request, self.transform.as_ref());

        with_timestamp(request, timestamp)
            .host(forest.host.as_str())
            .body(RequestBody::UriList(items.to_vec()))
    }

    fn handle_response(
        &self,
        items: &[String],
        _: Response,
    ) -> Result<BatchOutcome<()>, ExecutorError> {
        Ok(BatchOutcome::completed(items.len()))
    }
}
