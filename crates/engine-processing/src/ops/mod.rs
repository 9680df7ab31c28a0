use engine_config::settings::TransformSpec;
use engine_core::{
    error::ExecutorError,
    executor::{Request, Response},
};
use model::{
    core::{identifiers::Timestamp, operation::Operation},
    partition::Forest,
};

pub mod read;
pub mod remove;
pub mod transform;
pub mod write;

pub const DOCUMENTS_PATH: &str = "/v1/documents";

/// Counts and emitted outputs of one successful dispatch.
#[derive(Debug, PartialEq)]
pub struct BatchOutcome<O> {
    pub succeeded: u64,
    pub failed: u64,
    pub outputs: Vec<O>,
}

impl<O> BatchOutcome<O> {
    /// Every item of the batch went through and nothing is emitted.
    pub fn completed(count: usize) -> Self {
        Self {
            succeeded: count as u64,
            failed: 0,
            outputs: Vec::new(),
        }
    }
}

/// Per-operation request building and response handling for batch workers.
pub trait BatchOperation: Send + Sync + 'static {
    type Item: Send + Sync + 'static;
    type Output: Send + 'static;

    fn operation(&self) -> Operation;

    fn build_request(
        &self,
        forest: &Forest,
        items: &[Self::Item],
        timestamp: Option<&Timestamp>,
    ) -> Request;

    /// An error here is handled like a failed dispatch.
    fn handle_response(
        &self,
        items: &[Self::Item],
        response: Response,
    ) -> Result<BatchOutcome<Self::Output>, ExecutorError>;
}

/// Adds `transform` and its `trans:` parameters.
pub fn with_transform(request: Request, transform: Option<&TransformSpec>) -> Request {
    let Some(spec) = transform else {
        return request;
    };

    spec.params.iter().fold(
        request.param("transform", spec.name.as_str()),
        |request, (name, value)| request.param(format!("trans:{name}"), value.as_str()),
    )
}

pub fn with_timestamp(request: Request, timestamp: Option<&Timestamp>) -> Request {
    match timestamp {
        Some(ts) => request.param("timestamp", ts.as_str()),
        None => request,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_params_are_prefixed() {
        let spec = TransformSpec::new("enrich")
            .param("mode", "full")
            .param("lang", "en");
        let request = with_transform(Request::post("/x"), Some(&spec));

        assert_eq!(request.param_value("transform"), Some("enrich"));
        assert_eq!(request.param_value("trans:mode"), Some("full"));
        assert_eq!(request.param_value("trans:lang"), Some("en"));
    }

    #[test]
    fn absent_options_leave_request_alone() {
        let request = with_timestamp(with_transform(Request::post("/x"), None), None);
        assert!(request.params.is_empty());
    }
}
