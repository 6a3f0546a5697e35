//! Dispatch core shared by every transport binding.
//!
//! Bindings convert their wire format into an [`Invocation`], call
//! [`Dispatcher::dispatch`] and serialize the [`Outcome`]. Whether the model
//! implements an operation is decided here, from the handle's cached
//! capability set; absent optional operations fall back to defaults:
//!
//! | Operation | Default when absent |
//! |---|---|
//! | `predict` | `UnsupportedOperation` error |
//! | `transform-input` / `transform-output` | request echoed back |
//! | `route` | route `0` |
//! | `aggregate` | single input echoed back, otherwise `UnsupportedOperation` |
//! | `send-feedback` | empty acknowledgement |
//! | `health` | status `200 OK` |
//! | `metadata` | empty metadata |

use std::sync::Arc;

use model_gateway_common::{
    DataValues, DefaultData, Feedback, Meta, ModelMetadata, Operation, Payload, Request, Response,
    Status,
};
use serde::Serialize;
use serde_json::json;

use crate::error::{Error, Result};
use crate::model::ModelHandle;

/// Canonical input of one dispatch.
#[derive(Debug, Clone)]
pub enum Invocation {
    Message(Request),
    Batch(Vec<Request>),
    Feedback(Feedback),
    Empty,
}

/// Canonical output of one dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Message(Response),
    Metadata(ModelMetadata),
}

impl Outcome {
    /// Status code the response asks its transport to use, if any.
    pub fn status_code(&self) -> Option<i32> {
        match self {
            Outcome::Message(response) => response.status.as_ref().and_then(|s| s.code),
            Outcome::Metadata(_) => None,
        }
    }
}

/// Routes canonical requests to the wrapped model.
///
/// Holds no per-call state; clones share the same model handle.
#[derive(Clone)]
pub struct Dispatcher {
    handle: Arc<ModelHandle>,
    predictive_unit_id: Option<String>,
}

impl Dispatcher {
    pub fn new(handle: Arc<ModelHandle>) -> Self {
        Self {
            handle,
            predictive_unit_id: None,
        }
    }

    /// Record routing decisions and look up feedback routing under this unit id.
    pub fn with_unit_id(mut self, predictive_unit_id: impl Into<String>) -> Self {
        self.predictive_unit_id = Some(predictive_unit_id.into());
        self
    }

    pub fn handle(&self) -> &ModelHandle {
        &self.handle
    }

    /// Dispatch `operation` with a binding-supplied invocation.
    pub async fn dispatch(&self, operation: Operation, invocation: Invocation) -> Result<Outcome> {
        tracing::debug!(operation = %operation, model = self.handle.name(), "Dispatching");

        let outcome = match (operation, invocation) {
            (Operation::Predict, Invocation::Message(req)) => {
                Outcome::Message(self.predict(&req).await?)
            }
            (Operation::TransformInput, Invocation::Message(req)) => {
                Outcome::Message(self.transform_input(&req).await?)
            }
            (Operation::TransformOutput, Invocation::Message(req)) => {
                Outcome::Message(self.transform_output(&req).await?)
            }
            (Operation::Route, Invocation::Message(req)) => {
                Outcome::Message(self.route(&req).await?)
            }
            (Operation::Aggregate, Invocation::Batch(reqs)) => {
                Outcome::Message(self.aggregate(&reqs).await?)
            }
            (Operation::SendFeedback, Invocation::Feedback(feedback)) => {
                Outcome::Message(self.send_feedback(&feedback).await?)
            }
            (Operation::Health, _) => Outcome::Message(self.health().await?),
            (Operation::Metadata, _) => Outcome::Metadata(self.metadata().await?),
            (op, other) => {
                return Err(Error::InvalidRequest(format!(
                    "{} cannot be invoked with {}",
                    op,
                    invocation_kind(&other)
                )))
            }
        };
        Ok(outcome)
    }

    pub async fn predict(&self, request: &Request) -> Result<Response> {
        let predictor = self
            .handle
            .predictor()
            .ok_or(Error::UnsupportedOperation(Operation::Predict))?;
        let response = predictor.predict(request).await?;
        Ok(inherit_meta(&request.meta, response))
    }

    pub async fn transform_input(&self, request: &Request) -> Result<Response> {
        match self.handle.input_transformer() {
            Some(transformer) => {
                let response = transformer.transform_input(request).await?;
                Ok(inherit_meta(&request.meta, response))
            }
            None => Ok(Response::from(request.clone())),
        }
    }

    pub async fn transform_output(&self, request: &Request) -> Result<Response> {
        match self.handle.output_transformer() {
            Some(transformer) => {
                let response = transformer.transform_output(request).await?;
                Ok(inherit_meta(&request.meta, response))
            }
            None => Ok(Response::from(request.clone())),
        }
    }

    /// Returns the chosen route as `data.ndarray = [[index]]`.
    pub async fn route(&self, request: &Request) -> Result<Response> {
        let index = match self.handle.router() {
            Some(router) => router.route(request).await?,
            None => 0,
        };

        let data = DefaultData {
            names: vec![],
            values: DataValues::Ndarray(json!([[index]])),
        };
        let mut response = inherit_meta(&request.meta, Response::new(Payload::Data(data)));
        if let Some(unit) = &self.predictive_unit_id {
            response.meta.routing.insert(unit.clone(), index);
        }
        Ok(response)
    }

    pub async fn aggregate(&self, requests: &[Request]) -> Result<Response> {
        let first = requests.first().ok_or_else(|| {
            Error::InvalidRequest("aggregate needs at least one message".to_string())
        })?;

        match self.handle.combiner() {
            Some(combiner) => {
                let response = combiner.aggregate(requests).await?;
                Ok(inherit_meta(&first.meta, response))
            }
            None if requests.len() == 1 => Ok(Response::from(first.clone())),
            None => Err(Error::UnsupportedOperation(Operation::Aggregate)),
        }
    }

    pub async fn send_feedback(&self, feedback: &Feedback) -> Result<Response> {
        let Some(handler) = self.handle.feedback_handler() else {
            return Ok(Response::empty());
        };

        let routing = self
            .predictive_unit_id
            .as_deref()
            .and_then(|unit| feedback.routing_for(unit));
        let response = handler.send_feedback(feedback, routing).await?;
        Ok(response.unwrap_or_else(Response::empty))
    }

    pub async fn health(&self) -> Result<Response> {
        match self.handle.health_check() {
            Some(check) => Ok(check.health_status().await?),
            None => Ok(Response::empty().with_status(Status::ok())),
        }
    }

    pub async fn metadata(&self) -> Result<ModelMetadata> {
        match self.handle.metadata_provider() {
            Some(provider) => Ok(provider.metadata().await?),
            None => Ok(ModelMetadata::default()),
        }
    }
}

fn invocation_kind(invocation: &Invocation) -> &'static str {
    match invocation {
        Invocation::Message(_) => "a single message",
        Invocation::Batch(_) => "a message list",
        Invocation::Feedback(_) => "feedback",
        Invocation::Empty => "no payload",
    }
}

/// Carry request puid and tags into a model-produced response.
fn inherit_meta(request: &Meta, mut response: Response) -> Response {
    if response.meta.puid.is_empty() {
        response.meta.puid = request.puid.clone();
    }
    for (key, value) in &request.tags {
        response
            .meta
            .tags
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{
        data_request, dispatcher_for as dispatcher, EchoModel, FullModel, NullModel,
    };
    use model_gateway_common::StatusFlag;
    use rstest::rstest;

    #[rstest]
    #[case::transform_input(Operation::TransformInput)]
    #[case::transform_output(Operation::TransformOutput)]
    #[tokio::test]
    async fn test_transforms_default_to_identity(#[case] op: Operation) {
        let request = data_request(json!([[1, 2]]));
        let outcome = dispatcher(EchoModel)
            .dispatch(op, Invocation::Message(request.clone()))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Message(Response::from(request)));
    }

    #[tokio::test]
    async fn test_route_defaults_to_zero() {
        let response = dispatcher(EchoModel)
            .with_unit_id("router")
            .route(&data_request(json!([1])))
            .await
            .unwrap();
        let Some(Payload::Data(data)) = response.payload else {
            panic!("expected data payload");
        };
        assert_eq!(data.values, DataValues::Ndarray(json!([[0]])));
        assert_eq!(response.meta.routing.get("router"), Some(&0));
    }

    #[tokio::test]
    async fn test_health_defaults_to_ok() {
        let response = dispatcher(EchoModel).health().await.unwrap();
        let status = response.status.unwrap();
        assert_eq!(status.code, Some(200));
        assert_eq!(status.info, "OK");
        assert_eq!(status.status, StatusFlag::Success);
    }

    #[tokio::test]
    async fn test_metadata_defaults_to_empty() {
        let metadata = dispatcher(EchoModel).metadata().await.unwrap();
        assert_eq!(metadata, ModelMetadata::default());
    }

    #[tokio::test]
    async fn test_feedback_defaults_to_ack() {
        let feedback = Feedback {
            request: data_request(json!([1])),
            response: Response::empty(),
            reward: Some(1.0),
            truth: None,
        };
        let response = dispatcher(EchoModel).send_feedback(&feedback).await.unwrap();
        assert_eq!(response, Response::empty());
    }

    #[tokio::test]
    async fn test_aggregate_single_input_is_echoed() {
        let request = data_request(json!([3]));
        let response = dispatcher(EchoModel)
            .aggregate(std::slice::from_ref(&request))
            .await
            .unwrap();
        assert_eq!(response, Response::from(request));
    }

    #[tokio::test]
    async fn test_aggregate_many_inputs_without_combiner_fails() {
        let reqs = vec![data_request(json!([1])), data_request(json!([2]))];
        let err = dispatcher(EchoModel).aggregate(&reqs).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation(Operation::Aggregate)));
    }

    #[tokio::test]
    async fn test_aggregate_empty_is_invalid() {
        let err = dispatcher(FullModel::default()).aggregate(&[]).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_missing_predict_is_unsupported() {
        let err = dispatcher(NullModel)
            .predict(&data_request(json!([1])))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation(Operation::Predict)));
    }

    #[rstest]
    #[case::predict(Operation::Predict, "predict")]
    #[case::transform_input(Operation::TransformInput, "transform-input")]
    #[case::transform_output(Operation::TransformOutput, "transform-output")]
    #[case::aggregate(Operation::Aggregate, "aggregate")]
    #[tokio::test]
    async fn test_full_model_is_always_invoked(#[case] op: Operation, #[case] marker: &str) {
        let request = data_request(json!([[1]]));
        let invocation = if op == Operation::Aggregate {
            Invocation::Batch(vec![request.clone(), request])
        } else {
            Invocation::Message(request)
        };
        let outcome = dispatcher(FullModel::default()).dispatch(op, invocation).await.unwrap();
        let Outcome::Message(response) = outcome else {
            panic!("expected message outcome");
        };
        assert_eq!(response.payload, Some(Payload::StrData(marker.to_string())));
    }

    #[tokio::test]
    async fn test_full_model_route_health_metadata_feedback() {
        let d = dispatcher(FullModel::default()).with_unit_id("unit");

        let routed = d.route(&data_request(json!([1]))).await.unwrap();
        assert_eq!(routed.meta.routing.get("unit"), Some(&FullModel::ROUTE));

        let health = d.health().await.unwrap();
        assert_eq!(health.payload, Some(Payload::StrData("healthy".to_string())));

        let metadata = d.metadata().await.unwrap();
        assert_eq!(metadata.name.as_deref(), Some("full"));

        let mut response = Response::empty();
        response.meta.routing.insert("unit".to_string(), 1);
        let feedback = Feedback {
            request: data_request(json!([1])),
            response,
            reward: Some(0.5),
            truth: None,
        };
        let ack = d.send_feedback(&feedback).await.unwrap();
        assert_eq!(ack.payload, Some(Payload::StrData("feedback:1".to_string())));
    }

    #[tokio::test]
    async fn test_response_inherits_request_meta() {
        let mut meta = Meta::default();
        meta.puid = "abc".to_string();
        meta.tags.insert("source".to_string(), json!("test"));
        let request = data_request(json!([1])).with_meta(meta);

        let response = dispatcher(FullModel::default()).predict(&request).await.unwrap();
        assert_eq!(response.meta.puid, "abc");
        assert_eq!(response.meta.tags.get("source"), Some(&json!("test")));
        assert_eq!(response.meta.tags.get("model"), Some(&json!("full")));
    }

    #[tokio::test]
    async fn test_mismatched_invocation_is_rejected() {
        let err = dispatcher(EchoModel)
            .dispatch(Operation::Predict, Invocation::Empty)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }
}
