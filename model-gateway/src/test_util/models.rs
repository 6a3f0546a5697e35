//! Test models with predictable behaviour.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use model_gateway_common::{Feedback, ModelMetadata, Payload, Request, Response, Status};
use serde_json::{json, Value};

use crate::error::{ApplicationError, Error, ModelError, ModelResult};
use crate::model::{
    Combiner, ErrorHandler, FeedbackHandler, HealthCheck, InputTransformer, MetadataProvider,
    Model, OutputTransformer, Predictor, Router,
};

/// Implements only `predict`, echoing the request.
#[derive(Debug, Default)]
pub struct EchoModel;

#[async_trait]
impl Predictor for EchoModel {
    async fn predict(&self, request: &Request) -> ModelResult<Response> {
        Ok(Response::from(request.clone()))
    }
}

impl Model for EchoModel {
    fn name(&self) -> &str {
        "echo"
    }

    fn as_predictor(&self) -> Option<&dyn Predictor> {
        Some(self)
    }
}

/// Implements nothing at all.
#[derive(Debug, Default)]
pub struct NullModel;

impl Model for NullModel {}

/// Implements every capability; each answers with a marker naming itself.
#[derive(Debug, Default)]
pub struct FullModel;

impl FullModel {
    pub const ROUTE: i32 = 2;

    fn marker(name: &str) -> Response {
        let mut response = Response::new(Payload::StrData(name.to_string()));
        response.meta.tags.insert("model".to_string(), json!("full"));
        response
    }
}

#[async_trait]
impl Predictor for FullModel {
    async fn predict(&self, _request: &Request) -> ModelResult<Response> {
        Ok(Self::marker("predict"))
    }
}

#[async_trait]
impl InputTransformer for FullModel {
    async fn transform_input(&self, _request: &Request) -> ModelResult<Response> {
        Ok(Self::marker("transform-input"))
    }
}

#[async_trait]
impl OutputTransformer for FullModel {
    async fn transform_output(&self, _request: &Request) -> ModelResult<Response> {
        Ok(Self::marker("transform-output"))
    }
}

#[async_trait]
impl Router for FullModel {
    async fn route(&self, _request: &Request) -> ModelResult<i32> {
        Ok(Self::ROUTE)
    }
}

#[async_trait]
impl Combiner for FullModel {
    async fn aggregate(&self, _requests: &[Request]) -> ModelResult<Response> {
        Ok(Self::marker("aggregate"))
    }
}

#[async_trait]
impl FeedbackHandler for FullModel {
    async fn send_feedback(
        &self,
        _feedback: &Feedback,
        routing: Option<i32>,
    ) -> ModelResult<Option<Response>> {
        let routing = routing.map_or_else(|| "none".to_string(), |r| r.to_string());
        Ok(Some(Response::new(Payload::StrData(format!(
            "feedback:{}",
            routing
        )))))
    }
}

#[async_trait]
impl HealthCheck for FullModel {
    async fn health_status(&self) -> ModelResult<Response> {
        Ok(Response::new(Payload::StrData("healthy".to_string())))
    }
}

#[async_trait]
impl MetadataProvider for FullModel {
    async fn metadata(&self) -> ModelResult<ModelMetadata> {
        Ok(ModelMetadata {
            name: Some("full".to_string()),
            ..ModelMetadata::default()
        })
    }
}

impl ErrorHandler for FullModel {
    fn render_error(&self, _error: &Error) -> Option<(u16, Value)> {
        None
    }
}

impl Model for FullModel {
    fn name(&self) -> &str {
        "full"
    }

    fn as_predictor(&self) -> Option<&dyn Predictor> {
        Some(self)
    }

    fn as_input_transformer(&self) -> Option<&dyn InputTransformer> {
        Some(self)
    }

    fn as_output_transformer(&self) -> Option<&dyn OutputTransformer> {
        Some(self)
    }

    fn as_router(&self) -> Option<&dyn Router> {
        Some(self)
    }

    fn as_combiner(&self) -> Option<&dyn Combiner> {
        Some(self)
    }

    fn as_feedback_handler(&self) -> Option<&dyn FeedbackHandler> {
        Some(self)
    }

    fn as_health_check(&self) -> Option<&dyn HealthCheck> {
        Some(self)
    }

    fn as_metadata_provider(&self) -> Option<&dyn MetadataProvider> {
        Some(self)
    }

    fn as_error_handler(&self) -> Option<&dyn ErrorHandler> {
        Some(self)
    }
}

/// Answers every prediction with a response-level status code.
#[derive(Debug)]
pub struct StatusModel {
    pub code: i32,
}

#[async_trait]
impl Predictor for StatusModel {
    async fn predict(&self, _request: &Request) -> ModelResult<Response> {
        Ok(Response::empty().with_status(Status::failure(self.code, "rejected by model")))
    }
}

impl Model for StatusModel {
    fn as_predictor(&self) -> Option<&dyn Predictor> {
        Some(self)
    }
}

/// Raises an application error from `predict`.
#[derive(Debug)]
pub struct RejectingModel {
    pub status: u16,
    pub reason: String,
}

impl RejectingModel {
    pub fn new(status: u16, reason: &str) -> Self {
        Self {
            status,
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl Predictor for RejectingModel {
    async fn predict(&self, _request: &Request) -> ModelResult<Response> {
        Err(ApplicationError::with_reason(self.status, self.reason.clone()).into())
    }
}

impl Model for RejectingModel {
    fn as_predictor(&self) -> Option<&dyn Predictor> {
        Some(self)
    }
}

/// Fails with an unstructured error and renders it itself.
#[derive(Debug, Default)]
pub struct CustomErrorModel;

#[async_trait]
impl Predictor for CustomErrorModel {
    async fn predict(&self, _request: &Request) -> ModelResult<Response> {
        Err(ModelError::Failed("kaput".to_string()))
    }
}

impl ErrorHandler for CustomErrorModel {
    fn render_error(&self, error: &Error) -> Option<(u16, Value)> {
        match error {
            Error::Model(msg) => Some((503, json!({ "handled": msg }))),
            _ => None,
        }
    }
}

impl Model for CustomErrorModel {
    fn as_predictor(&self) -> Option<&dyn Predictor> {
        Some(self)
    }

    fn as_error_handler(&self) -> Option<&dyn ErrorHandler> {
        Some(self)
    }
}

/// Sleeps in `predict` and records the peak number of concurrent calls.
#[derive(Debug, Default)]
pub struct SlowModel {
    pub delay: Duration,
    active: AtomicUsize,
    peak: Arc<AtomicUsize>,
}

impl SlowModel {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Shared counter of the highest concurrency observed.
    pub fn peak(&self) -> Arc<AtomicUsize> {
        self.peak.clone()
    }
}

#[async_trait]
impl Predictor for SlowModel {
    async fn predict(&self, request: &Request) -> ModelResult<Response> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(Response::from(request.clone()))
    }
}

impl Model for SlowModel {
    fn as_predictor(&self) -> Option<&dyn Predictor> {
        Some(self)
    }
}
