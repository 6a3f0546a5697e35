//! Model abstraction layer.
//!
//! A served model is any type implementing [`Model`]. Each optional capability
//! is its own trait; the model advertises the ones it implements through the
//! `as_*` accessors, which default to `None`. The accessors are queried once
//! when the model is wrapped in a [`ModelHandle`], and the resulting
//! [`CapabilitySet`] drives dispatch for the rest of the process lifetime.

mod mean;
mod registry;

pub use mean::MeanModel;
pub use registry::{CapabilitySet, ModelHandle};

use async_trait::async_trait;
use model_gateway_common::{Feedback, ModelMetadata, Request, Response};
use serde_json::Value;

use crate::error::{Error, ModelResult};

/// Produces predictions. The only mandatory capability.
#[async_trait]
pub trait Predictor: Send + Sync {
    async fn predict(&self, request: &Request) -> ModelResult<Response>;
}

/// Rewrites a request before it reaches the next unit of a graph.
#[async_trait]
pub trait InputTransformer: Send + Sync {
    async fn transform_input(&self, request: &Request) -> ModelResult<Response>;
}

/// Rewrites a response on its way back to the caller.
#[async_trait]
pub trait OutputTransformer: Send + Sync {
    async fn transform_output(&self, request: &Request) -> ModelResult<Response>;
}

/// Picks the child a request should be routed to.
#[async_trait]
pub trait Router: Send + Sync {
    /// Index of the chosen route.
    async fn route(&self, request: &Request) -> ModelResult<i32>;
}

/// Combines the outputs of several units into one.
#[async_trait]
pub trait Combiner: Send + Sync {
    async fn aggregate(&self, requests: &[Request]) -> ModelResult<Response>;
}

/// Receives rewards and ground truth for earlier predictions.
#[async_trait]
pub trait FeedbackHandler: Send + Sync {
    /// `routing` is the decision this unit recorded for the rated request, if any.
    async fn send_feedback(
        &self,
        feedback: &Feedback,
        routing: Option<i32>,
    ) -> ModelResult<Option<Response>>;
}

#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn health_status(&self) -> ModelResult<Response>;
}

#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn metadata(&self) -> ModelResult<ModelMetadata>;
}

/// Custom rendering of errors for REST callers.
pub trait ErrorHandler: Send + Sync {
    /// Return `Some((status, body))` to replace the default error response.
    fn render_error(&self, error: &Error) -> Option<(u16, Value)>;
}

/// A servable model.
///
/// Implement the capability traits the model supports and return `Some(self)`
/// from the matching accessor.
pub trait Model: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str {
        "model"
    }

    fn as_predictor(&self) -> Option<&dyn Predictor> {
        None
    }

    fn as_input_transformer(&self) -> Option<&dyn InputTransformer> {
        None
    }

    fn as_output_transformer(&self) -> Option<&dyn OutputTransformer> {
        None
    }

    fn as_router(&self) -> Option<&dyn Router> {
        None
    }

    fn as_combiner(&self) -> Option<&dyn Combiner> {
        None
    }

    fn as_feedback_handler(&self) -> Option<&dyn FeedbackHandler> {
        None
    }

    fn as_health_check(&self) -> Option<&dyn HealthCheck> {
        None
    }

    fn as_metadata_provider(&self) -> Option<&dyn MetadataProvider> {
        None
    }

    fn as_error_handler(&self) -> Option<&dyn ErrorHandler> {
        None
    }
}
