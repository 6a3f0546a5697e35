//! Error types for the model gateway.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use model_gateway_common::{MessageError, Operation};
use serde_json::{json, Map, Value};

/// Structured business-rule failure raised by model code.
///
/// Carries an HTTP-style status and a JSON detail object that is returned to
/// REST callers verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationError {
    pub status: u16,
    pub detail: Map<String, Value>,
}

impl ApplicationError {
    /// Build from any JSON detail; non-object details are wrapped as `{"message": ...}`.
    pub fn new(status: u16, detail: Value) -> Self {
        let detail = match detail {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("message".to_string(), other);
                map
            }
        };
        Self { status, detail }
    }

    /// Shorthand for a `{"reason": ...}` detail.
    pub fn with_reason(status: u16, reason: impl Into<String>) -> Self {
        Self::new(status, json!({ "reason": reason.into() }))
    }

    pub fn detail_value(&self) -> Value {
        Value::Object(self.detail.clone())
    }
}

impl std::fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.status, self.detail_value())
    }
}

/// Errors a model capability may return.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    #[error("Application error: {0}")]
    Application(ApplicationError),

    #[error("{0}")]
    Failed(String),
}

impl From<ApplicationError> for ModelError {
    fn from(err: ApplicationError) -> Self {
        ModelError::Application(err)
    }
}

pub type ModelResult<T> = std::result::Result<T, ModelError>;

/// Gateway errors, shared by every binding.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Operation not supported by model: {0}")]
    UnsupportedOperation(Operation),

    #[error("Application error: {0}")]
    Application(ApplicationError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Model failed: {0}")]
    Model(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl Error {
    /// HTTP status used when rendering this error over REST.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Application(app) => {
                StatusCode::from_u16(app.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Error::InvalidRequest(_) | Error::Serialization(_) => StatusCode::BAD_REQUEST,
            Error::UnsupportedOperation(_) => StatusCode::NOT_IMPLEMENTED,
            Error::Transport(_) => StatusCode::BAD_GATEWAY,
            Error::Configuration(_) | Error::Model(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "configuration_error",
            Error::UnsupportedOperation(_) => "unsupported_operation",
            Error::Application(_) => "application_error",
            Error::InvalidRequest(_) => "invalid_request",
            Error::Serialization(_) => "serialization_error",
            Error::Model(_) => "model_error",
            Error::Transport(_) => "transport_error",
        }
    }
}

impl From<ModelError> for Error {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Application(app) => Error::Application(app),
            ModelError::Failed(msg) => Error::Model(msg),
        }
    }
}

impl From<MessageError> for Error {
    fn from(err: MessageError) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Application errors carry their own body.
        if let Error::Application(app) = self {
            return (status, Json(Value::Object(app.detail))).into_response();
        }

        let body = Json(json!({
            "error": {
                "type": self.error_type(),
                "message": self.to_string()
            }
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
