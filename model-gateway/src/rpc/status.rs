//! Mapping of gateway errors onto gRPC statuses.

use bytes::Bytes;
use tonic::metadata::{MetadataMap, MetadataValue};
use tonic::{Code, Status};

use crate::error::Error;

/// Metadata key carrying the HTTP status of an application error.
pub const HTTP_STATUS_KEY: &str = "x-http-status";

/// gRPC code closest to an HTTP status.
pub fn code_for_http(status: u16) -> Code {
    match status {
        400 | 422 => Code::InvalidArgument,
        401 => Code::Unauthenticated,
        403 => Code::PermissionDenied,
        404 => Code::NotFound,
        409 => Code::AlreadyExists,
        412 => Code::FailedPrecondition,
        429 => Code::ResourceExhausted,
        499 => Code::Cancelled,
        501 => Code::Unimplemented,
        503 => Code::Unavailable,
        504 => Code::DeadlineExceeded,
        400..=499 => Code::InvalidArgument,
        _ => Code::Internal,
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::Application(app) => {
                let detail = app.detail_value().to_string();
                let mut metadata = MetadataMap::new();
                metadata.insert(HTTP_STATUS_KEY, MetadataValue::from(app.status));
                Status::with_details_and_metadata(
                    code_for_http(app.status),
                    detail.clone(),
                    Bytes::from(detail),
                    metadata,
                )
            }
            Error::UnsupportedOperation(_) => Status::unimplemented(err.to_string()),
            Error::InvalidRequest(_) | Error::Serialization(_) => {
                Status::invalid_argument(err.to_string())
            }
            Error::Transport(_) => Status::unavailable(err.to_string()),
            Error::Configuration(_) | Error::Model(_) => Status::internal(err.to_string()),
        }
    }
}
