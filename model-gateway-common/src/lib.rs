//! Model Gateway Common Types
//!
//! Canonical messages and protocol types shared by every gateway transport.

pub mod feedback;
pub mod message;
pub mod operation;
pub mod protocol;

pub use feedback::Feedback;
pub use message::{
    DataValues, DefaultData, MessageError, MessageList, Meta, ModelMetadata, Payload, Request,
    Response, Status, StatusFlag, Tensor,
};
pub use operation::Operation;
pub use protocol::{DeadLetter, DeploymentIdentity, FailureStage, PredictTopics};
