//! `Generic` service implementation over the dispatcher.

use std::sync::Arc;

use model_gateway_common::{Feedback, MessageList, ModelMetadata, Operation, Request, Response};
use tokio::sync::Semaphore;
use tonic::Status;

use super::generic_server::Generic;
use super::Empty;
use crate::dispatch::{Dispatcher, Invocation, Outcome};

/// Serves gRPC calls with at most `workers` dispatches in flight.
///
/// Calls beyond capacity wait for a permit instead of being rejected.
#[derive(Clone)]
pub struct GenericService {
    dispatcher: Dispatcher,
    workers: Arc<Semaphore>,
}

impl GenericService {
    pub fn new(dispatcher: Dispatcher, workers: usize) -> Self {
        Self {
            dispatcher,
            workers: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    async fn call(&self, operation: Operation, invocation: Invocation) -> Result<Outcome, Status> {
        let _permit = self
            .workers
            .acquire()
            .await
            .map_err(|_| Status::unavailable("worker pool closed"))?;

        self.dispatcher
            .dispatch(operation, invocation)
            .await
            .map_err(|e| {
                tracing::warn!(operation = %operation, error = %e, "RPC call failed");
                Status::from(e)
            })
    }

    async fn message(
        &self,
        operation: Operation,
        invocation: Invocation,
    ) -> Result<tonic::Response<Response>, Status> {
        match self.call(operation, invocation).await? {
            Outcome::Message(response) => Ok(tonic::Response::new(response)),
            Outcome::Metadata(_) => Err(Status::internal(format!(
                "{} produced metadata instead of a message",
                operation
            ))),
        }
    }
}

#[tonic::async_trait]
impl Generic for GenericService {
    async fn predict(
        &self,
        request: tonic::Request<Request>,
    ) -> Result<tonic::Response<Response>, Status> {
        self.message(Operation::Predict, Invocation::Message(request.into_inner()))
            .await
    }

    async fn send_feedback(
        &self,
        request: tonic::Request<Feedback>,
    ) -> Result<tonic::Response<Response>, Status> {
        self.message(
            Operation::SendFeedback,
            Invocation::Feedback(request.into_inner()),
        )
        .await
    }

    async fn transform_input(
        &self,
        request: tonic::Request<Request>,
    ) -> Result<tonic::Response<Response>, Status> {
        self.message(
            Operation::TransformInput,
            Invocation::Message(request.into_inner()),
        )
        .await
    }

    async fn transform_output(
        &self,
        request: tonic::Request<Request>,
    ) -> Result<tonic::Response<Response>, Status> {
        self.message(
            Operation::TransformOutput,
            Invocation::Message(request.into_inner()),
        )
        .await
    }

    async fn route(
        &self,
        request: tonic::Request<Request>,
    ) -> Result<tonic::Response<Response>, Status> {
        self.message(Operation::Route, Invocation::Message(request.into_inner()))
            .await
    }

    async fn aggregate(
        &self,
        request: tonic::Request<MessageList>,
    ) -> Result<tonic::Response<Response>, Status> {
        self.message(
            Operation::Aggregate,
            Invocation::Batch(request.into_inner().messages),
        )
        .await
    }

    async fn metadata(
        &self,
        _request: tonic::Request<Empty>,
    ) -> Result<tonic::Response<ModelMetadata>, Status> {
        match self.call(Operation::Metadata, Invocation::Empty).await? {
            Outcome::Metadata(metadata) => Ok(tonic::Response::new(metadata)),
            Outcome::Message(_) => Err(Status::internal("metadata produced a message")),
        }
    }

    async fn health(
        &self,
        _request: tonic::Request<Empty>,
    ) -> Result<tonic::Response<Response>, Status> {
        self.message(Operation::Health, Invocation::Empty).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{data_request, dispatcher_for, EchoModel, NullModel, RejectingModel};
    use serde_json::json;
    use tonic::Code;

    #[tokio::test]
    async fn test_predict_round_trips_through_dispatcher() {
        let service = GenericService::new(dispatcher_for(EchoModel), 2);
        let request = data_request(json!([[1.0, 2.0]]));
        let response = service
            .predict(tonic::Request::new(request.clone()))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response, Response::from(request));
    }

    #[tokio::test]
    async fn test_missing_predict_is_unimplemented() {
        let service = GenericService::new(dispatcher_for(NullModel), 1);
        let status = service
            .predict(tonic::Request::new(data_request(json!([1]))))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Unimplemented);
    }

    #[tokio::test]
    async fn test_application_error_status() {
        let service = GenericService::new(dispatcher_for(RejectingModel::new(403, "nope")), 1);
        let status = service
            .predict(tonic::Request::new(data_request(json!([1]))))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::PermissionDenied);
        assert!(status.message().contains("nope"));
    }

    #[tokio::test]
    async fn test_metadata_defaults_to_empty() {
        let service = GenericService::new(dispatcher_for(EchoModel), 1);
        let metadata = service
            .metadata(tonic::Request::new(Empty {}))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(metadata, ModelMetadata::default());
    }

    #[test]
    fn test_zero_workers_still_serves() {
        let service = GenericService::new(dispatcher_for(EchoModel), 0);
        assert_eq!(service.workers.available_permits(), 1);
    }
}
