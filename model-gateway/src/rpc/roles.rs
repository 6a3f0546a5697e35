//! Role services (`Model`, `Router`, ...) backed by [`GenericService`].

use model_gateway_common::{Feedback, MessageList, ModelMetadata, Request, Response};
use tonic::Status;

use super::generic_server::Generic;
use super::{
    combiner_server, model_server, output_transformer_server, router_server, seldon_server,
    transformer_server, Empty, GenericService,
};

/// Implement a role trait by forwarding each listed call to `Generic`.
macro_rules! role_service {
    ($role:path { $($method:ident($input:ty) -> $output:ty;)* }) => {
        #[tonic::async_trait]
        impl $role for GenericService {
            $(
                async fn $method(
                    &self,
                    request: tonic::Request<$input>,
                ) -> Result<tonic::Response<$output>, Status> {
                    Generic::$method(self, request).await
                }
            )*
        }
    };
}

role_service!(model_server::Model {
    predict(Request) -> Response;
    send_feedback(Feedback) -> Response;
    metadata(Empty) -> ModelMetadata;
});

role_service!(router_server::Router {
    route(Request) -> Response;
    send_feedback(Feedback) -> Response;
});

role_service!(transformer_server::Transformer {
    transform_input(Request) -> Response;
});

role_service!(output_transformer_server::OutputTransformer {
    transform_output(Request) -> Response;
});

role_service!(combiner_server::Combiner {
    aggregate(MessageList) -> Response;
});

role_service!(seldon_server::Seldon {
    predict(Request) -> Response;
    send_feedback(Feedback) -> Response;
});
