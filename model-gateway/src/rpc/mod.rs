//! gRPC binding.
//!
//! The `modelgateway.v1` services are generated at build time; their
//! messages are the canonical types, carried by [`codec::JsonCodec`].
//! `Generic` exposes every call, the role services (`Model`, `Router`,
//! `Transformer`, `OutputTransformer`, `Combiner`, `Seldon`) expose the
//! subset of their graph role. All share one worker pool.

pub mod codec;
mod roles;
mod service;
pub mod status;

use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::server::Router;
use tonic::transport::Server;
use tower_http::trace::TraceLayer;

use crate::config::RpcConfig;
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};

pub use service::GenericService;

include!(concat!(env!("OUT_DIR"), "/modelgateway.v1.Generic.rs"));
include!(concat!(env!("OUT_DIR"), "/modelgateway.v1.Model.rs"));
include!(concat!(env!("OUT_DIR"), "/modelgateway.v1.Router.rs"));
include!(concat!(env!("OUT_DIR"), "/modelgateway.v1.Transformer.rs"));
include!(concat!(env!("OUT_DIR"), "/modelgateway.v1.OutputTransformer.rs"));
include!(concat!(env!("OUT_DIR"), "/modelgateway.v1.Combiner.rs"));
include!(concat!(env!("OUT_DIR"), "/modelgateway.v1.Seldon.rs"));

/// Input of calls that carry no message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Empty {}

/// Apply the optional message size limit to a generated server.
macro_rules! limited {
    ($server:expr, $limit:expr) => {
        match $limit {
            Some(limit) => $server
                .max_decoding_message_size(limit)
                .max_encoding_message_size(limit),
            None => $server,
        }
    };
}

/// Register the generic and every role service on `builder`.
fn add_services<L: Clone>(
    mut builder: Server<L>,
    service: GenericService,
    max_message_size: Option<usize>,
) -> Router<L> {
    builder
        .add_service(limited!(
            generic_server::GenericServer::new(service.clone()),
            max_message_size
        ))
        .add_service(limited!(
            model_server::ModelServer::new(service.clone()),
            max_message_size
        ))
        .add_service(limited!(
            router_server::RouterServer::new(service.clone()),
            max_message_size
        ))
        .add_service(limited!(
            transformer_server::TransformerServer::new(service.clone()),
            max_message_size
        ))
        .add_service(limited!(
            output_transformer_server::OutputTransformerServer::new(service.clone()),
            max_message_size
        ))
        .add_service(limited!(
            combiner_server::CombinerServer::new(service.clone()),
            max_message_size
        ))
        .add_service(limited!(
            seldon_server::SeldonServer::new(service),
            max_message_size
        ))
}

/// Serve the gRPC binding on `listener` until the server fails.
///
/// `max_message_size` bounds both decoded and encoded messages when set.
pub async fn serve(
    listener: TcpListener,
    config: &RpcConfig,
    max_message_size: Option<usize>,
    dispatcher: Dispatcher,
) -> Result<()> {
    let service = GenericService::new(dispatcher, config.workers);
    if let Some(limit) = max_message_size {
        tracing::info!(limit, "Applying gRPC message size limit");
    }

    let addr = listener
        .local_addr()
        .map_err(|e| Error::Transport(e.to_string()))?;
    tracing::info!(%addr, workers = config.workers, "gRPC listening");
    let incoming = TcpListenerStream::new(listener);

    let served = if config.tracing {
        let builder = Server::builder().layer(TraceLayer::new_for_grpc());
        add_services(builder, service, max_message_size)
            .serve_with_incoming(incoming)
            .await
    } else {
        add_services(Server::builder(), service, max_message_size)
            .serve_with_incoming(incoming)
            .await
    };

    served.map_err(|e| Error::Transport(format!("gRPC server failed: {}", e)))
}
