//! Runs the enabled bindings side by side over one model.

use std::path::Path;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinSet;

use crate::annotations;
use crate::api;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::model::{Model, ModelHandle};
use crate::rpc;
use crate::state::AppState;
use crate::stream::{self, StreamWorker};

async fn bind(binding: &str, host: &str, port: u16) -> Result<TcpListener> {
    let addr = format!("{}:{}", host, port);
    TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Transport(format!("{} failed to bind {}: {}", binding, addr, e)))
}

/// Serve `model` until one binding fails.
///
/// Startup problems (no binding enabled, incomplete stream identity, bad
/// annotations, busy ports) are reported before anything is served.
pub async fn serve(config: Config, model: Arc<dyn Model>) -> Result<()> {
    if !config.rest.enabled && !config.rpc.enabled && !config.stream.enabled {
        return Err(Error::Configuration("no binding enabled".to_string()));
    }

    let handle = Arc::new(ModelHandle::new(model));
    let mut dispatcher = Dispatcher::new(handle);
    if let Some(unit) = config.deployment.unit_id() {
        dispatcher = dispatcher.with_unit_id(unit);
    }

    let mut tasks: JoinSet<(&'static str, Result<()>)> = JoinSet::new();

    if config.stream.enabled {
        // Identity is checked before any broker connection is attempted.
        config.deployment.identity()?;
        let transport = stream::connect(&config.stream).await?;
        let worker = StreamWorker::new(
            &config.deployment,
            &config.stream,
            dispatcher.clone(),
            transport,
        )?;
        tasks.spawn(async move { ("stream", worker.run().await) });
    }

    if config.rpc.enabled {
        let annotations = annotations::load(Path::new(&config.deployment.annotations_path))?;
        let max_message_size = annotations::max_message_size(&annotations)?;
        let listener = bind("gRPC", &config.rpc.host, config.rpc.port).await?;
        let rpc_config = config.rpc.clone();
        let dispatcher = dispatcher.clone();
        tasks.spawn(async move {
            let result = rpc::serve(listener, &rpc_config, max_message_size, dispatcher).await;
            ("rpc", result)
        });
    }

    if config.rest.enabled {
        let listener = bind("REST", &config.rest.host, config.rest.port).await?;
        tracing::info!("REST listening on {}:{}", config.rest.host, config.rest.port);
        let app = api::router(Arc::new(AppState::new(config.clone(), dispatcher)));
        tasks.spawn(async move {
            let result = axum::serve(listener, app)
                .await
                .map_err(|e| Error::Transport(format!("REST server failed: {}", e)));
            ("rest", result)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((binding, Ok(()))) => tracing::info!(binding, "Binding stopped"),
            Ok((binding, Err(e))) => {
                tracing::error!(binding, error = %e, "Binding failed, shutting down");
                tasks.abort_all();
                return Err(e);
            }
            Err(e) => {
                tasks.abort_all();
                return Err(Error::Transport(format!("binding task aborted: {}", e)));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{test_config, EchoModel};

    #[tokio::test]
    async fn test_nothing_enabled_is_rejected() {
        let mut config = test_config();
        config.rest.enabled = false;
        config.rpc.enabled = false;
        let err = serve(config, Arc::new(EchoModel)).await.unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[tokio::test]
    async fn test_stream_without_identity_is_rejected() {
        let mut config = test_config();
        config.rest.enabled = false;
        config.rpc.enabled = false;
        config.stream.enabled = true;
        config.deployment.predictor_id = None;
        let err = serve(config, Arc::new(EchoModel)).await.unwrap_err();
        assert!(matches!(err, Error::Configuration(msg) if msg.contains("predictor_id")));
    }
}
