//! Model gateway binary, serving the built-in mean model.

use std::env;
use std::sync::Arc;

use model_gateway::model::MeanModel;
use model_gateway::{logging, server, Config};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    println!("model-gateway {}", VERSION);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle --version / -V
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--version" || a == "-V") {
        print_version();
        return Ok(());
    }

    let config = Config::load().map_err(|e| {
        format!(
            "Failed to load configuration: {}. \
             Check config.toml and GATEWAY__SECTION__KEY environment variables.",
            e
        )
    })?;
    logging::init(&config.logging.level);

    tracing::info!(
        rest = config.rest.enabled,
        rpc = config.rpc.enabled,
        stream = config.stream.enabled,
        unit = config.deployment.unit_id().unwrap_or("-"),
        "Starting model-gateway {}",
        VERSION
    );

    server::serve(config, Arc::new(MeanModel)).await?;
    Ok(())
}
