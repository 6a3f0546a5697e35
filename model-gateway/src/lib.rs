//! Model gateway: serves one model over REST, gRPC and a keyed message stream.

pub mod annotations;
pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod model;
pub mod rpc;
pub mod server;
pub mod state;
pub mod stream;
pub mod test_util;

pub use config::Config;
pub use dispatch::{Dispatcher, Invocation, Outcome};
pub use error::{ApplicationError, Error, ModelError, ModelResult, Result};
pub use model::{CapabilitySet, Model, ModelHandle};
pub use state::AppState;
