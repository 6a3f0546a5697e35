//! Shared REST application state.

use crate::config::Config;
use crate::dispatch::Dispatcher;

/// Shared application state passed to all handlers.
pub struct AppState {
    pub config: Config,
    pub dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(config: Config, dispatcher: Dispatcher) -> Self {
        Self { config, dispatcher }
    }
}
