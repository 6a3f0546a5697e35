//! REST (HTTP/JSON) binding.

pub mod handler;
pub mod health;
pub mod routes;

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, on};
use axum::{middleware, Router};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeFile;

use crate::logging::request_logger;
use crate::state::AppState;
use routes::ROUTES;

/// Build the REST application.
pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new().route("/health/ping", get(health::ping));

    for entry in ROUTES {
        let Some(filter) = entry.method_filter() else {
            continue;
        };
        let operation = entry.operation;
        app = app.route(
            entry.path,
            on(
                filter,
                move |State(state): State<Arc<AppState>>,
                      Query(params): Query<HashMap<String, String>>,
                      headers: HeaderMap,
                      body: Bytes| {
                    handler::invoke(state, operation, params, headers, body)
                },
            ),
        );
    }

    if let Some(path) = &state.config.rest.openapi_path {
        app = app.route_service("/seldon.json", ServeFile::new(path));
    }

    app.layer(middleware::from_fn(request_logger))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
