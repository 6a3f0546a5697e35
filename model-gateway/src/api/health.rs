//! Liveness endpoint.

/// GET /health/ping - answers without touching the model.
pub async fn ping() -> &'static str {
    "pong"
}
