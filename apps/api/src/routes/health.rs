use axum::Json;
use serde_json::{json, Value};

/// GET /health
/// Liveness check. Never touches the database.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": env!("CARGO_PKG_NAME")
    }))
}
