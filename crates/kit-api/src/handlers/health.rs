use axum::response::IntoResponse;
use axum::Json;

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "labkit",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
