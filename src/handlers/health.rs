use crate::models::HealthResponse;
use axum::Json;
use tracing::debug;

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    debug!("Health check requested");
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Server is running".to_string(),
    })
}

/// Readiness check endpoint
pub async fn ready_check() -> Json<HealthResponse> {
    debug!("Readiness check requested");
    let message = match crate::db::dbsessions::get_db() {
        Some(_) => "Service is ready".to_string(),
        None => "Session store not initialized".to_string(),
    };
    Json(HealthResponse {
        status: "ok".to_string(),
        message,
    })
}
