use crate::handlers::{
    diagnostics, execute, file_delete, file_get, file_list, file_put, health_check, ready_check,
    session_create, session_delete, session_get, session_list, session_update, token_exchange,
};
use crate::ws::handler::websocket_handler;
use crate::ws::registry::RoomRegistry;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Create API routes
pub fn create_api_routes(registry: Arc<RoomRegistry>) -> Router {
    Router::<Arc<RoomRegistry>>::new()
        .route("/v1/health", get(health_check))
        .route("/v1/ready", get(ready_check))
        .route("/v1/diagnostics", get(diagnostics))
        .route("/v1/sessions", post(session_create))
        .route(
            "/v1/sessions/:room_id",
            get(session_get).put(session_update).delete(session_delete),
        )
        .route("/v1/users/:user_id/sessions", get(session_list))
        .route("/v1/sessions/:room_id/files", get(file_list))
        .route(
            "/v1/sessions/:room_id/files/:file_id",
            get(file_get).put(file_put).delete(file_delete),
        )
        .route("/v1/execute", post(execute))
        .route("/v1/auth/token", post(token_exchange))
        .route("/v1/ws", get(websocket_handler))
        .with_state(registry)
}
