use axum::{http::StatusCode, Json};
use tracing::error;

use crate::models::{CreateSessionRequest, ErrorResponse, Session};
use crate::services::lifecycle;

/// Create a session for a new room. The caller picks the room id; a live
/// duplicate is rejected before any state change.
pub async fn session_create(
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<Session>), (StatusCode, Json<ErrorResponse>)> {
    let CreateSessionRequest {
        room_id,
        creator,
        code,
        language,
    } = request;

    let session = lifecycle::create_session(&room_id, creator, code, language)
        .await
        .map_err(|e| {
            error!("Failed to create session '{}': {}", room_id, e);
            e
        })?;

    Ok((StatusCode::CREATED, Json(session)))
}
