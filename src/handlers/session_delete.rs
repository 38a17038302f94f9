use axum::{extract::Path, http::StatusCode, Json};
use tracing::{error, info};

use crate::handlers::require_db;
use crate::models::{DeleteSessionResponse, ErrorResponse};
use crate::ws::handler::invalidate_session_gate;

/// Hard-delete a session. The room id becomes immediately reusable.
pub async fn session_delete(
    Path(room_id): Path<String>,
) -> Result<(StatusCode, Json<DeleteSessionResponse>), (StatusCode, Json<ErrorResponse>)> {
    let db = require_db()?;

    db.delete_session(&room_id).await.map_err(|e| {
        error!("Failed to delete session '{}': {}", room_id, e);
        e
    })?;

    // The realtime join gate must not outlive the row it vouches for.
    invalidate_session_gate(&room_id).await;

    info!("Session '{}' deleted by request", room_id);
    Ok((StatusCode::OK, Json(DeleteSessionResponse { success: true })))
}
