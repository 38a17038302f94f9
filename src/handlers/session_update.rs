use axum::{extract::Path, http::StatusCode, Json};
use tracing::error;

use crate::handlers::require_db;
use crate::models::{ErrorResponse, SessionError, UpdateFields, UpdateSessionResponse};

/// Merge a partial update into the session. Only code, language and the
/// participant list are writable this way; everything else has its own
/// operation.
pub async fn session_update(
    Path(room_id): Path<String>,
    Json(fields): Json<UpdateFields>,
) -> Result<(StatusCode, Json<UpdateSessionResponse>), (StatusCode, Json<ErrorResponse>)> {
    if fields.is_empty() {
        return Err(SessionError::Validation("no fields to update".to_string()).into());
    }

    let db = require_db()?;
    db.update_fields(&room_id, fields).await.map_err(|e| {
        error!("Failed to update session '{}': {}", room_id, e);
        e
    })?;

    Ok((StatusCode::OK, Json(UpdateSessionResponse { success: true })))
}
