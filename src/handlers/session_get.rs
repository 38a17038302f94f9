use axum::{extract::Path, http::StatusCode, Json};
use tracing::error;

use crate::handlers::require_db;
use crate::models::{ErrorResponse, Session};

/// Fetch the full session document. An expired session answers 410 and
/// is reaped; asking again then answers 404.
pub async fn session_get(
    Path(room_id): Path<String>,
) -> Result<(StatusCode, Json<Session>), (StatusCode, Json<ErrorResponse>)> {
    let db = require_db()?;

    let session = db.get_session(&room_id).await.map_err(|e| {
        error!("Failed to load session '{}': {}", room_id, e);
        e
    })?;

    Ok((StatusCode::OK, Json(session)))
}
