use axum::{extract::Path, http::StatusCode, Json};
use tracing::error;

use crate::handlers::require_db;
use crate::models::{DeleteFileResponse, ErrorResponse};

pub async fn file_delete(
    Path((room_id, file_id)): Path<(String, String)>,
) -> Result<(StatusCode, Json<DeleteFileResponse>), (StatusCode, Json<ErrorResponse>)> {
    let db = require_db()?;

    db.delete_file(&room_id, &file_id).await.map_err(|e| {
        error!(
            "Failed to delete file '{}' from session '{}': {}",
            file_id, room_id, e
        );
        e
    })?;

    Ok((StatusCode::OK, Json(DeleteFileResponse { success: true })))
}
