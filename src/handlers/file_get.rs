use axum::{extract::Path, http::StatusCode, Json};
use tracing::error;

use crate::handlers::require_db;
use crate::models::{ErrorResponse, FileListResponse, FileMeta, FileResponse, SessionError};

/// List file metadata for a session. Content stays out of the listing.
pub async fn file_list(
    Path(room_id): Path<String>,
) -> Result<(StatusCode, Json<FileListResponse>), (StatusCode, Json<ErrorResponse>)> {
    let db = require_db()?;
    let session = db.get_session(&room_id).await.map_err(|e| {
        error!("Failed to load session '{}': {}", room_id, e);
        e
    })?;

    let files = session
        .files
        .iter()
        .map(|(file_id, file)| FileMeta::from_entry(file_id, file))
        .collect();

    Ok((StatusCode::OK, Json(FileListResponse { files })))
}

/// Fetch one file, content included.
pub async fn file_get(
    Path((room_id, file_id)): Path<(String, String)>,
) -> Result<(StatusCode, Json<FileResponse>), (StatusCode, Json<ErrorResponse>)> {
    let db = require_db()?;
    let mut session = db.get_session(&room_id).await.map_err(|e| {
        error!("Failed to load session '{}': {}", room_id, e);
        e
    })?;

    let Some(file) = session.files.remove(&file_id) else {
        return Err(SessionError::FileNotFound(room_id, file_id).into());
    };

    Ok((StatusCode::OK, Json(FileResponse::from_entry(&file_id, file))))
}
