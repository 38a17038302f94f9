use axum::{extract::Path, http::StatusCode, Json};
use chrono::Utc;
use tracing::error;

use crate::handlers::require_db;
use crate::models::{ErrorResponse, FileMeta, PutFileRequest, SessionError, SessionFile};

/// Upload or replace a file. Upsert semantics keyed by `file_id`: a
/// re-upload replaces the entry wholesale, never duplicates it.
pub async fn file_put(
    Path((room_id, file_id)): Path<(String, String)>,
    Json(request): Json<PutFileRequest>,
) -> Result<(StatusCode, Json<FileMeta>), (StatusCode, Json<ErrorResponse>)> {
    if request.name.trim().is_empty() {
        return Err(SessionError::Validation("file name is required".to_string()).into());
    }

    let size = request.content.len() as i64;
    let file = SessionFile {
        name: request.name,
        content: request.content,
        mime: request.mime,
        size,
        uploaded_by: request.uploaded_by,
        uploader_name: request.uploader_name,
        uploaded_at: Utc::now(),
    };
    let meta = FileMeta::from_entry(&file_id, &file);

    let db = require_db()?;
    db.upsert_file(&room_id, &file_id, file).await.map_err(|e| {
        error!(
            "Failed to store file '{}' in session '{}': {}",
            file_id, room_id, e
        );
        e
    })?;

    Ok((StatusCode::OK, Json(meta)))
}
