use axum::{
    extract::{Path, Query},
    http::StatusCode,
    Json,
};
use tracing::error;

use crate::handlers::require_db;
use crate::models::{ErrorResponse, SessionListQuery, SessionListResponse};

const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 50;

/// Sessions the user created or participated in, most recently active
/// first. Expired sessions never appear.
pub async fn session_list(
    Path(user_id): Path<String>,
    Query(query): Query<SessionListQuery>,
) -> Result<(StatusCode, Json<SessionListResponse>), (StatusCode, Json<ErrorResponse>)> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let db = require_db()?;
    let sessions = db.list_user_sessions(&user_id, limit).await.map_err(|e| {
        error!("Failed to list sessions for user '{}': {}", user_id, e);
        e
    })?;

    Ok((StatusCode::OK, Json(SessionListResponse { sessions })))
}
