use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Response for an error
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub code: u16,
    pub kind: String,
    pub error: String,
}

/// Failure taxonomy for session operations.
///
/// `Expired` is deliberately distinct from `NotFound` so clients can tell
/// "this session expired" apart from "never existed".
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("{0}")]
    Validation(String),

    #[error("Session '{0}' not found")]
    NotFound(String),

    #[error("Session '{0}' already exists")]
    AlreadyExists(String),

    #[error("Session '{0}' has expired")]
    Expired(String),

    #[error("File '{1}' not found in session '{0}'")]
    FileNotFound(String, String),

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Session store not initialized")]
    Unavailable,

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl SessionError {
    /// Machine-readable kind, stable across releases.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::Validation(_) => "validation_error",
            SessionError::NotFound(_) => "not_found",
            SessionError::AlreadyExists(_) => "already_exists",
            SessionError::Expired(_) => "expired",
            SessionError::FileNotFound(_, _) => "file_not_found",
            SessionError::Upstream(_) => "upstream_failure",
            SessionError::Unavailable => "unavailable",
            SessionError::Db(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            SessionError::Validation(_) | SessionError::AlreadyExists(_) => StatusCode::BAD_REQUEST,
            SessionError::NotFound(_) | SessionError::FileNotFound(_, _) => StatusCode::NOT_FOUND,
            SessionError::Expired(_) => StatusCode::GONE,
            SessionError::Upstream(_) => StatusCode::BAD_GATEWAY,
            SessionError::Unavailable | SessionError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SessionError> for (StatusCode, Json<ErrorResponse>) {
    fn from(err: SessionError) -> Self {
        let status = err.status();
        (
            status,
            Json(ErrorResponse {
                code: status.as_u16(),
                kind: err.kind().to_string(),
                error: err.to_string(),
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_maps_to_gone_not_404() {
        let err = SessionError::Expired("abc123".into());
        assert_eq!(err.status(), StatusCode::GONE);
        assert_eq!(err.kind(), "expired");

        let err = SessionError::NotFound("abc123".into());
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn duplicate_create_maps_to_bad_request() {
        let err = SessionError::AlreadyExists("abc123".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let (status, body) = <(StatusCode, Json<ErrorResponse>)>::from(err);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.kind, "already_exists");
    }
}
