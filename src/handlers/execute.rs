use axum::{http::StatusCode, Json};
use tracing::error;

use crate::clients::exec_client;
use crate::models::{ErrorResponse, ExecuteRequest, ExecuteResponse, SessionError};

/// Relay a run request to the external execution service and pass its
/// output back verbatim. No retry here; retry policy belongs to the
/// caller.
pub async fn execute(
    Json(request): Json<ExecuteRequest>,
) -> Result<(StatusCode, Json<ExecuteResponse>), (StatusCode, Json<ErrorResponse>)> {
    if request.language.trim().is_empty() {
        return Err(SessionError::Validation("language is required".to_string()).into());
    }

    let client = match exec_client::get_exec_client() {
        Some(client) => client,
        None => {
            error!("Execution service not configured");
            let status = StatusCode::INTERNAL_SERVER_ERROR;
            return Err((
                status,
                Json(ErrorResponse {
                    code: status.as_u16(),
                    kind: "unavailable".to_string(),
                    error: "Execution service not configured".to_string(),
                }),
            ));
        }
    };

    let output = client.run(&request).await.map_err(|e| {
        error!("Execution relay failed: {}", e);
        e
    })?;

    Ok((StatusCode::OK, Json(output)))
}
