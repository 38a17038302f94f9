use axum::{http::StatusCode, Json};
use tracing::error;

use crate::clients::identity_client;
use crate::models::{ErrorResponse, SessionError, TokenExchangeRequest, TokenExchangeResponse};

/// Exchange an OAuth authorization code through the identity provider.
/// The returned credential is opaque to this service.
pub async fn token_exchange(
    Json(request): Json<TokenExchangeRequest>,
) -> Result<(StatusCode, Json<TokenExchangeResponse>), (StatusCode, Json<ErrorResponse>)> {
    if request.code.trim().is_empty() {
        return Err(SessionError::Validation("code is required".to_string()).into());
    }

    let client = match identity_client::get_identity_client() {
        Some(client) => client,
        None => {
            error!("Identity provider not configured");
            let status = StatusCode::INTERNAL_SERVER_ERROR;
            return Err((
                status,
                Json(ErrorResponse {
                    code: status.as_u16(),
                    kind: "unavailable".to_string(),
                    error: "Identity provider not configured".to_string(),
                }),
            ));
        }
    };

    let token = client.exchange_code(&request).await.map_err(|e| {
        error!("Token exchange failed: {}", e);
        e
    })?;

    Ok((StatusCode::OK, Json(token)))
}
