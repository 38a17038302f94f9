use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenExchangeRequest {
    pub code: String,
    #[serde(default)]
    pub redirect_uri: Option<String>,
}

/// Opaque credential from the identity provider. The profile shape is the
/// provider's; it is passed through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenExchangeResponse {
    pub access_token: String,
    #[schema(value_type = Object)]
    pub profile: serde_json::Value,
}
