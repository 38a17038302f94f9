use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::error;

use crate::models::{SessionError, TokenExchangeRequest, TokenExchangeResponse};

static IDENTITY_CLIENT: OnceCell<Arc<IdentityClient>> = OnceCell::const_new();

/// Relay for the OAuth code exchange. The provider-side proxy holds the
/// client secret; this core only forwards the one-time code and treats
/// the returned credential as opaque.
#[derive(Debug)]
pub struct IdentityClient {
    client: Client,
    base_url: String,
    jwt_secret: String,
    service_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    #[serde(rename = "type")]
    type_: String,
    exp: usize,
}

impl IdentityClient {
    pub fn new(base_url: String, jwt_secret: String, service_name: String) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            jwt_secret,
            service_name,
        }
    }

    fn generate_token(&self) -> String {
        let expiration = Utc::now()
            .checked_add_signed(Duration::seconds(60)) // 1 minute expiration
            .expect("valid timestamp")
            .timestamp();

        let claims = Claims {
            sub: self.service_name.clone(),
            type_: "service".to_string(),
            exp: expiration as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .expect("Failed to generate JWT")
    }

    pub async fn exchange_code(
        &self,
        request: &TokenExchangeRequest,
    ) -> Result<TokenExchangeResponse, SessionError> {
        let token = self.generate_token();
        let url = format!("{}/oauth/token", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", token))
            .json(request)
            .send()
            .await
            .map_err(|e| SessionError::Upstream(format!("identity provider: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Identity provider returned {}: {}", status, body);
            return Err(SessionError::Upstream(format!(
                "identity provider returned {status}: {body}"
            )));
        }

        response
            .json::<TokenExchangeResponse>()
            .await
            .map_err(|e| SessionError::Upstream(format!("identity provider response: {e}")))
    }
}

/// Initialize the global IdentityClient
pub fn init_identity_client(
    base_url: String,
    jwt_secret: String,
    service_name: String,
) -> Result<(), &'static str> {
    let client = IdentityClient::new(base_url, jwt_secret, service_name);
    IDENTITY_CLIENT
        .set(Arc::new(client))
        .map_err(|_| "IdentityClient already initialized")
}

/// Get the global IdentityClient instance
pub fn get_identity_client() -> Option<Arc<IdentityClient>> {
    IDENTITY_CLIENT.get().cloned()
}
