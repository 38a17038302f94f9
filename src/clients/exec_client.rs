use reqwest::Client;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::error;

use crate::models::{ExecuteRequest, ExecuteResponse, SessionError};

static EXEC_CLIENT: OnceCell<Arc<ExecClient>> = OnceCell::const_new();

/// Thin relay to the external code-execution service. The core never
/// interprets or sandboxes code; stdout/stderr/compileError come back
/// verbatim.
#[derive(Debug)]
pub struct ExecClient {
    client: Client,
    base_url: String,
}

impl ExecClient {
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    pub async fn run(&self, request: &ExecuteRequest) -> Result<ExecuteResponse, SessionError> {
        let url = format!("{}/execute", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| SessionError::Upstream(format!("execution service: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Execution service returned {}: {}", status, body);
            return Err(SessionError::Upstream(format!(
                "execution service returned {status}: {body}"
            )));
        }

        response
            .json::<ExecuteResponse>()
            .await
            .map_err(|e| SessionError::Upstream(format!("execution service response: {e}")))
    }
}

/// Initialize the global ExecClient
pub fn init_exec_client(base_url: String) -> Result<(), &'static str> {
    EXEC_CLIENT
        .set(Arc::new(ExecClient::new(base_url)))
        .map_err(|_| "ExecClient already initialized")
}

/// Get the global ExecClient instance
pub fn get_exec_client() -> Option<Arc<ExecClient>> {
    EXEC_CLIENT.get().cloned()
}
