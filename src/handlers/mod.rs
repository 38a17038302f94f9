pub mod diagnostics;
pub mod execute;
pub mod file_delete;
pub mod file_get;
pub mod file_put;
pub mod health;
pub mod session_create;
pub mod session_delete;
pub mod session_get;
pub mod session_list;
pub mod session_update;
pub mod token_exchange;

pub use diagnostics::*;
pub use execute::*;
pub use file_delete::*;
pub use file_get::*;
pub use file_put::*;
pub use health::*;
pub use session_create::*;
pub use session_delete::*;
pub use session_get::*;
pub use session_list::*;
pub use session_update::*;
pub use token_exchange::*;

use axum::{http::StatusCode, Json};
use std::sync::Arc;
use tracing::error;

use crate::db::dbsessions::{self, DbSessions};
use crate::models::{ErrorResponse, SessionError};

/// Fetch the global store handle or fail the request with a 500.
pub(crate) fn require_db() -> Result<Arc<DbSessions>, (StatusCode, Json<ErrorResponse>)> {
    dbsessions::get_db().ok_or_else(|| {
        error!("Database not initialized");
        SessionError::Unavailable.into()
    })
}
