use crate::models::*;
use utoipa::OpenApi;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
#[allow(dead_code)]
pub async fn health_check_doc() {}

/// Create a new session
#[utoipa::path(
    post,
    path = "/api/v1/sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created", body = Session),
        (status = 400, description = "Validation failure or duplicate room id", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn session_create_doc() {}

/// Fetch a session
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{room_id}",
    responses(
        (status = 200, description = "The session", body = Session),
        (status = 404, description = "No such session", body = ErrorResponse),
        (status = 410, description = "Session expired and was removed", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn session_get_doc() {}

/// List a user's sessions
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}/sessions",
    responses(
        (status = 200, description = "Sessions the user created or joined", body = SessionListResponse)
    )
)]
#[allow(dead_code)]
pub async fn session_list_doc() {}

/// Upload or replace a file
#[utoipa::path(
    put,
    path = "/api/v1/sessions/{room_id}/files/{file_id}",
    request_body = PutFileRequest,
    responses(
        (status = 200, description = "File stored", body = FileMeta),
        (status = 404, description = "No such session", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn file_put_doc() {}

/// Run code through the execution service
#[utoipa::path(
    post,
    path = "/api/v1/execute",
    request_body = ExecuteRequest,
    responses(
        (status = 200, description = "Execution output", body = ExecuteResponse),
        (status = 502, description = "Execution service failed", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn execute_doc() {}

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check_doc,
        session_create_doc,
        session_get_doc,
        session_list_doc,
        file_put_doc,
        execute_doc,
    ),
    components(
        schemas(
            HealthResponse,
            DiagnosticsResponse,
            ErrorResponse,
            Session,
            Creator,
            Participant,
            ChatMessage,
            SessionFile,
            SessionSummary,
            UpdateFields,
            CreateSessionRequest,
            UpdateSessionResponse,
            DeleteSessionResponse,
            SessionListResponse,
            PutFileRequest,
            FileMeta,
            FileListResponse,
            FileResponse,
            DeleteFileResponse,
            ExecuteRequest,
            ExecuteResponse,
            TokenExchangeRequest,
            TokenExchangeResponse,
        )
    ),
    tags(
        (name = "api", description = "Room session API")
    )
)]
pub struct ApiDoc;
