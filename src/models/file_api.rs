use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use utoipa::ToSchema;

use crate::models::SessionFile;

/// Upload payload. `size` is derived server-side from the decoded bytes,
/// never trusted from the client.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PutFileRequest {
    pub name: String,
    #[serde_as(as = "Base64")]
    #[schema(value_type = String, format = Byte)]
    pub content: Vec<u8>,
    pub mime: String,
    pub uploaded_by: String,
    pub uploader_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    pub file_id: String,
    pub name: String,
    pub mime: String,
    pub size: i64,
    pub uploaded_by: String,
    pub uploader_name: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileListResponse {
    pub files: Vec<FileMeta>,
}

#[serde_as]
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileResponse {
    pub file_id: String,
    pub name: String,
    #[serde_as(as = "Base64")]
    #[schema(value_type = String, format = Byte)]
    pub content: Vec<u8>,
    pub mime: String,
    pub size: i64,
    pub uploaded_by: String,
    pub uploader_name: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteFileResponse {
    pub success: bool,
}

impl FileMeta {
    pub fn from_entry(file_id: &str, file: &SessionFile) -> Self {
        FileMeta {
            file_id: file_id.to_string(),
            name: file.name.clone(),
            mime: file.mime.clone(),
            size: file.size,
            uploaded_by: file.uploaded_by.clone(),
            uploader_name: file.uploader_name.clone(),
            uploaded_at: file.uploaded_at,
        }
    }
}

impl FileResponse {
    pub fn from_entry(file_id: &str, file: SessionFile) -> Self {
        FileResponse {
            file_id: file_id.to_string(),
            name: file.name,
            content: file.content,
            mime: file.mime,
            size: file.size,
            uploaded_by: file.uploaded_by,
            uploader_name: file.uploader_name,
            uploaded_at: file.uploaded_at,
        }
    }
}
