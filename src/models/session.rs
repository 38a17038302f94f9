use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::models::SessionError;

/// Fixed retention window. `expires_at` is stamped once at creation and is
/// never extended by activity.
pub const SESSION_TTL_DAYS: i64 = 7;

pub const DEFAULT_LANGUAGE: &str = "javascript";
pub const DEFAULT_CODE: &str = "// Start coding here...\n";

pub fn session_ttl() -> Duration {
    Duration::days(SESSION_TTL_DAYS)
}

/// Who created the session. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Creator {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// One entry in the durable participant list. Presence is
/// connection-scoped; this is session-scoped participation history.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: String,
    pub name: String,
    pub joined_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Append-only chat log entry. Timestamps are server-stamped.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub user_id: String,
    pub user_name: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// A shared file. Stored keyed by `fileId`; re-uploading the same id
/// replaces the entry wholesale.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionFile {
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

/// The durable record of one room. One row per `roomId`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub room_id: String,
    pub creator: Creator,
    pub participants: Vec<Participant>,
    pub code: String,
    pub language: String,
    pub messages: Vec<ChatMessage>,
    pub files: BTreeMap<String, SessionFile>,
    #[schema(value_type = Vec<Object>)]
    pub whiteboard_elements: Vec<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Listing entry for `listUserSessions`; everything a picker UI needs
/// without dragging the full document along.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub room_id: String,
    pub creator_name: String,
    pub language: String,
    pub participant_count: i64,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Partial update for `updateFields`. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participants: Option<Vec<Participant>>,
}

impl UpdateFields {
    pub fn is_empty(&self) -> bool {
        self.code.is_none() && self.language.is_none() && self.participants.is_none()
    }
}

/// Validate a caller-supplied room identifier before any state change.
pub fn validate_room_id(room_id: &str) -> Result<(), SessionError> {
    if room_id.trim().is_empty() {
        return Err(SessionError::Validation("roomId is required".to_string()));
    }
    Ok(())
}

/// Validate the creator block of a create request.
pub fn validate_creator(creator: &Creator) -> Result<(), SessionError> {
    if creator.name.trim().is_empty() {
        return Err(SessionError::Validation(
            "creator name is required".to_string(),
        ));
    }
    Ok(())
}
