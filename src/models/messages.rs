use serde::{Deserialize, Serialize};

use crate::models::ChatMessage;

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct JoinMessage {
    pub room_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub user_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LeaveMessage {
    pub room_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageEvent {
    pub room_id: String,
    pub message: String,
}

/// Whole-document overwrite. `file_id` scopes the change to an open file;
/// absent means the main editor buffer.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CodeChangeMessage {
    pub room_id: String,
    pub content: String,
    #[serde(default)]
    pub file_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FileChangeMessage {
    pub room_id: String,
    pub file_id: String,
    pub content: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct WhiteboardChangeMessage {
    pub room_id: String,
    pub elements: Vec<serde_json::Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatMessage {
    pub room_id: String,
}

/// Everything a client may send over the realtime channel.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "join")]
    Join(JoinMessage),
    #[serde(rename = "leave")]
    Leave(LeaveMessage),
    #[serde(rename = "chatMessage")]
    Chat(ChatMessageEvent),
    #[serde(rename = "codeChange")]
    CodeChange(CodeChangeMessage),
    #[serde(rename = "fileChange")]
    FileChange(FileChangeMessage),
    #[serde(rename = "whiteboardChange")]
    WhiteboardChange(WhiteboardChangeMessage),
    #[serde(rename = "heartbeat")]
    Heartbeat(HeartbeatMessage),
}

/// Live-roster entry: distinct identities with at least one connection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub user_id: String,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RosterUpdatedMessage {
    pub participants: Vec<RosterEntry>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MessageReceivedMessage {
    pub message: ChatMessage,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FileContentChangedMessage {
    #[serde(default)]
    pub file_id: Option<String>,
    pub content: String,
    pub origin_user_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct WhiteboardUpdatedMessage {
    pub elements: Vec<serde_json::Value>,
    pub origin_user_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ChannelErrorMessage {
    pub kind: String,
    pub error: String,
}

/// Everything the server may push to a client.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "rosterUpdated")]
    RosterUpdated(RosterUpdatedMessage),
    #[serde(rename = "messageReceived")]
    MessageReceived(MessageReceivedMessage),
    #[serde(rename = "fileContentChanged")]
    FileContentChanged(FileContentChangedMessage),
    #[serde(rename = "whiteboardUpdated")]
    WhiteboardUpdated(WhiteboardUpdatedMessage),
    #[serde(rename = "error")]
    Error(ChannelErrorMessage),
}
