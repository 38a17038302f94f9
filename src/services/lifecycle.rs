use tokio::sync::mpsc;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::db::dbsessions;
use crate::models::{
    validate_creator, validate_room_id, ChatMessage, Creator, Session, SessionError, UpdateFields,
};

/// Create the durable record for a new room. Validation happens before
/// any state change; the store stamps the fixed retention window.
pub async fn create_session(
    room_id: &str,
    creator: Creator,
    initial_code: Option<String>,
    language: Option<String>,
) -> Result<Session, SessionError> {
    validate_room_id(room_id)?;
    validate_creator(&creator)?;

    let db = dbsessions::get_db().ok_or(SessionError::Unavailable)?;
    db.create_session(room_id, creator, initial_code, language)
        .await
}

/// A canonical-state mutation queued behind a realtime broadcast.
#[derive(Debug, Clone)]
pub enum StoreWrite {
    SetCode(String),
    SetFileContent { file_id: String, content: String },
    AppendChat(ChatMessage),
    SetWhiteboard(Vec<serde_json::Value>),
}

/// Spawn the per-room store writer. Writes for one room apply strictly in
/// the order they were queued; the task exits when its room actor drops
/// the sender.
pub fn spawn_store_writer(room_id: String) -> mpsc::UnboundedSender<StoreWrite> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(write) = rx.recv().await {
            apply_store_write(&room_id, write).await;
        }
    });
    tx
}

/// Apply one queued mutation. Best-effort: a failure here is logged and
/// never retracts the broadcast that already went out; the inconsistency
/// window closes on the next successful write.
pub async fn apply_store_write(room_id: &str, write: StoreWrite) {
    let Some(db) = dbsessions::get_db() else {
        debug!("Store not initialized; dropping write for room '{}'", room_id);
        return;
    };

    let result = match write {
        StoreWrite::SetCode(content) => {
            db.update_fields(
                room_id,
                UpdateFields {
                    code: Some(content),
                    ..Default::default()
                },
            )
            .await
        }
        StoreWrite::SetFileContent { file_id, content } => {
            db.update_file_content(room_id, &file_id, &content).await
        }
        StoreWrite::AppendChat(message) => db.append_message(room_id, message).await,
        StoreWrite::SetWhiteboard(elements) => db.update_whiteboard(room_id, elements).await,
    };

    if let Err(e) = result {
        warn!("Background persist failed for room '{}': {}", room_id, e);
    }
}

/// Periodic reclamation of expired sessions, independent of request
/// traffic. Coexists with expiry-on-read in the store.
pub async fn expiry_sweep(interval_secs: u64) {
    let mut tick = time::interval(time::Duration::from_secs(interval_secs));
    loop {
        tick.tick().await;
        let Some(db) = dbsessions::get_db() else {
            continue;
        };
        match db.delete_expired().await {
            Ok(0) => {}
            Ok(n) => info!("Expiry sweep removed {} session(s)", n),
            Err(e) => error!("Expiry sweep failed: {}", e),
        }
    }
}
