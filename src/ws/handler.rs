use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, OnceCell};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::dbsessions;
use crate::models::{
    ChannelErrorMessage, ClientMessage, ServerMessage, SessionError,
};
use crate::ws::presence::{ConnectionPhase, Identity};
use crate::ws::registry::{PeerHandle, RoomEvent, RoomMembership, RoomRegistry, OUTBOUND_BUFFER};

/// Cached immutable session facts, enough to admit a connection without
/// re-reading the full document on every join and heartbeat.
#[derive(Clone, Debug)]
struct SessionGate {
    expires_at: DateTime<Utc>,
}

/// Global gate cache instance
static SESSION_GATE: OnceCell<Cache<String, SessionGate>> = OnceCell::const_new();

/// Initialize the session gate cache.
///
/// This should be called once at application startup. Entries idle out
/// after 5 minutes; expiry is re-checked on every hit regardless.
pub async fn init_session_gate() {
    SESSION_GATE
        .get_or_init(|| async {
            Cache::builder()
                .max_capacity(100_000)
                .time_to_idle(Duration::from_secs(300))
                .build()
        })
        .await;
    info!("Session gate cache initialized");
}

fn session_gate() -> &'static Cache<String, SessionGate> {
    SESSION_GATE
        .get()
        .expect("Session gate cache not initialized. Call init_session_gate() first.")
}

/// Drop a room's gate entry. Hard deletes must call this: the gate only
/// re-checks expiry on its own, so a cached entry would keep admitting
/// joins to a room whose durable record is already gone.
pub async fn invalidate_session_gate(room_id: &str) {
    if let Some(cache) = SESSION_GATE.get() {
        cache.invalidate(room_id).await;
    }
}

/// Admit a connection to a room: the session must exist and be live.
async fn check_session(room_id: &str) -> Result<(), SessionError> {
    let cache = session_gate();
    if let Some(gate) = cache.get(room_id).await {
        if Utc::now() <= gate.expires_at {
            return Ok(());
        }
        cache.invalidate(room_id).await;
    }

    let db = dbsessions::get_db().ok_or(SessionError::Unavailable)?;
    let session = db.get_session(room_id).await?;
    cache
        .insert(
            room_id.to_string(),
            SessionGate {
                expires_at: session.expires_at,
            },
        )
        .await;
    Ok(())
}

/// WebSocket handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(registry): State<Arc<RoomRegistry>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, registry))
}

/// Handle one WebSocket connection for its whole lifetime.
async fn handle_socket(socket: WebSocket, registry: Arc<RoomRegistry>) {
    // The transport connection id is the origin for echo suppression.
    let conn_id = Uuid::new_v4();
    info!("WebSocket connection established: {}", conn_id);

    let (mut sender, mut receiver) = socket.split();

    // All server->client traffic funnels through one bounded queue; the
    // room actor drops rather than blocks when this backs up.
    let (out_tx, mut out_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_BUFFER);

    // Pump queued messages onto the socket.
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to serialize server message: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Read, dispatch, and clean up on disconnect.
    let mut recv_task = tokio::spawn(async move {
        let mut phase = ConnectionPhase::Connecting;
        let mut membership: Option<(RoomMembership, Identity)> = None;

        while let Some(Ok(Message::Text(raw))) = receiver.next().await {
            let msg: ClientMessage = match serde_json::from_str(&raw) {
                Ok(msg) => msg,
                Err(e) => {
                    warn!("Unparseable message on connection {}: {}", conn_id, e);
                    send_channel_error(
                        &out_tx,
                        "validation_error",
                        &format!("unrecognized message: {e}"),
                    )
                    .await;
                    continue;
                }
            };

            match msg {
                ClientMessage::Join(join) if phase == ConnectionPhase::Connecting => {
                    if let Err(e) = check_session(&join.room_id).await {
                        warn!(
                            "Join rejected for room '{}' on connection {}: {}",
                            join.room_id, conn_id, e
                        );
                        send_channel_error(&out_tx, e.kind(), &e.to_string()).await;
                        continue;
                    }

                    let identity = Identity {
                        user_id: join
                            .user_id
                            .clone()
                            .unwrap_or_else(|| Uuid::new_v4().to_string()),
                        name: join.user_name.clone(),
                    };

                    // Reconcile the durable participant list before the
                    // live roster changes hands.
                    if let Some(db) = dbsessions::get_db() {
                        if let Err(e) = db
                            .record_participant(&join.room_id, &identity.user_id, &identity.name)
                            .await
                        {
                            warn!(
                                "Participant reconcile failed for room '{}': {}",
                                join.room_id, e
                            );
                        }
                    }

                    let peer = PeerHandle {
                        conn_id,
                        identity: identity.clone(),
                        outbound: out_tx.clone(),
                    };
                    let (joined, _roster) = registry.join_room(&join.room_id, peer).await;
                    membership = Some((joined, identity));
                    phase = ConnectionPhase::Active;
                }
                ClientMessage::Join(_) => {
                    send_channel_error(&out_tx, "validation_error", "already joined a room").await;
                }
                ClientMessage::Leave(leave) => {
                    match membership.take() {
                        Some((joined, identity)) if joined.room_id() == leave.room_id => {
                            joined.leave();
                            // Explicit leave prunes participation history;
                            // a plain disconnect never does.
                            if let Some(db) = dbsessions::get_db() {
                                if let Err(e) = db
                                    .remove_participant(&leave.room_id, &identity.user_id)
                                    .await
                                {
                                    warn!(
                                        "Participant prune failed for room '{}': {}",
                                        leave.room_id, e
                                    );
                                }
                            }
                            break;
                        }
                        other => {
                            membership = other;
                            send_channel_error(&out_tx, "validation_error", "not in that room")
                                .await;
                        }
                    }
                }
                ClientMessage::Heartbeat(hb) => match &membership {
                    Some((joined, identity)) if joined.room_id() == hb.room_id => {
                        if let Some(db) = dbsessions::get_db() {
                            if let Err(e) = db
                                .record_participant(&hb.room_id, &identity.user_id, &identity.name)
                                .await
                            {
                                warn!("Heartbeat persist failed for room '{}': {}", hb.room_id, e);
                            }
                        }
                    }
                    _ => {
                        send_channel_error(&out_tx, "validation_error", "not in that room").await;
                    }
                },
                ClientMessage::Chat(chat) => {
                    publish(&membership, &out_tx, &chat.room_id, RoomEvent::Chat(chat.message))
                        .await;
                }
                ClientMessage::CodeChange(change) => {
                    publish(
                        &membership,
                        &out_tx,
                        &change.room_id,
                        RoomEvent::Code {
                            file_id: change.file_id,
                            content: change.content,
                        },
                    )
                    .await;
                }
                ClientMessage::FileChange(change) => {
                    publish(
                        &membership,
                        &out_tx,
                        &change.room_id,
                        RoomEvent::File {
                            file_id: change.file_id,
                            content: change.content,
                        },
                    )
                    .await;
                }
                ClientMessage::WhiteboardChange(change) => {
                    publish(
                        &membership,
                        &out_tx,
                        &change.room_id,
                        RoomEvent::Whiteboard(change.elements),
                    )
                    .await;
                }
            }
        }

        // Disconnect: drop the live connection, keep participation history.
        if let Some((joined, _)) = membership {
            joined.leave();
        }
        phase = ConnectionPhase::Disconnected;
        info!("Connection {} now {:?}", conn_id, phase);
    });

    // Wait for either task to finish (and finish the other)
    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };
    info!("WebSocket connection terminated: {}", conn_id);
}

async fn publish(
    membership: &Option<(RoomMembership, Identity)>,
    out_tx: &mpsc::Sender<ServerMessage>,
    room_id: &str,
    event: RoomEvent,
) {
    match membership {
        Some((joined, _)) if joined.room_id() == room_id => joined.publish(event),
        _ => send_channel_error(out_tx, "validation_error", "not in that room").await,
    }
}

async fn send_channel_error(out_tx: &mpsc::Sender<ServerMessage>, kind: &str, error: &str) {
    let _ = out_tx
        .send(ServerMessage::Error(ChannelErrorMessage {
            kind: kind.to_string(),
            error: error.to_string(),
        }))
        .await;
}
