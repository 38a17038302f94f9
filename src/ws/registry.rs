use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{
    ChatMessage, FileContentChangedMessage, MessageReceivedMessage, RosterEntry,
    RosterUpdatedMessage, ServerMessage, WhiteboardUpdatedMessage,
};
use crate::services::lifecycle::{spawn_store_writer, StoreWrite};
use crate::ws::presence::{distinct_roster, Identity};

/// Transport-level connection identifier. This, not the user id, is the
/// origin for echo suppression, so a user's second tab does receive their
/// own edits.
pub type ConnectionId = Uuid;

/// Outbound messages buffered per connection before a slow peer starts
/// dropping. A wedged connection degrades only itself, never the room.
pub const OUTBOUND_BUFFER: usize = 256;

/// One live connection as the room actor sees it.
#[derive(Clone)]
pub struct PeerHandle {
    pub conn_id: ConnectionId,
    pub identity: Identity,
    pub outbound: mpsc::Sender<ServerMessage>,
}

/// A mutation event published by one connection into its room.
#[derive(Debug, Clone)]
pub enum RoomEvent {
    Chat(String),
    Code {
        file_id: Option<String>,
        content: String,
    },
    File {
        file_id: String,
        content: String,
    },
    Whiteboard(Vec<serde_json::Value>),
}

enum RoomCommand {
    Join {
        peer: PeerHandle,
        reply: oneshot::Sender<Vec<RosterEntry>>,
    },
    Leave {
        conn_id: ConnectionId,
    },
    Publish {
        origin: ConnectionId,
        event: RoomEvent,
    },
}

#[derive(Clone)]
struct RoomHandle {
    tx: mpsc::UnboundedSender<RoomCommand>,
}

/// In-memory map of room id to its single-writer actor. Created at server
/// start, holds only transient connection state; the durable Session
/// outlives every room here.
#[derive(Clone)]
pub struct RoomRegistry {
    rooms: Arc<RwLock<HashMap<String, RoomHandle>>>,
    connections: Arc<AtomicUsize>,
}

/// A connection's ticket into one room. Leaves the room when dropped, so
/// an aborted connection task still releases its slot; an explicit
/// [`RoomMembership::leave`] earlier is idempotent with that.
pub struct RoomMembership {
    room_id: String,
    conn_id: ConnectionId,
    tx: mpsc::UnboundedSender<RoomCommand>,
    connections: Arc<AtomicUsize>,
    left: AtomicBool,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Register a connection under a room, creating the room if absent.
    /// Returns the membership ticket plus the post-join live roster; the
    /// same roster is broadcast to every member, joiner included.
    pub async fn join_room(
        &self,
        room_id: &str,
        peer: PeerHandle,
    ) -> (RoomMembership, Vec<RosterEntry>) {
        loop {
            let handle = self.get_or_spawn(room_id).await;
            let (reply_tx, reply_rx) = oneshot::channel();
            if handle
                .tx
                .send(RoomCommand::Join {
                    peer: peer.clone(),
                    reply: reply_tx,
                })
                .is_err()
            {
                // Raced a retiring actor; drop the stale entry and retry.
                self.remove_stale(room_id, &handle).await;
                continue;
            }
            match reply_rx.await {
                Ok(roster) => {
                    self.connections.fetch_add(1, Ordering::Relaxed);
                    return (
                        RoomMembership {
                            room_id: room_id.to_string(),
                            conn_id: peer.conn_id,
                            tx: handle.tx.clone(),
                            connections: self.connections.clone(),
                            left: AtomicBool::new(false),
                        },
                        roster,
                    );
                }
                Err(_) => continue,
            }
        }
    }

    /// Number of rooms with at least one live connection.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    async fn get_or_spawn(&self, room_id: &str) -> RoomHandle {
        {
            let rooms = self.rooms.read().await;
            if let Some(handle) = rooms.get(room_id) {
                return handle.clone();
            }
        }
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(room_id.to_string())
            .or_insert_with(|| spawn_room(self.clone(), room_id.to_string()))
            .clone()
    }

    async fn remove_stale(&self, room_id: &str, handle: &RoomHandle) {
        let mut rooms = self.rooms.write().await;
        if let Some(current) = rooms.get(room_id) {
            if current.tx.same_channel(&handle.tx) {
                rooms.remove(room_id);
            }
        }
    }

    /// Called by a room actor that has gone empty. Only removes the entry
    /// if it still points at the caller, so a respawned room survives.
    async fn retire(&self, room_id: &str, tx: &mpsc::UnboundedSender<RoomCommand>) {
        let mut rooms = self.rooms.write().await;
        if let Some(current) = rooms.get(room_id) {
            if current.tx.same_channel(tx) {
                rooms.remove(room_id);
                debug!("Room '{}' retired (empty)", room_id);
            }
        }
    }
}

impl RoomMembership {
    pub fn conn_id(&self) -> ConnectionId {
        self.conn_id
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Publish an event into the room: fanout to every other connection,
    /// persistence queued behind the fanout.
    pub fn publish(&self, event: RoomEvent) {
        let _ = self.tx.send(RoomCommand::Publish {
            origin: self.conn_id,
            event,
        });
    }

    /// Remove this connection from the live roster. Idempotent; closing
    /// an already-closed connection is a no-op.
    pub fn leave(&self) {
        if self.left.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.tx.send(RoomCommand::Leave {
            conn_id: self.conn_id,
        });
        self.connections.fetch_sub(1, Ordering::Relaxed);
    }
}

impl Drop for RoomMembership {
    fn drop(&mut self) {
        self.leave();
    }
}

fn spawn_room(registry: RoomRegistry, room_id: String) -> RoomHandle {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = RoomHandle { tx: tx.clone() };
    let store_tx = spawn_store_writer(room_id.clone());

    tokio::spawn(async move {
        let mut peers: HashMap<ConnectionId, PeerHandle> = HashMap::new();

        while let Some(cmd) = rx.recv().await {
            match cmd {
                RoomCommand::Join { peer, reply } => {
                    peers.insert(peer.conn_id, peer);
                    let roster = distinct_roster(peers.values().map(|p| &p.identity));
                    broadcast_roster(&mut peers, &roster);
                    let _ = reply.send(roster);
                }
                RoomCommand::Leave { conn_id } => {
                    if peers.remove(&conn_id).is_some() {
                        if peers.is_empty() {
                            registry.retire(&room_id, &tx).await;
                            break;
                        }
                        let roster = distinct_roster(peers.values().map(|p| &p.identity));
                        broadcast_roster(&mut peers, &roster);
                    }
                }
                RoomCommand::Publish { origin, event } => {
                    let Some(origin_peer) = peers.get(&origin) else {
                        // Connection already gone; nothing to echo-protect.
                        continue;
                    };
                    let (msg, write) = route_event(&origin_peer.identity, event);

                    let mut closed = Vec::new();
                    for peer in peers.values() {
                        if peer.conn_id == origin {
                            continue;
                        }
                        deliver(peer, msg.clone(), &mut closed);
                    }
                    let _ = store_tx.send(write);

                    if prune(&mut peers, closed) {
                        if peers.is_empty() {
                            registry.retire(&room_id, &tx).await;
                            break;
                        }
                        let roster = distinct_roster(peers.values().map(|p| &p.identity));
                        broadcast_roster(&mut peers, &roster);
                    }
                }
            }
        }
    });

    handle
}

/// Build the fanout message and the matching persistence write for one
/// published event. Chat entries are server-stamped here.
fn route_event(origin: &Identity, event: RoomEvent) -> (ServerMessage, StoreWrite) {
    match event {
        RoomEvent::Chat(text) => {
            let message = ChatMessage {
                user_id: origin.user_id.clone(),
                user_name: origin.name.clone(),
                message: text,
                timestamp: chrono::Utc::now(),
            };
            (
                ServerMessage::MessageReceived(MessageReceivedMessage {
                    message: message.clone(),
                }),
                StoreWrite::AppendChat(message),
            )
        }
        RoomEvent::Code { file_id, content } => (
            ServerMessage::FileContentChanged(FileContentChangedMessage {
                file_id: file_id.clone(),
                content: content.clone(),
                origin_user_id: origin.user_id.clone(),
            }),
            match file_id {
                Some(file_id) => StoreWrite::SetFileContent { file_id, content },
                None => StoreWrite::SetCode(content),
            },
        ),
        RoomEvent::File { file_id, content } => (
            ServerMessage::FileContentChanged(FileContentChangedMessage {
                file_id: Some(file_id.clone()),
                content: content.clone(),
                origin_user_id: origin.user_id.clone(),
            }),
            StoreWrite::SetFileContent { file_id, content },
        ),
        RoomEvent::Whiteboard(elements) => (
            ServerMessage::WhiteboardUpdated(WhiteboardUpdatedMessage {
                elements: elements.clone(),
                origin_user_id: origin.user_id.clone(),
            }),
            StoreWrite::SetWhiteboard(elements),
        ),
    }
}

fn broadcast_roster(peers: &mut HashMap<ConnectionId, PeerHandle>, roster: &[RosterEntry]) {
    let msg = ServerMessage::RosterUpdated(RosterUpdatedMessage {
        participants: roster.to_vec(),
    });
    let mut closed = Vec::new();
    for peer in peers.values() {
        deliver(peer, msg.clone(), &mut closed);
    }
    // Peers that vanished mid-roster-broadcast are dropped silently; the
    // next membership change recomputes the roster anyway.
    prune(peers, closed);
}

fn deliver(peer: &PeerHandle, msg: ServerMessage, closed: &mut Vec<ConnectionId>) {
    match peer.outbound.try_send(msg) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!(
                "Dropping event for slow connection {} (user {})",
                peer.conn_id, peer.identity.user_id
            );
        }
        Err(mpsc::error::TrySendError::Closed(_)) => closed.push(peer.conn_id),
    }
}

fn prune(peers: &mut HashMap<ConnectionId, PeerHandle>, closed: Vec<ConnectionId>) -> bool {
    let mut removed = false;
    for conn_id in closed {
        removed |= peers.remove(&conn_id).is_some();
    }
    removed
}
