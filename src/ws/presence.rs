use chrono::{DateTime, Utc};

use crate::models::{Participant, RosterEntry};

/// Lifecycle of one participant-connection. Terminal per connection;
/// a reconnect is a new connection starting over at `Connecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Connecting,
    Active,
    Disconnected,
}

/// Identity attached to a connection once it goes active.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub name: String,
}

/// Merge one identity into a durable participant list: refresh
/// `last_seen` and `name` when the user is already recorded, append a new
/// entry otherwise. Returns true when an entry was appended.
pub fn reconcile_participant(
    participants: &mut Vec<Participant>,
    user_id: &str,
    name: &str,
    now: DateTime<Utc>,
) -> bool {
    match participants.iter_mut().find(|p| p.user_id == user_id) {
        Some(existing) => {
            existing.last_seen = now;
            existing.name = name.to_string();
            false
        }
        None => {
            participants.push(Participant {
                user_id: user_id.to_string(),
                name: name.to_string(),
                joined_at: now,
                last_seen: now,
            });
            true
        }
    }
}

/// Project live connections onto a roster of distinct identities, in
/// first-connection order. Two tabs of the same user are one entry.
pub fn distinct_roster<'a, I>(identities: I) -> Vec<RosterEntry>
where
    I: IntoIterator<Item = &'a Identity>,
{
    let mut roster: Vec<RosterEntry> = Vec::new();
    for identity in identities {
        if !roster.iter().any(|r| r.user_id == identity.user_id) {
            roster.push(RosterEntry {
                user_id: identity.user_id.clone(),
                name: identity.name.clone(),
            });
        }
    }
    roster
}
