use crate::domain::event::Notification;
use crate::domain::party::PartyId;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

/// Identifies one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Sending half of a live connection.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    sender: UnboundedSender<Notification>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }
}

pub type SessionReceiver = UnboundedReceiver<Notification>;

#[derive(Default)]
struct Rooms {
    sessions: HashMap<SessionId, (PartyId, SessionHandle)>,
    members: HashMap<PartyId, HashSet<SessionId>>,
}

impl Rooms {
    fn remove(&mut self, session: SessionId) -> Option<PartyId> {
        let (party, _) = self.sessions.remove(&session)?;
        if let Some(room) = self.members.get_mut(&party) {
            room.remove(&session);
            if room.is_empty() {
                self.members.remove(&party);
            }
        }
        Some(party)
    }
}

/// Live mapping of party identity to connected sessions.
///
/// Pure routing: a party may have any number of sessions (several open
/// tabs), each session belongs to at most one party. Never used for
/// authorization.
#[derive(Default)]
pub struct ChannelRegistry {
    rooms: RwLock<Rooms>,
    next_id: AtomicU64,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new, not yet registered, session.
    pub fn connect(&self) -> (SessionHandle, SessionReceiver) {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::unbounded_channel();
        (SessionHandle { id, sender }, receiver)
    }

    /// Joins `handle` to the delivery group of `party`, leaving any group it
    /// was in before.
    pub async fn register(&self, party: PartyId, handle: SessionHandle) {
        let mut rooms = self.rooms.write().await;
        let session = handle.id;
        rooms.remove(session);
        rooms
            .members
            .entry(party.clone())
            .or_default()
            .insert(session);
        debug!(party = %party, session = %session, "session registered");
        rooms.sessions.insert(session, (party, handle));
    }

    /// Drops the session; returns the party it was registered under.
    pub async fn unregister(&self, session: SessionId) -> Option<PartyId> {
        let party = self.rooms.write().await.remove(session);
        if let Some(party) = &party {
            debug!(party = %party, session = %session, "session unregistered");
        }
        party
    }

    pub async fn lookup(&self, party: &PartyId) -> HashSet<SessionId> {
        self.rooms
            .read()
            .await
            .members
            .get(party)
            .cloned()
            .unwrap_or_default()
    }

    /// Sends `notification` to every session of `party`.
    ///
    /// Sessions whose receiver is gone are pruned. Returns the number of
    /// sessions that accepted the notification.
    pub async fn push(&self, party: &PartyId, notification: &Notification) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();
        {
            let rooms = self.rooms.read().await;
            let Some(members) = rooms.members.get(party) else {
                return 0;
            };
            for session in members {
                let Some((_, handle)) = rooms.sessions.get(session) else {
                    continue;
                };
                if handle.sender.send(notification.clone()).is_ok() {
                    delivered += 1;
                } else {
                    closed.push(*session);
                }
            }
        }

        if !closed.is_empty() {
            let mut rooms = self.rooms.write().await;
            for session in closed {
                rooms.remove(session);
                debug!(party = %party, session = %session, "pruned closed session");
            }
        }
        delivered
    }

    pub async fn session_count(&self) -> usize {
        self.rooms.read().await.sessions.len()
    }
}
