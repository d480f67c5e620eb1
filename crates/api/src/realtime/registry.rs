//! Channel registry: the shared-mutable heart of event distribution
//!
//! Owns two independent mappings: room channels keyed by ticket ID and
//! identity channels keyed by user ID, each mapping to the sessions currently
//! joined. All mutation goes through join/leave/publish; the maps themselves
//! are never exposed.
//!
//! Channels are created lazily on first join and removed when the last member
//! leaves, so a key is never present with an empty collection. Publish
//! snapshots the membership under the read lock and sends after dropping it;
//! a concurrent leave can therefore never corrupt iteration, and a session
//! whose queue has closed is pruned so the next publish skips it.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::events::Event;
use super::session::Session;

type ChannelMap = RwLock<HashMap<Uuid, Vec<Arc<Session>>>>;

/// Registry of live sessions, addressable per ticket room and per user identity.
///
/// One instance per process, constructed at startup and shared through
/// application state. In-memory only; nothing survives a restart.
#[derive(Default)]
pub struct ChannelRegistry {
    rooms: ChannelMap,
    identities: ChannelMap,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session under a ticket's room channel.
    pub async fn join_room(&self, ticket_id: Uuid, session: Arc<Session>) {
        let size = join(&self.rooms, ticket_id, session).await;
        tracing::debug!(ticket_id = %ticket_id, room_size = size, "Session joined ticket room");
    }

    /// Remove a session from a ticket's room channel. No-op if either is
    /// unknown; returns whether the session was actually a member.
    pub async fn leave_room(&self, ticket_id: &Uuid, session_id: &Uuid) -> bool {
        let removed = leave(&self.rooms, ticket_id, session_id).await;
        if removed {
            tracing::debug!(ticket_id = %ticket_id, session_id = %session_id, "Session left ticket room");
        }
        removed
    }

    /// Register a session under a user's identity channel (one per open tab).
    pub async fn join_identity(&self, user_id: Uuid, session: Arc<Session>) {
        let size = join(&self.identities, user_id, session).await;
        tracing::debug!(user_id = %user_id, open_tabs = size, "Session joined identity channel");
    }

    /// Remove a session from a user's identity channel. No-op if either is
    /// unknown; returns whether the session was actually a member.
    pub async fn leave_identity(&self, user_id: &Uuid, session_id: &Uuid) -> bool {
        let removed = leave(&self.identities, user_id, session_id).await;
        if removed {
            tracing::debug!(user_id = %user_id, session_id = %session_id, "Session left identity channel");
        }
        removed
    }

    /// Deliver an event to every session in a ticket's room.
    ///
    /// Silent no-op when the ticket has no live viewers. Never fails the
    /// caller; sessions with closed queues are removed from the channel.
    /// Returns the number of sessions the event was handed to.
    pub async fn publish_room(&self, ticket_id: &Uuid, event: Event) -> usize {
        let delivered = publish(&self.rooms, ticket_id, event).await;
        tracing::debug!(ticket_id = %ticket_id, recipients = delivered, "Published event to ticket room");
        delivered
    }

    /// Deliver an event to every session in a user's identity channel.
    ///
    /// Silent no-op when the user is offline: the event is not queued for
    /// later, delivery is best-effort-live-only. Returns the number of
    /// sessions the event was handed to.
    pub async fn publish_identity(&self, user_id: &Uuid, event: Event) -> usize {
        let delivered = publish(&self.identities, user_id, event).await;
        if delivered == 0 {
            tracing::debug!(user_id = %user_id, "User offline, notification not delivered live");
        } else {
            tracing::debug!(user_id = %user_id, recipients = delivered, "Published event to identity channel");
        }
        delivered
    }

    /// Number of sessions currently in a ticket's room.
    pub async fn room_size(&self, ticket_id: &Uuid) -> usize {
        self.rooms.read().await.get(ticket_id).map_or(0, Vec::len)
    }

    /// Number of sessions (open tabs) for a user.
    pub async fn identity_size(&self, user_id: &Uuid) -> usize {
        self.identities
            .read()
            .await
            .get(user_id)
            .map_or(0, Vec::len)
    }

    /// Whether any channel currently tracks the given ticket.
    pub async fn has_room(&self, ticket_id: &Uuid) -> bool {
        self.rooms.read().await.contains_key(ticket_id)
    }

    /// Whether any identity channel currently tracks the given user.
    pub async fn has_identity(&self, user_id: &Uuid) -> bool {
        self.identities.read().await.contains_key(user_id)
    }

    /// Snapshot counts for health reporting.
    pub async fn stats(&self) -> RegistryStats {
        let rooms = self.rooms.read().await;
        let identities = self.identities.read().await;
        RegistryStats {
            active_rooms: rooms.len(),
            room_sessions: rooms.values().map(Vec::len).sum(),
            active_identities: identities.len(),
            identity_sessions: identities.values().map(Vec::len).sum(),
        }
    }
}

/// Counts of live channels and sessions.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RegistryStats {
    pub active_rooms: usize,
    pub room_sessions: usize,
    pub active_identities: usize,
    pub identity_sessions: usize,
}

/// Add a session under a key, creating the channel if absent.
/// Returns the channel size after the join.
async fn join(map: &ChannelMap, key: Uuid, session: Arc<Session>) -> usize {
    let mut channels = map.write().await;
    let members = channels.entry(key).or_default();
    members.push(session);
    members.len()
}

/// Remove a session from a channel, dropping the channel entry once empty.
/// Returns whether the session was actually a member (double-leave is a no-op).
async fn leave(map: &ChannelMap, key: &Uuid, session_id: &Uuid) -> bool {
    let mut channels = map.write().await;
    let Some(members) = channels.get_mut(key) else {
        return false;
    };
    let before = members.len();
    members.retain(|s| s.session_id != *session_id);
    let removed = members.len() < before;
    if members.is_empty() {
        channels.remove(key);
    }
    removed
}

/// Fan an event out to every session under a key.
///
/// The membership is snapshotted under the read lock and the lock released
/// before any send, so joins and leaves racing with delivery are safe. Dead
/// sessions are pruned afterwards under the write lock; publish itself never
/// reports an error.
async fn publish(map: &ChannelMap, key: &Uuid, event: Event) -> usize {
    let snapshot: Vec<Arc<Session>> = match map.read().await.get(key) {
        Some(members) => members.clone(),
        None => return 0, // nobody listening
    };

    let mut dead: Vec<Uuid> = Vec::new();
    for session in &snapshot {
        if session.send(event.clone()).is_err() {
            tracing::warn!(
                session_id = %session.session_id,
                "Dropping session with closed delivery queue"
            );
            dead.push(session.session_id);
        }
    }

    if !dead.is_empty() {
        let mut channels = map.write().await;
        if let Some(members) = channels.get_mut(key) {
            members.retain(|s| !dead.contains(&s.session_id));
            if members.is_empty() {
                channels.remove(key);
            }
        }
    }

    snapshot.len() - dead.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::events::Event;

    fn notification(content: &str) -> Event {
        Event::Notification {
            content: content.to_string(),
            link: "/dashboard".to_string(),
        }
    }

    #[tokio::test]
    async fn test_join_and_leave_room() {
        let registry = ChannelRegistry::new();
        let ticket_id = Uuid::new_v4();
        let (session, _rx) = Session::channel();
        let session = Arc::new(session);

        assert_eq!(registry.room_size(&ticket_id).await, 0);

        registry.join_room(ticket_id, Arc::clone(&session)).await;
        assert_eq!(registry.room_size(&ticket_id).await, 1);

        registry.leave_room(&ticket_id, &session.session_id).await;
        assert_eq!(registry.room_size(&ticket_id).await, 0);
    }

    #[tokio::test]
    async fn test_last_leave_removes_channel_key() {
        let registry = ChannelRegistry::new();
        let ticket_id = Uuid::new_v4();
        let (session, _rx) = Session::channel();
        let session = Arc::new(session);

        registry.join_room(ticket_id, Arc::clone(&session)).await;
        assert!(registry.has_room(&ticket_id).await);

        registry.leave_room(&ticket_id, &session.session_id).await;
        // Key must be gone entirely, not present with an empty member list
        assert!(!registry.has_room(&ticket_id).await);
    }

    #[tokio::test]
    async fn test_double_leave_is_noop() {
        let registry = ChannelRegistry::new();
        let ticket_id = Uuid::new_v4();
        let (session, _rx) = Session::channel();
        let session = Arc::new(session);

        registry.join_room(ticket_id, Arc::clone(&session)).await;
        registry.leave_room(&ticket_id, &session.session_id).await;
        registry.leave_room(&ticket_id, &session.session_id).await;
        // And leaving a channel that never existed
        registry.leave_room(&Uuid::new_v4(), &session.session_id).await;

        assert!(!registry.has_room(&ticket_id).await);
    }

    #[tokio::test]
    async fn test_publish_to_empty_channel_is_noop() {
        let registry = ChannelRegistry::new();
        registry
            .publish_room(&Uuid::new_v4(), notification("anyone there?"))
            .await;
        registry
            .publish_identity(&Uuid::new_v4(), notification("offline user"))
            .await;

        let stats = registry.stats().await;
        assert_eq!(stats.active_rooms, 0);
        assert_eq!(stats.active_identities, 0);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_room_members_in_order() {
        let registry = ChannelRegistry::new();
        let ticket_id = Uuid::new_v4();

        let (s1, mut rx1) = Session::channel();
        let (s2, mut rx2) = Session::channel();
        registry.join_room(ticket_id, Arc::new(s1)).await;
        registry.join_room(ticket_id, Arc::new(s2)).await;

        registry.publish_room(&ticket_id, notification("first")).await;
        registry.publish_room(&ticket_id, notification("second")).await;

        for rx in [&mut rx1, &mut rx2] {
            for expected in ["first", "second"] {
                match rx.try_recv() {
                    Ok(Event::Notification { content, .. }) => assert_eq!(content, expected),
                    other => panic!("expected notification, got {other:?}"),
                }
            }
            assert!(rx.try_recv().is_err(), "exactly one copy per publish");
        }
    }

    #[tokio::test]
    async fn test_failed_send_removes_session() {
        let registry = ChannelRegistry::new();
        let ticket_id = Uuid::new_v4();

        let (alive, mut alive_rx) = Session::channel();
        let (dead, dead_rx) = Session::channel();
        registry.join_room(ticket_id, Arc::new(alive)).await;
        registry.join_room(ticket_id, Arc::new(dead)).await;
        drop(dead_rx); // simulate a terminated delivery loop

        registry.publish_room(&ticket_id, notification("one")).await;
        assert_eq!(registry.room_size(&ticket_id).await, 1);

        // A subsequent publish no longer attempts delivery to the dead session
        registry.publish_room(&ticket_id, notification("two")).await;
        assert_eq!(registry.room_size(&ticket_id).await, 1);

        assert!(alive_rx.try_recv().is_ok());
        assert!(alive_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_pruning_last_dead_session_removes_key() {
        let registry = ChannelRegistry::new();
        let user_id = Uuid::new_v4();

        let (session, rx) = Session::channel();
        registry.join_identity(user_id, Arc::new(session)).await;
        drop(rx);

        registry.publish_identity(&user_id, notification("gone")).await;
        assert!(!registry.has_identity(&user_id).await);
    }

    #[tokio::test]
    async fn test_multi_tab_identity_delivery() {
        let registry = ChannelRegistry::new();
        let user_id = Uuid::new_v4();

        let (t1, mut rx1) = Session::channel();
        let (t2, mut rx2) = Session::channel();
        let (t3, mut rx3) = Session::channel();
        let t1 = Arc::new(t1);
        let closed_tab = t1.session_id;
        registry.join_identity(user_id, t1).await;
        registry.join_identity(user_id, Arc::new(t2)).await;
        registry.join_identity(user_id, Arc::new(t3)).await;

        registry.publish_identity(&user_id, notification("all tabs")).await;
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
        assert!(rx3.try_recv().is_ok());

        // Closing one tab leaves the other two receiving subsequent events
        registry.leave_identity(&user_id, &closed_tab).await;
        registry.publish_identity(&user_id, notification("two tabs")).await;
        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_ok());
        assert!(rx3.try_recv().is_ok());
        assert_eq!(registry.identity_size(&user_id).await, 2);
    }

    #[tokio::test]
    async fn test_independent_channels_do_not_cross() {
        let registry = ChannelRegistry::new();
        let ticket_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();

        let (room_session, mut room_rx) = Session::channel();
        let (identity_session, mut identity_rx) = Session::channel();
        registry.join_room(ticket_id, Arc::new(room_session)).await;
        registry
            .join_identity(user_id, Arc::new(identity_session))
            .await;

        registry.publish_room(&ticket_id, notification("room only")).await;
        assert!(room_rx.try_recv().is_ok());
        assert!(identity_rx.try_recv().is_err());

        registry
            .publish_identity(&user_id, notification("identity only"))
            .await;
        assert!(identity_rx.try_recv().is_ok());
        assert!(room_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stats() {
        let registry = ChannelRegistry::new();
        let (s1, _rx1) = Session::channel();
        let (s2, _rx2) = Session::channel();
        let (s3, _rx3) = Session::channel();

        let ticket = Uuid::new_v4();
        let user = Uuid::new_v4();
        registry.join_room(ticket, Arc::new(s1)).await;
        registry.join_room(ticket, Arc::new(s2)).await;
        registry.join_identity(user, Arc::new(s3)).await;

        let stats = registry.stats().await;
        assert_eq!(stats.active_rooms, 1);
        assert_eq!(stats.room_sessions, 2);
        assert_eq!(stats.active_identities, 1);
        assert_eq!(stats.identity_sessions, 1);
    }
}
