use crate::message::Event;
use dashmap::DashMap;
use log::*;
use std::sync::Arc;
use tokio::sync::mpsc::Sender;

// Type alias for user IDs (web layer converts entity::Id to String)
pub type UserId = String;

/// Outbound half of a subscriber's bounded channel. Events are shared, not copied,
/// across recipients.
pub type EventSender = Sender<Arc<Event>>;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub connection_id: ConnectionId,
    pub sender: EventSender,
}

/// Live subscriptions, at most one per user.
///
/// Registering a second connection for a user replaces the first (last writer wins).
/// The replaced sender is dropped, which ends the older stream on its next receive.
/// Removal is guarded by `ConnectionId`, so a stream tearing down late can never
/// evict the connection that superseded it.
pub struct ConnectionRegistry {
    connections: DashMap<UserId, ConnectionInfo>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Register `sender` as the user's only connection and return its identity.
    pub fn register(&self, user_id: UserId, sender: EventSender) -> ConnectionId {
        let connection_id = ConnectionId::new();

        let previous = self.connections.insert(
            user_id.clone(),
            ConnectionInfo {
                connection_id: connection_id.clone(),
                sender,
            },
        );

        if let Some(previous) = previous {
            debug!(
                "Connection {} for user {} superseded by {}",
                previous.connection_id.as_str(),
                user_id,
                connection_id.as_str()
            );
        }

        connection_id
    }

    /// Remove the user's connection only if it is still `connection_id`.
    /// Returns whether anything was removed, so calling it twice is harmless.
    pub fn unregister(&self, user_id: &UserId, connection_id: &ConnectionId) -> bool {
        self.connections
            .remove_if(user_id, |_, info| &info.connection_id == connection_id)
            .is_some()
    }

    /// Snapshot of the user's current connection. The map shard lock is released
    /// before the caller sends on it.
    pub fn lookup(&self, user_id: &UserId) -> Option<ConnectionInfo> {
        self.connections.get(user_id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, user_id: &UserId) -> bool {
        self.connections.contains_key(user_id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Drop every connection, returning how many were open. Each stream observes its
    /// channel closing and ends.
    pub fn close_all(&self) -> usize {
        let count = self.connections.len();
        self.connections.clear();
        count
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
