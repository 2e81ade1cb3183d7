use dashmap::DashMap;
use entity::Id;
use log::*;
use std::collections::HashSet;
use tokio::sync::mpsc::UnboundedSender;

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

/// A live connection: whose it is, which conversation it is open on, and
/// where to push serialized frames.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub user_id: Id,
    pub conversation_id: Id,
    pub sender: UnboundedSender<String>,
}

/// Connection registry indexed by connection, by user and by conversation.
pub struct ConnectionRegistry {
    /// Primary storage: lookup by connection_id for registration/cleanup
    connections: DashMap<ConnectionId, ConnectionInfo>,

    /// Connections belonging to each user
    user_index: DashMap<Id, HashSet<ConnectionId>>,

    /// Connections open on each conversation
    conversation_index: DashMap<Id, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            user_index: DashMap::new(),
            conversation_index: DashMap::new(),
        }
    }

    /// Register a connection of `user_id` open on `conversation_id`.
    pub fn register(
        &self,
        user_id: Id,
        conversation_id: Id,
        sender: UnboundedSender<String>,
    ) -> ConnectionId {
        let connection_id = ConnectionId::new();

        self.connections.insert(
            connection_id.clone(),
            ConnectionInfo {
                user_id,
                conversation_id,
                sender,
            },
        );

        self.user_index
            .entry(user_id)
            .or_default()
            .insert(connection_id.clone());

        self.conversation_index
            .entry(conversation_id)
            .or_default()
            .insert(connection_id.clone());

        connection_id
    }

    /// Remove a connection. The user stays subscribed to the conversation
    /// while any of their other connections is still open on it.
    pub fn unregister(&self, connection_id: &ConnectionId) -> Option<ConnectionInfo> {
        let (_, info) = self.connections.remove(connection_id)?;

        if let Some(mut entry) = self.user_index.get_mut(&info.user_id) {
            entry.remove(connection_id);

            // Clean up empty user entries
            if entry.is_empty() {
                drop(entry); // Release lock before removal
                self.user_index.remove(&info.user_id);
            }
        }

        if let Some(mut open) = self.conversation_index.get_mut(&info.conversation_id) {
            open.remove(connection_id);

            if open.is_empty() {
                drop(open);
                self.conversation_index.remove(&info.conversation_id);
            }
        }

        Some(info)
    }

    /// Send a frame to a single connection, unregistering it if its receiving
    /// end is gone. Returns whether the frame was delivered.
    pub fn send_to_connection(&self, connection_id: &ConnectionId, frame: &str) -> bool {
        let sent = match self.connections.get(connection_id) {
            Some(info) => info.sender.send(frame.to_owned()),
            None => return false,
        };
        match sent {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Failed to send chat frame to connection {}: {e}. Removing connection.",
                    connection_id.as_str()
                );
                self.unregister(connection_id);
                false
            }
        }
    }

    /// Send a frame to every connection of `user_id`, whichever conversation
    /// it is open on. Returns the number delivered.
    pub fn send_to_user(&self, user_id: Id, frame: &str) -> usize {
        // Collect first so no index lock is held while unregistering.
        let connection_ids: Vec<ConnectionId> = match self.user_index.get(&user_id) {
            Some(ids) => ids.iter().cloned().collect(),
            None => return 0,
        };
        self.send_to_all(connection_ids, frame)
    }

    /// Send a frame to the connections open on the conversation. Other
    /// connections of the same users are not reached.
    pub fn send_to_conversation(&self, conversation_id: Id, frame: &str) -> usize {
        let connection_ids: Vec<ConnectionId> = match self.conversation_index.get(&conversation_id) {
            Some(ids) => ids.iter().cloned().collect(),
            None => return 0,
        };
        self.send_to_all(connection_ids, frame)
    }

    pub fn is_subscribed(&self, user_id: Id, conversation_id: Id) -> bool {
        self.conversation_index.get(&conversation_id).is_some_and(|ids| {
            ids.iter().any(|id| {
                self.connections
                    .get(id)
                    .is_some_and(|info| info.user_id == user_id)
            })
        })
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Connections whose receiving end is gone are unregistered.
    fn send_to_all(&self, connection_ids: Vec<ConnectionId>, frame: &str) -> usize {
        let mut delivered = 0;
        let mut dead = Vec::new();
        for conn_id in connection_ids {
            let Some(info) = self.connections.get(&conn_id) else {
                continue;
            };
            match info.sender.send(frame.to_owned()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        "Failed to send chat frame to connection {} of user {}: {e}. Removing connection.",
                        conn_id.as_str(),
                        info.user_id
                    );
                    dead.push(conn_id.clone());
                }
            }
        }

        for conn_id in dead {
            self.unregister(&conn_id);
        }

        delivered
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    #[test]
    fn register_subscribes_and_routes_to_user() {
        let registry = ConnectionRegistry::new();
        let (tx, mut rx) = unbounded_channel();

        registry.register(1, 10, tx);

        assert!(registry.is_subscribed(1, 10));
        assert_eq!(registry.send_to_user(1, "hello"), 1);
        assert_eq!(rx.try_recv().unwrap(), "hello");
        assert_eq!(registry.send_to_user(2, "nobody"), 0);
    }

    #[test]
    fn user_stays_subscribed_while_another_connection_is_open() {
        let registry = ConnectionRegistry::new();
        let (tx1, _rx1) = unbounded_channel();
        let (tx2, _rx2) = unbounded_channel();
        let first = registry.register(1, 10, tx1);
        let second = registry.register(1, 10, tx2);

        registry.unregister(&first);
        assert!(registry.is_subscribed(1, 10));

        registry.unregister(&second);
        assert!(!registry.is_subscribed(1, 10));
        assert_eq!(registry.connection_count(), 0);
    }

    #[test]
    fn conversation_broadcast_reaches_every_subscriber() {
        let registry = ConnectionRegistry::new();
        let (tx1, mut rx1) = unbounded_channel();
        let (tx2, mut rx2) = unbounded_channel();
        let (tx3, mut rx3) = unbounded_channel();
        registry.register(1, 10, tx1);
        registry.register(2, 10, tx2);
        registry.register(3, 11, tx3);

        assert_eq!(registry.send_to_conversation(10, "frame"), 2);
        assert_eq!(rx1.try_recv().unwrap(), "frame");
        assert_eq!(rx2.try_recv().unwrap(), "frame");
        assert!(rx3.try_recv().is_err());
    }

    #[test]
    fn conversation_broadcast_skips_the_users_other_conversations() {
        let registry = ConnectionRegistry::new();
        let (tx_a, mut rx_a) = unbounded_channel();
        let (tx_b, mut rx_b) = unbounded_channel();
        registry.register(1, 100, tx_a);
        let other_tab = registry.register(1, 200, tx_b);

        assert_eq!(registry.send_to_conversation(100, "frame for 100"), 1);
        assert_eq!(rx_a.try_recv().unwrap(), "frame for 100");
        assert!(rx_b.try_recv().is_err());

        assert_eq!(registry.send_to_user(1, "to every tab"), 2);
        registry.unregister(&other_tab);
        assert!(registry.is_subscribed(1, 100));
        assert!(!registry.is_subscribed(1, 200));
    }

    #[test]
    fn connection_sends_reach_only_that_connection() {
        let registry = ConnectionRegistry::new();
        let (tx1, mut rx1) = unbounded_channel();
        let (tx2, mut rx2) = unbounded_channel();
        let first = registry.register(1, 10, tx1);
        registry.register(1, 11, tx2);

        assert!(registry.send_to_connection(&first, "pong"));
        assert_eq!(rx1.try_recv().unwrap(), "pong");
        assert!(rx2.try_recv().is_err());

        registry.unregister(&first);
        assert!(!registry.send_to_connection(&first, "late"));
    }

    #[test]
    fn closed_connections_are_pruned_on_send() {
        let registry = ConnectionRegistry::new();
        let (tx, rx) = unbounded_channel();
        registry.register(1, 10, tx);
        drop(rx);

        assert_eq!(registry.send_to_user(1, "lost"), 0);
        assert_eq!(registry.connection_count(), 0);
        assert!(!registry.is_subscribed(1, 10));
    }

    #[test]
    fn concurrent_registration_keeps_indices_consistent() {
        let registry = std::sync::Arc::new(ConnectionRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|user_id| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    let (tx, _rx) = unbounded_channel();
                    let id = registry.register(user_id, 10, tx);
                    registry.unregister(&id);
                    let (tx, rx) = unbounded_channel();
                    registry.register(user_id, 10, tx);
                    rx
                })
            })
            .collect();
        let _receivers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(registry.connection_count(), 8);
        assert_eq!(registry.send_to_conversation(10, "all"), 8);
    }
}
