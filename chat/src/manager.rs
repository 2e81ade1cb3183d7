use crate::connection::{ConnectionId, ConnectionRegistry};
use crate::message::{Message as ChatMessage, MessageScope};
use chrono::Utc;
use entity::Id;
use log::*;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

pub struct Manager {
    registry: Arc<ConnectionRegistry>,
}

impl Manager {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
        }
    }

    /// Register a new connection and return its unique ID
    pub fn register_connection(
        &self,
        user_id: Id,
        conversation_id: Id,
        sender: UnboundedSender<String>,
    ) -> ConnectionId {
        let connection_id = self.registry.register(user_id, conversation_id, sender);
        info!("Registered chat connection for user {user_id} on conversation {conversation_id}");
        connection_id
    }

    /// Unregister a connection by ID
    pub fn unregister_connection(&self, connection_id: &ConnectionId) {
        if let Some(info) = self.registry.unregister(connection_id) {
            info!(
                "Unregistered chat connection for user {} on conversation {}",
                info.user_id, info.conversation_id
            );
        }
    }

    /// Send a message based on its scope. Returns the number of connections
    /// that received it.
    pub fn send_message(&self, message: ChatMessage) -> usize {
        let event_type = message.event.event_type();
        let conversation_id = message.event.conversation_id();

        let frame = match serde_json::to_string(&message.event.into_frame(Utc::now())) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize chat event: {e}");
                return 0;
            }
        };

        let delivered = match message.scope {
            MessageScope::Connection { connection_id } => {
                usize::from(self.registry.send_to_connection(&connection_id, &frame))
            }
            MessageScope::User { user_id } => self.registry.send_to_user(user_id, &frame),
            MessageScope::Conversation => {
                self.registry.send_to_conversation(conversation_id, &frame)
            }
        };

        debug!("Delivered {event_type} event to {delivered} connection(s)");
        delivered
    }

    pub fn connection_count(&self) -> usize {
        self.registry.connection_count()
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}
