use crate::connection::ConnectionId;
use chrono::{DateTime, Utc};
use entity::Id;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Events pushed to chat clients.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Connect { conversation_id: Id },
    /// The conversation with all its messages, sent right after connecting.
    History { conversation_id: Id, conversation: Value },
    NewMessage { conversation_id: Id, message: Value },
    MessageReceived { conversation_id: Id, message_id: Id },
    Typing { conversation_id: Id, is_typing: bool },
    Error {
        conversation_id: Id,
        message: String,
        status_code: Option<u16>,
    },
    Pong { conversation_id: Id },
}

impl Event {
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::Connect { .. } => "connect",
            Event::History { .. } => "history",
            Event::NewMessage { .. } => "new_message",
            Event::MessageReceived { .. } => "message_received",
            Event::Typing { .. } => "typing",
            Event::Error { .. } => "error",
            Event::Pong { .. } => "pong",
        }
    }

    pub fn conversation_id(&self) -> Id {
        match self {
            Event::Connect { conversation_id }
            | Event::History { conversation_id, .. }
            | Event::NewMessage { conversation_id, .. }
            | Event::MessageReceived { conversation_id, .. }
            | Event::Typing { conversation_id, .. }
            | Event::Error { conversation_id, .. }
            | Event::Pong { conversation_id } => *conversation_id,
        }
    }

    fn payload(&self) -> Option<Value> {
        match self {
            Event::Connect { .. } | Event::Pong { .. } => None,
            Event::History { conversation, .. } => Some(conversation.clone()),
            Event::NewMessage { message, .. } => Some(message.clone()),
            Event::MessageReceived { message_id, .. } => Some(json!({ "message_id": message_id })),
            Event::Typing { is_typing, .. } => Some(json!({ "is_typing": is_typing })),
            Event::Error {
                message,
                status_code: Some(code),
                ..
            } => Some(json!({ "message": message, "status_code": code })),
            Event::Error { message, .. } => Some(json!({ "message": message })),
        }
    }

    /// Wrap the event in its wire envelope, stamped with `timestamp`.
    pub fn into_frame(self, timestamp: DateTime<Utc>) -> Frame {
        Frame {
            event_type: self.event_type(),
            conversation_id: self.conversation_id(),
            timestamp,
            payload: self.payload(),
        }
    }
}

/// Wire envelope shared by every outgoing event.
#[derive(Debug, Clone, Serialize)]
pub struct Frame {
    #[serde(rename = "type")]
    pub event_type: &'static str,
    pub conversation_id: Id,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

/// Messages a chat client may send. Unknown types are accepted and ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    NewMessage {
        #[serde(default)]
        content: Option<String>,
    },
    Ping,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub event: Event,
    pub scope: MessageScope,
}

#[derive(Debug, Clone)]
pub enum MessageScope {
    /// Send to one connection only, such as a reply to a ping
    Connection { connection_id: ConnectionId },
    /// Send to all connections for a specific user
    User { user_id: Id },
    /// Send to every connection open on the event's conversation
    Conversation,
}
