//! Chat over a processed document, independent of the socket carrying it.
//!
//! A transport calls [`connect`] once the user is authenticated, feeds every
//! incoming text frame to [`handle`] and calls [`disconnect`] when the socket
//! closes. Outgoing frames arrive on the channel passed to [`connect`].
use crate::analysis::{self, RuleSource};
use crate::conversation::{self, ConversationWithMessages};
use crate::embedding_index::DEFAULT_TOP_K;
use crate::error::{Classification, Error};
use crate::formatter::{messages_history, policies_text};
use crate::gateway::Providers;
use crate::message_author::MessageAuthor;
use crate::{documents, messages, users, Id};
use chat::connection::ConnectionId;
use chat::message::{ClientMessage, Event, Message, MessageScope};
use chat::Manager;
use entity_api::{conversation as conversation_api, document as document_api, message};
use log::*;
use review_ai::{FileHandle, Question};
use sea_orm::DatabaseConnection;
use tokio::sync::mpsc::UnboundedSender;

/// One open chat connection on a conversation.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub connection_id: ConnectionId,
    pub conversation_id: Id,
    pub user: users::Model,
    pub document: documents::Model,
    pub file: FileHandle,
}

/// Opens a chat on the user's conversation and sends its history.
///
/// The document must have been analyzed; if the analyzer has dropped it since,
/// it is uploaded again before the connection is registered.
pub async fn connect(
    db: &DatabaseConnection,
    providers: &Providers,
    manager: &Manager,
    user: &users::Model,
    conversation_id: Id,
    sender: UnboundedSender<String>,
) -> Result<ChatSession, Error> {
    let conversation = conversation_api::find_by_id(db, conversation_id).await?;
    if conversation.user_id != user.id {
        warn!("User {} tried to open conversation {conversation_id}", user.id);
        return Err(Error::forbidden("Access denied to conversation"));
    }

    let document = document_api::find_by_id(db, conversation.document_id).await?;
    if !document.is_processed || document.external_name.is_none() {
        return Err(Error::invalid("Document is not processed yet"));
    }
    let file = analysis::ensure_uploaded(
        db,
        providers.analyzer.as_ref(),
        providers.extractor.as_ref(),
        &document,
    )
    .await?;

    let messages = message::find_by_conversation(db, conversation.id).await?;
    let history = ConversationWithMessages {
        conversation,
        messages,
    };

    let connection_id = manager.register_connection(user.id, conversation_id, sender);
    let session = ChatSession {
        connection_id,
        conversation_id,
        user: user.clone(),
        document,
        file,
    };

    reply(
        manager,
        &session,
        Event::History {
            conversation_id,
            conversation: to_payload(&history),
        },
    );
    Ok(session)
}

pub fn disconnect(manager: &Manager, session: &ChatSession) {
    manager.unregister_connection(&session.connection_id);
}

/// Handles one frame from the client.
///
/// Malformed frames and empty messages are answered with an error event and
/// are not failures. A failed chat turn is reported to the client as well and
/// then returned, so the transport may close the connection.
pub async fn handle(
    db: &DatabaseConnection,
    providers: &Providers,
    manager: &Manager,
    session: &ChatSession,
    frame: &str,
) -> Result<(), Error> {
    let client_message: ClientMessage = match serde_json::from_str(frame) {
        Ok(client_message) => client_message,
        Err(err) => {
            debug!("Unreadable chat frame on {}: {err}", session.conversation_id);
            reply_error(manager, session, "Invalid message format", None);
            return Ok(());
        }
    };

    match client_message {
        ClientMessage::Ping => {
            reply(
                manager,
                session,
                Event::Pong {
                    conversation_id: session.conversation_id,
                },
            );
            Ok(())
        }
        ClientMessage::NewMessage { content } => {
            let Some(question) = content.filter(|c| !c.trim().is_empty()) else {
                reply_error(manager, session, "Message content is required", None);
                return Ok(());
            };
            if let Err(err) = answer(db, providers, manager, session, question).await {
                error!(
                    "Chat turn on conversation {} failed: {err}",
                    session.conversation_id
                );
                reply_error(manager, session, "An error occurred", Some(status_code(&err)));
                return Err(err);
            }
            Ok(())
        }
        ClientMessage::Unknown => {
            debug!("Ignoring chat frame of unknown type on {}", session.conversation_id);
            Ok(())
        }
    }
}

/// Stores the question, asks the analyzer with the most relevant policies and
/// the recent history, then stores the answer. Both are broadcast to the
/// conversation.
pub async fn answer(
    db: &DatabaseConnection,
    providers: &Providers,
    manager: &Manager,
    session: &ChatSession,
    question: String,
) -> Result<messages::Model, Error> {
    let asked = conversation::add_message(
        db,
        session.conversation_id,
        question.clone(),
        MessageAuthor::User,
    )
    .await?;
    broadcast(manager, session, &asked);
    typing(manager, session, true);

    let recent = conversation::recent_messages(db, session.conversation_id).await?;
    let policies = analysis::source_rules(
        db,
        providers,
        &session.user,
        &session.document,
        &RuleSource::Relevant {
            query: question.clone(),
            top_k: DEFAULT_TOP_K,
        },
    )
    .await;
    let policies = match policies {
        Ok(policies) => policies,
        Err(err) => {
            typing(manager, session, false);
            return Err(err);
        }
    };

    let answer = providers
        .analyzer
        .ask(Question {
            question,
            file: session.file.clone(),
            rules_text: policies_text(&policies),
            history: messages_history(&recent),
        })
        .await;
    typing(manager, session, false);
    let answer = answer.map_err(Error::analysis)?;

    let answered = conversation::add_message(
        db,
        session.conversation_id,
        answer,
        MessageAuthor::LegalCheck,
    )
    .await?;
    broadcast(manager, session, &answered);
    Ok(answered)
}

/// Close code a transport should use when [`connect`] fails.
pub fn close_code(err: &Error) -> u16 {
    match err.classification() {
        Classification::Forbidden => 4003,
        Classification::NotFound => 4004,
        Classification::BadRequest => 4005,
        Classification::ServerError => 1011,
    }
}

fn status_code(err: &Error) -> u16 {
    match err.classification() {
        Classification::NotFound => 404,
        Classification::Forbidden => 403,
        Classification::BadRequest => 400,
        Classification::ServerError => 500,
    }
}

fn to_payload<T: serde::Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or_else(|err| {
        error!("Failed to serialize chat payload: {err}");
        serde_json::Value::Null
    })
}

fn reply(manager: &Manager, session: &ChatSession, event: Event) {
    manager.send_message(Message {
        event,
        scope: MessageScope::Connection {
            connection_id: session.connection_id.clone(),
        },
    });
}

fn reply_error(manager: &Manager, session: &ChatSession, message: &str, status_code: Option<u16>) {
    reply(
        manager,
        session,
        Event::Error {
            conversation_id: session.conversation_id,
            message: message.to_string(),
            status_code,
        },
    );
}

fn broadcast(manager: &Manager, session: &ChatSession, message: &messages::Model) {
    manager.send_message(Message {
        event: Event::NewMessage {
            conversation_id: session.conversation_id,
            message: to_payload(message),
        },
        scope: MessageScope::Conversation,
    });
}

fn typing(manager: &Manager, session: &ChatSession, is_typing: bool) {
    manager.send_message(Message {
        event: Event::Typing {
            conversation_id: session.conversation_id,
            is_typing,
        },
        scope: MessageScope::Conversation,
    });
}
