use crate::document;
use crate::error::Error;
use crate::message_author::MessageAuthor;
use crate::{conversations, lifecycle, messages, users, Id, IntoUpdateMap, UpdateMap};
use entity::ownership::EntityKind;
use entity_api::{conversation, message, mutate};
use log::*;
use sea_orm::{DatabaseConnection, IntoActiveModel, Value};
use serde::{Deserialize, Serialize};

/// Earlier messages handed to the analyzer with each question.
pub const HISTORY_WINDOW: u64 = 10;

/// A conversation with its messages in the order they were written.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConversationWithMessages {
    #[serde(flatten)]
    pub conversation: conversations::Model,
    pub messages: Vec<messages::Model>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ConversationChanges {
    pub title: Option<String>,
    /// Superusers only
    pub document_id: Option<Id>,
    /// Superusers only
    pub user_id: Option<Id>,
}

impl IntoUpdateMap for ConversationChanges {
    fn into_update_map(self) -> UpdateMap {
        let mut update_map = UpdateMap::new();
        update_map.insert("title".to_string(), self.title.map(Value::from));
        update_map.insert("document_id".to_string(), self.document_id.map(Value::from));
        update_map.insert("user_id".to_string(), self.user_id.map(Value::from));
        update_map
    }
}

/// The actor's conversation about the document. A conversation the actor
/// deleted earlier is brought back without its messages; if there never was
/// one, it is created.
pub async fn get_or_create(
    db: &DatabaseConnection,
    actor: &users::Model,
    document_id: Id,
) -> Result<conversations::Model, Error> {
    let document = document::find(db, actor, document_id).await?;

    match conversation::find_latest_for_document_and_user(db, document.id, actor.id).await? {
        Some(existing) if !existing.is_deleted => Ok(existing),
        Some(deleted) => {
            lifecycle::restore(db, EntityKind::Conversation, deleted.id, true, false).await?;
            info!(
                "Restored conversation {} of user {} on document {}",
                deleted.id, actor.id, document.id
            );
            Ok(conversation::find_by_id(db, deleted.id).await?)
        }
        None => {
            let created = conversation::create(db, document.id, actor.id, None).await?;
            info!(
                "Started conversation {} for user {} on document {}",
                created.id, actor.id, document.id
            );
            Ok(created)
        }
    }
}

/// A conversation of the actor's, or any conversation for a superuser.
pub async fn find(
    db: &DatabaseConnection,
    actor: &users::Model,
    id: Id,
) -> Result<conversations::Model, Error> {
    let found = conversation::find_by_id(db, id).await?;
    if !actor.is_superuser && found.user_id != actor.id {
        return Err(Error::not_found());
    }
    Ok(found)
}

pub async fn find_with_messages(
    db: &DatabaseConnection,
    actor: &users::Model,
    id: Id,
) -> Result<ConversationWithMessages, Error> {
    let conversation = find(db, actor, id).await?;
    let messages = message::find_by_conversation(db, conversation.id).await?;
    Ok(ConversationWithMessages {
        conversation,
        messages,
    })
}

pub async fn update(
    db: &DatabaseConnection,
    actor: &users::Model,
    id: Id,
    changes: ConversationChanges,
) -> Result<conversations::Model, Error> {
    let existing = find(db, actor, id).await?;
    debug!("Updating conversation {id} with {changes:?}");

    let mut update_map = changes.into_update_map();
    if !actor.is_superuser {
        update_map.remove("document_id");
        update_map.remove("user_id");
    }

    Ok(mutate::update::<conversations::ActiveModel, conversations::Column>(
        db,
        existing.into_active_model(),
        update_map,
    )
    .await?)
}

/// Soft-deletes the conversation and its messages.
pub async fn delete(db: &DatabaseConnection, actor: &users::Model, id: Id) -> Result<u64, Error> {
    let existing = find(db, actor, id).await?;
    lifecycle::soft_delete(db, EntityKind::Conversation, existing.id, true).await
}

pub async fn add_message(
    db: &DatabaseConnection,
    conversation_id: Id,
    content: String,
    author: MessageAuthor,
) -> Result<messages::Model, Error> {
    Ok(message::create(db, conversation_id, content, author).await?)
}

/// Up to [`HISTORY_WINDOW`] messages before the newest one, newest first.
pub async fn recent_messages(
    db: &DatabaseConnection,
    conversation_id: Id,
) -> Result<Vec<messages::Model>, Error> {
    Ok(message::find_recent(db, conversation_id, HISTORY_WINDOW).await?)
}
