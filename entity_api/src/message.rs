use super::error::Error;
use crate::soft_delete::filtered_query;
use chrono::Utc;
use entity::message_author::MessageAuthor;
use entity::{messages::*, Id};
use sea_orm::{entity::prelude::*, ActiveValue::Set, DatabaseConnection, QueryOrder, QuerySelect};

use log::*;

pub async fn create(
    db: &DatabaseConnection,
    conversation_id: Id,
    content: String,
    author: MessageAuthor,
) -> Result<Model, Error> {
    debug!("New {author} message in conversation {conversation_id}");

    let message_active_model: ActiveModel = ActiveModel {
        conversation_id: Set(conversation_id),
        content: Set(content),
        author: Set(author),
        is_deleted: Set(false),
        created_at: Set(Utc::now().into()),
        ..Default::default()
    };

    Ok(message_active_model.insert(db).await?)
}

/// Live messages of a conversation in the order they were written.
pub async fn find_by_conversation(
    db: &DatabaseConnection,
    conversation_id: Id,
) -> Result<Vec<Model>, Error> {
    Ok(filtered_query::<Entity>(false)
        .filter(Column::ConversationId.eq(conversation_id))
        .order_by_asc(Column::Id)
        .all(db)
        .await?)
}

/// Up to `limit` messages preceding the newest one, newest first.
///
/// The newest message is skipped because it is the question currently being
/// answered.
pub async fn find_recent(
    db: &DatabaseConnection,
    conversation_id: Id,
    limit: u64,
) -> Result<Vec<Model>, Error> {
    Ok(filtered_query::<Entity>(false)
        .filter(Column::ConversationId.eq(conversation_id))
        .order_by_desc(Column::Id)
        .offset(1)
        .limit(limit)
        .all(db)
        .await?)
}
