use super::error::Error;
use crate::soft_delete::{filtered_query, find_live_by_id};
use chrono::Utc;
use entity::{conversations::*, Id};
use sea_orm::{
    entity::prelude::*, ActiveValue::Set, DatabaseConnection, QueryOrder,
};

use log::*;

pub async fn create(
    db: &DatabaseConnection,
    document_id: Id,
    user_id: Id,
    title: Option<String>,
) -> Result<Model, Error> {
    debug!("New Conversation for document {document_id} and user {user_id}");

    let now = Utc::now();

    let conversation_active_model: ActiveModel = ActiveModel {
        document_id: Set(document_id),
        user_id: Set(user_id),
        title: Set(title),
        is_deleted: Set(false),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    };

    Ok(conversation_active_model.insert(db).await?)
}

pub async fn find_by_id(db: &DatabaseConnection, id: Id) -> Result<Model, Error> {
    find_live_by_id::<Entity, _>(db, id).await
}

/// The most recent conversation between a user and a document, deleted or not.
pub async fn find_latest_for_document_and_user(
    db: &DatabaseConnection,
    document_id: Id,
    user_id: Id,
) -> Result<Option<Model>, Error> {
    Ok(filtered_query::<Entity>(true)
        .filter(Column::DocumentId.eq(document_id))
        .filter(Column::UserId.eq(user_id))
        .order_by_desc(Column::Id)
        .one(db)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soft_delete::soft_delete;
    use crate::test_db::{self, fixtures};
    use entity::ownership::EntityKind;

    #[tokio::test]
    async fn find_latest_sees_deleted_conversations() -> Result<(), Error> {
        let db = test_db::connect().await?;
        let user = fixtures::user(&db, None, "ann@acme.test").await;
        let document = fixtures::document(&db, None).await;
        let created = create(&db, document.id, user.id, None).await?;
        soft_delete(&db, EntityKind::Conversation, created.id, true).await?;

        let found = find_latest_for_document_and_user(&db, document.id, user.id)
            .await?
            .unwrap();

        assert_eq!(found.id, created.id);
        assert!(found.is_deleted);
        assert!(find_by_id(&db, created.id).await.is_err());
        Ok(())
    }
}
