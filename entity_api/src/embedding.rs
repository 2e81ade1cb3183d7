//! Storage for embedding rows.
//!
//! At most one live row exists per `(content_type, content_id)`. Replacing a
//! vector soft-deletes the live row and inserts the new one in the same
//! transaction, and the database backs this with a partial unique index.

use super::error::Error;
use crate::soft_delete::filtered_query;
use chrono::Utc;
use entity::content_type::ContentType;
use entity::vector::Vector;
use entity::{embeddings::*, Id};
use sea_orm::{
    entity::prelude::*, sea_query::Expr, ActiveValue::Set, DatabaseConnection, QueryOrder,
    TransactionTrait,
};

use log::*;

/// The live embedding for a content item, if any.
pub async fn find_live(
    db: &DatabaseConnection,
    content_type: ContentType,
    content_id: Id,
) -> Result<Option<Model>, Error> {
    Ok(filtered_query::<Entity>(false)
        .filter(Column::ContentType.eq(content_type))
        .filter(Column::ContentId.eq(content_id))
        .one(db)
        .await?)
}

/// Every live embedding in id order.
pub async fn find_all_live(db: &DatabaseConnection) -> Result<Vec<Model>, Error> {
    Ok(filtered_query::<Entity>(false)
        .order_by_asc(Column::Id)
        .all(db)
        .await?)
}

/// Soft-deletes any live embedding for the item and stores `vector` as the new one.
pub async fn replace(
    db: &DatabaseConnection,
    content_type: ContentType,
    content_id: Id,
    vector: Vector,
) -> Result<Model, Error> {
    debug!(
        "Replacing {content_type} {content_id} embedding with {} dimensions",
        vector.dimensions()
    );

    let now = Utc::now();
    let txn = db.begin().await?;

    let retired = mark_live_deleted(&txn, content_type, content_id).await?;
    if retired > 0 {
        debug!("Retired {retired} previous {content_type} {content_id} embedding(s)");
    }

    let inserted = ActiveModel {
        content_type: Set(content_type),
        content_id: Set(content_id),
        embedding: Set(vector),
        is_deleted: Set(false),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    Ok(inserted)
}

/// Soft-deletes the live embedding for the item. Returns whether one existed.
pub async fn delete_live(
    db: &DatabaseConnection,
    content_type: ContentType,
    content_id: Id,
) -> Result<bool, Error> {
    Ok(mark_live_deleted(db, content_type, content_id).await? > 0)
}

async fn mark_live_deleted<C: ConnectionTrait>(
    db: &C,
    content_type: ContentType,
    content_id: Id,
) -> Result<u64, Error> {
    let now: DateTimeWithTimeZone = Utc::now().into();
    let result = Entity::update_many()
        .col_expr(Column::IsDeleted, Expr::value(true))
        .col_expr(Column::UpdatedAt, Expr::value(now))
        .filter(Column::ContentType.eq(content_type))
        .filter(Column::ContentId.eq(content_id))
        .filter(Column::IsDeleted.eq(false))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_db::{self, fixtures};
    use sea_orm::PaginatorTrait;

    #[tokio::test]
    async fn replace_keeps_a_single_live_row_per_item() -> Result<(), Error> {
        let db = test_db::connect().await?;

        let first = replace(&db, ContentType::Rule, 5, Vector(vec![1.0, 0.0])).await?;
        let second = replace(&db, ContentType::Rule, 5, Vector(vec![0.0, 1.0])).await?;
        replace(&db, ContentType::Policy, 5, Vector(vec![1.0, 1.0])).await?;

        let live = find_live(&db, ContentType::Rule, 5).await?;
        assert_eq!(live.as_ref().map(|e| e.id), Some(second.id));
        assert_ne!(first.id, second.id);
        assert_eq!(
            filtered_query::<Entity>(false)
                .filter(Column::ContentType.eq(ContentType::Rule))
                .count(&db)
                .await?,
            1
        );
        assert_eq!(filtered_query::<Entity>(true).count(&db).await?, 3);
        Ok(())
    }

    #[tokio::test]
    async fn live_index_rejects_a_second_live_row() -> Result<(), Error> {
        let db = test_db::connect().await?;
        fixtures::embedding(&db, ContentType::Policy, 1, vec![1.0]).await;

        let duplicate = ActiveModel {
            content_type: Set(ContentType::Policy),
            content_id: Set(1),
            embedding: Set(Vector(vec![2.0])),
            is_deleted: Set(false),
            created_at: Set(Utc::now().into()),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .insert(&db)
        .await;

        assert!(duplicate.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn delete_live_reports_whether_anything_was_deleted() -> Result<(), Error> {
        let db = test_db::connect().await?;
        replace(&db, ContentType::Policy, 9, Vector(vec![1.0])).await?;

        assert!(delete_live(&db, ContentType::Policy, 9).await?);
        assert!(!delete_live(&db, ContentType::Policy, 9).await?);
        assert_eq!(find_live(&db, ContentType::Policy, 9).await?, None);
        assert!(find_all_live(&db).await?.is_empty());
        Ok(())
    }
}
