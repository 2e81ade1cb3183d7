use super::error::Error;
use crate::soft_delete::{filtered_query, find_live_by_id};
use chrono::Utc;
use entity::{documents::*, Id};
use sea_orm::{
    entity::prelude::*, ActiveValue::Set, ActiveValue::Unchanged, DatabaseConnection, QueryOrder,
};

use log::*;

pub async fn create(db: &DatabaseConnection, document_model: Model) -> Result<Model, Error> {
    debug!("New Document Model to be inserted: {document_model:?}");

    let now = Utc::now();

    let document_active_model: ActiveModel = ActiveModel {
        filename: Set(document_model.filename),
        content_type: Set(document_model.content_type),
        file_path: Set(document_model.file_path),
        text_content: Set(document_model.text_content),
        company_id: Set(document_model.company_id),
        is_processed: Set(false),
        external_name: Set(None),
        is_deleted: Set(false),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    };

    Ok(document_active_model.insert(db).await?)
}

pub async fn find_by_id(db: &DatabaseConnection, id: Id) -> Result<Model, Error> {
    find_live_by_id::<Entity, _>(db, id).await
}

/// Live documents, newest first. `None` lists every company's documents.
pub async fn find_by_company(
    db: &DatabaseConnection,
    company_id: Option<Id>,
) -> Result<Vec<Model>, Error> {
    let mut query = filtered_query::<Entity>(false);
    if let Some(company_id) = company_id {
        query = query.filter(Column::CompanyId.eq(company_id));
    }
    Ok(query.order_by_desc(Column::Id).all(db).await?)
}

pub async fn set_text_content(db: &DatabaseConnection, id: Id, text: String) -> Result<Model, Error> {
    let document = find_by_id(db, id).await?;
    debug!("Storing {} characters of extracted text for document {id}", text.len());

    let active_model = ActiveModel {
        id: Unchanged(document.id),
        text_content: Set(Some(text)),
        updated_at: Set(Utc::now().into()),
        ..Default::default()
    };
    Ok(active_model.update(db).await?)
}

pub async fn set_external_name(
    db: &DatabaseConnection,
    id: Id,
    external_name: Option<String>,
) -> Result<Model, Error> {
    let document = find_by_id(db, id).await?;

    let active_model = ActiveModel {
        id: Unchanged(document.id),
        external_name: Set(external_name),
        updated_at: Set(Utc::now().into()),
        ..Default::default()
    };
    Ok(active_model.update(db).await?)
}

pub async fn mark_processed(db: &DatabaseConnection, id: Id) -> Result<Model, Error> {
    let document = find_by_id(db, id).await?;

    let active_model = ActiveModel {
        id: Unchanged(document.id),
        is_processed: Set(true),
        updated_at: Set(Utc::now().into()),
        ..Default::default()
    };
    Ok(active_model.update(db).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EntityApiErrorKind;
    use crate::soft_delete::soft_delete;
    use crate::test_db::{self, fixtures};
    use entity::ownership::EntityKind;

    #[tokio::test]
    async fn create_starts_unprocessed_without_external_name() -> Result<(), Error> {
        let db = test_db::connect().await?;
        let mut model = fixtures::document(&db, None).await;
        model.is_processed = true;
        model.external_name = Some("files/abc".to_owned());

        let created = create(&db, model).await?;

        assert!(!created.is_processed);
        assert_eq!(created.external_name, None);
        Ok(())
    }

    #[tokio::test]
    async fn lifecycle_updates_text_handle_and_processed_flag() -> Result<(), Error> {
        let db = test_db::connect().await?;
        let document = fixtures::document(&db, None).await;

        set_text_content(&db, document.id, "New text".to_owned()).await?;
        set_external_name(&db, document.id, Some("files/abc".to_owned())).await?;
        let processed = mark_processed(&db, document.id).await?;

        assert_eq!(processed.text_content.as_deref(), Some("New text"));
        assert_eq!(processed.external_name.as_deref(), Some("files/abc"));
        assert!(processed.is_processed);
        assert_eq!(processed.filename, document.filename);
        Ok(())
    }

    #[tokio::test]
    async fn find_by_company_scopes_and_hides_deleted() -> Result<(), Error> {
        let db = test_db::connect().await?;
        let acme = fixtures::company(&db, "Acme").await;
        let older = fixtures::document(&db, Some(acme.id)).await;
        let newer = fixtures::document(&db, Some(acme.id)).await;
        let unassigned = fixtures::document(&db, None).await;
        let deleted = fixtures::document(&db, Some(acme.id)).await;
        soft_delete(&db, EntityKind::Document, deleted.id, true).await?;

        assert_eq!(
            find_by_company(&db, Some(acme.id)).await?,
            vec![newer.clone(), older.clone()]
        );
        assert_eq!(find_by_company(&db, None).await?, vec![unassigned, newer, older]);
        assert_eq!(
            find_by_id(&db, deleted.id).await.unwrap_err().error_kind,
            EntityApiErrorKind::RecordNotFound
        );
        Ok(())
    }
}
