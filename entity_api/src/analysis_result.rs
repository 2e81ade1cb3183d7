use super::error::Error;
use crate::soft_delete::{filtered_query, find_live_by_id};
use chrono::Utc;
use entity::{analysis_results::*, Id};
use sea_orm::{entity::prelude::*, ActiveValue::Set, DatabaseConnection, QueryOrder};

use log::*;

pub async fn create(db: &DatabaseConnection, result_model: Model) -> Result<Model, Error> {
    debug!(
        "New AnalysisResult for document {} to be inserted",
        result_model.document_id
    );

    let now = Utc::now();

    let result_active_model: ActiveModel = ActiveModel {
        document_id: Set(result_model.document_id),
        checklist_id: Set(result_model.checklist_id),
        title: Set(result_model.title),
        company_name: Set(result_model.company_name),
        conflicts: Set(result_model.conflicts),
        risks: Set(result_model.risks),
        missing_clauses: Set(result_model.missing_clauses),
        suggestions: Set(result_model.suggestions),
        payment_terms: Set(result_model.payment_terms),
        is_deleted: Set(false),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    };

    Ok(result_active_model.insert(db).await?)
}

pub async fn find_by_id(db: &DatabaseConnection, id: Id) -> Result<Model, Error> {
    find_live_by_id::<Entity, _>(db, id).await
}

/// Live results for a document, newest first.
pub async fn find_by_document(db: &DatabaseConnection, document_id: Id) -> Result<Vec<Model>, Error> {
    Ok(filtered_query::<Entity>(false)
        .filter(Column::DocumentId.eq(document_id))
        .order_by_desc(Column::Id)
        .all(db)
        .await?)
}
