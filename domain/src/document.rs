//! Uploaded documents: storage on disk, background text extraction, tenancy.
use crate::error::Error;
use crate::user::is_member;
use crate::{documents, lifecycle, users, Id};
use chrono::Utc;
use entity::ownership::EntityKind;
use entity_api::document;
use log::*;
use review_ai::traits::extraction::Extractor;
use sea_orm::DatabaseConnection;
use service::config::Config;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// A file received from a user.
#[derive(Clone, Debug)]
pub struct NewDocument {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
    /// Honoured for superusers only; everyone else uploads into their own company.
    pub company_id: Option<Id>,
}

/// Stores the file under a unique name, records it unprocessed and starts
/// extracting its text in the background.
pub async fn upload(
    db: &DatabaseConnection,
    config: &Config,
    extractor: Arc<dyn Extractor>,
    actor: &users::Model,
    new_document: NewDocument,
) -> Result<documents::Model, Error> {
    let company_id = if actor.is_superuser {
        new_document.company_id
    } else {
        actor.company_id
    };

    let original_name = Path::new(&new_document.filename)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let stored_name = format!("{}_{original_name}", Uuid::new_v4());

    let storage = Path::new(config.document_storage_path());
    tokio::fs::create_dir_all(storage).await?;
    let file_path = storage.join(&stored_name);
    tokio::fs::write(&file_path, &new_document.content).await?;

    let now = Utc::now();
    let created = document::create(
        db,
        documents::Model {
            id: 0,
            filename: stored_name,
            content_type: new_document.content_type,
            file_path: file_path.to_string_lossy().into_owned(),
            text_content: None,
            company_id,
            is_processed: false,
            external_name: None,
            is_deleted: false,
            created_at: now.into(),
            updated_at: now.into(),
        },
    )
    .await?;
    info!(
        "Stored document {} ({} bytes) at {}",
        created.id,
        new_document.content.len(),
        created.file_path
    );

    schedule_extraction(db.clone(), extractor, created.clone());
    Ok(created)
}

/// Extracts the document's text and stores it on the record.
pub async fn extract(
    db: &DatabaseConnection,
    extractor: &dyn Extractor,
    document: &documents::Model,
) -> Result<documents::Model, Error> {
    let text = extractor
        .extract_text(Path::new(&document.file_path), &document.content_type)
        .await
        .map_err(Error::extraction)?;

    Ok(document::set_text_content(db, document.id, text).await?)
}

/// Runs [`extract`] on its own task. A failure leaves the document without
/// text and is only logged.
pub fn schedule_extraction(
    db: DatabaseConnection,
    extractor: Arc<dyn Extractor>,
    document: documents::Model,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match extract(&db, extractor.as_ref(), &document).await {
            Ok(updated) => info!(
                "Extracted {} characters from document {}",
                updated.text_content.as_deref().map_or(0, str::len),
                document.id
            ),
            Err(err) => error!("Error processing document {}: {err}", document.id),
        }
    })
}

pub async fn find(
    db: &DatabaseConnection,
    actor: &users::Model,
    id: Id,
) -> Result<documents::Model, Error> {
    let document = document::find_by_id(db, id).await?;
    if !is_member(actor, document.company_id) {
        return Err(Error::not_found());
    }
    Ok(document)
}

/// Superusers list every document, members their company's.
pub async fn list(
    db: &DatabaseConnection,
    actor: &users::Model,
) -> Result<Vec<documents::Model>, Error> {
    if actor.is_superuser {
        return Ok(document::find_by_company(db, None).await?);
    }
    match actor.company_id {
        Some(company_id) => Ok(document::find_by_company(db, Some(company_id)).await?),
        None => Ok(Vec::new()),
    }
}

/// Soft-deletes the document with its analyses and conversations, then
/// removes the stored file if it can.
pub async fn delete(db: &DatabaseConnection, actor: &users::Model, id: Id) -> Result<u64, Error> {
    let existing = find(db, actor, id).await?;

    let deleted = lifecycle::soft_delete(db, EntityKind::Document, id, true).await?;

    if let Err(err) = tokio::fs::remove_file(&existing.file_path).await {
        warn!(
            "Could not remove stored file {} of document {id}: {err}",
            existing.file_path
        );
    }
    Ok(deleted)
}
