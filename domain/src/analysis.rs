//! Document review runs: getting the document into the analyzer's file store,
//! choosing the policies to review against and storing the findings.
use crate::document;
use crate::error::Error;
use crate::formatter::policies_text;
use crate::gateway::Providers;
use crate::{
    analysis_results, checklist, documents, lifecycle, semantic_search, users, Id, PolicyWithRules,
};
use chrono::Utc;
use entity::ownership::EntityKind;
use entity_api::{analysis_result, document as document_api, policy};
use log::*;
use review_ai::traits::analysis::Provider;
use review_ai::traits::extraction::Extractor;
use review_ai::{DocumentAnalysis, FileHandle, Upload};
use sea_orm::DatabaseConnection;
use serde::Serialize;

const PLAIN_TEXT: &str = "text/plain";

/// Which policies and rules a document is reviewed against.
#[derive(Clone, Debug, PartialEq)]
pub enum RuleSource {
    /// Only the rules a checklist selects
    Checklist(Id),
    /// Every active policy available to the document's company
    ActivePolicies,
    /// The policies most relevant to a piece of text, such as a question
    Relevant { query: String, top_k: usize },
}

/// Makes sure the analyzer holds the document and returns its handle.
///
/// A stored handle is reused while the analyzer still knows it. Otherwise the
/// document is uploaded again: plain text files as they are, anything else as
/// its extracted text.
pub async fn ensure_uploaded(
    db: &DatabaseConnection,
    analyzer: &dyn Provider,
    extractor: &dyn Extractor,
    document: &documents::Model,
) -> Result<FileHandle, Error> {
    if let Some(name) = document.external_name.as_deref() {
        match analyzer.find_file(name).await {
            Ok(Some(handle)) => return Ok(handle),
            Ok(None) => info!("Analyzer no longer holds {name} for document {}", document.id),
            Err(err) => error!(
                "Error getting document {} from the analyzer: {err}",
                document.id
            ),
        }
    }

    let upload = if document.content_type == PLAIN_TEXT {
        Upload {
            display_name: document.filename.clone(),
            mime_type: PLAIN_TEXT.to_string(),
            content: tokio::fs::read(&document.file_path).await?,
        }
    } else {
        let text = match &document.text_content {
            Some(text) => text.clone(),
            None => document::extract(db, extractor, document)
                .await?
                .text_content
                .unwrap_or_default(),
        };
        Upload {
            display_name: format!("{}.txt", document.filename),
            mime_type: PLAIN_TEXT.to_string(),
            content: text.into_bytes(),
        }
    };

    let handle = analyzer.upload(upload).await.map_err(|err| {
        error!("Uploading document {} to the analyzer failed: {err}", document.id);
        Error::analysis(err)
    })?;
    document_api::set_external_name(db, document.id, Some(handle.name.clone())).await?;
    info!("Uploaded document {} as {}", document.id, handle.name);
    Ok(handle)
}

/// The policies a review of `document` uses under `source`.
pub async fn source_rules(
    db: &DatabaseConnection,
    providers: &Providers,
    actor: &users::Model,
    document: &documents::Model,
    source: &RuleSource,
) -> Result<Vec<PolicyWithRules>, Error> {
    match source {
        RuleSource::Checklist(checklist_id) => checklist::resolve(db, actor, *checklist_id).await,
        RuleSource::ActivePolicies => {
            Ok(policy::find_active_for_company(db, document.company_id).await?)
        }
        RuleSource::Relevant { query, top_k } => {
            semantic_search::search_for_company(
                db,
                providers.embedder.as_ref(),
                document.company_id,
                query,
                *top_k,
            )
            .await
        }
    }
}

/// Reviews the document against the policies `source` selects, stores the
/// findings and marks the document processed.
pub async fn run(
    db: &DatabaseConnection,
    providers: &Providers,
    actor: &users::Model,
    document_id: Id,
    source: RuleSource,
) -> Result<analysis_results::Model, Error> {
    let document = document::find(db, actor, document_id).await?;
    let file = ensure_uploaded(
        db,
        providers.analyzer.as_ref(),
        providers.extractor.as_ref(),
        &document,
    )
    .await?;

    let policies = source_rules(db, providers, actor, &document, &source).await?;
    debug!(
        "Analyzing document {document_id} against {} policies ({source:?})",
        policies.len()
    );

    let findings = providers
        .analyzer
        .analyze(&file, &policies_text(&policies))
        .await
        .map_err(|err| {
            error!("Analysis of document {document_id} failed: {err}");
            Error::analysis(err)
        })?;

    let checklist_id = match source {
        RuleSource::Checklist(checklist_id) => Some(checklist_id),
        _ => None,
    };
    let stored = analysis_result::create(db, result_model(document_id, checklist_id, findings)?)
        .await?;
    document_api::mark_processed(db, document_id).await?;

    info!("Stored analysis {} for document {document_id}", stored.id);
    Ok(stored)
}

fn result_model(
    document_id: Id,
    checklist_id: Option<Id>,
    findings: DocumentAnalysis,
) -> Result<analysis_results::Model, Error> {
    let now = Utc::now();
    Ok(analysis_results::Model {
        id: 0,
        document_id,
        checklist_id,
        title: findings.title,
        company_name: findings.company_name,
        conflicts: Some(to_json(&findings.conflicts)?),
        risks: Some(to_json(&findings.risks)?),
        missing_clauses: Some(to_json(&findings.missing_clauses)?),
        suggestions: Some(to_json(&findings.suggestions)?),
        payment_terms: Some(to_json(&findings.payment_terms)?),
        is_deleted: false,
        created_at: now.into(),
        updated_at: now.into(),
    })
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, Error> {
    serde_json::to_value(value).map_err(|err| Error::analysis(err.into()))
}

/// Results of the document's reviews, newest first.
pub async fn list(
    db: &DatabaseConnection,
    actor: &users::Model,
    document_id: Id,
) -> Result<Vec<analysis_results::Model>, Error> {
    let document = document::find(db, actor, document_id).await?;
    Ok(analysis_result::find_by_document(db, document.id).await?)
}

pub async fn find(
    db: &DatabaseConnection,
    actor: &users::Model,
    id: Id,
) -> Result<analysis_results::Model, Error> {
    let result = analysis_result::find_by_id(db, id).await?;
    document::find(db, actor, result.document_id).await?;
    Ok(result)
}

pub async fn delete(db: &DatabaseConnection, actor: &users::Model, id: Id) -> Result<u64, Error> {
    let result = find(db, actor, id).await?;
    lifecycle::soft_delete(db, EntityKind::AnalysisResult, result.id, true).await
}
