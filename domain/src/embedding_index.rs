//! One live vector per policy or rule, and nearest-neighbour ranking over them.
//!
//! Vectors are computed by an [`embedding::Provider`] and stored through
//! `entity_api::embedding`, which retires the previous live row in the same
//! transaction as it inserts the new one. Ranking happens in process: every
//! live vector is scored by cosine similarity against the query vector.
use crate::error::Error;
use crate::Id;
use entity::content_type::ContentType;
use entity::vector::Vector;
use entity_api::{embedding, embeddings, policies, policy, policy_rule, policy_rules};
use governor::{Quota, RateLimiter};
use log::*;
use review_ai::traits::embedding::Provider;
use review_ai::Error as AiError;
use sea_orm::DatabaseConnection;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub const DEFAULT_TOP_K: usize = 10;

const REINDEX_PAGE_SIZE: u64 = 100;

/// The record an embedding is computed from.
#[derive(Clone, Debug, PartialEq)]
pub enum EmbeddingSource {
    Policy(policies::Model),
    Rule(policy_rules::Model),
}

impl EmbeddingSource {
    /// Builds a source from call sites that may hold either record.
    /// Exactly one of the two must be given.
    pub fn try_from_parts(
        policy: Option<policies::Model>,
        rule: Option<policy_rules::Model>,
    ) -> Result<Self, Error> {
        match (policy, rule) {
            (Some(policy), None) => Ok(Self::Policy(policy)),
            (None, Some(rule)) => Ok(Self::Rule(rule)),
            (None, None) => Err(Error::invalid(
                "Either a policy or a rule must be provided",
            )),
            (Some(_), Some(_)) => Err(Error::invalid(
                "Only one of a policy or a rule may be provided",
            )),
        }
    }

    pub fn content_type(&self) -> ContentType {
        match self {
            Self::Policy(_) => ContentType::Policy,
            Self::Rule(_) => ContentType::Rule,
        }
    }

    pub fn content_id(&self) -> Id {
        match self {
            Self::Policy(policy) => policy.id,
            Self::Rule(rule) => rule.id,
        }
    }

    /// The text whose vector represents the record.
    pub fn text(&self) -> String {
        match self {
            Self::Policy(policy) => policy_text(policy),
            Self::Rule(rule) => rule_text(rule),
        }
    }
}

pub fn policy_text(policy: &policies::Model) -> String {
    format!(
        "{} - {}",
        policy.name,
        policy.description.as_deref().unwrap_or_default()
    )
}

/// A rule without a description is represented by its keywords, which are
/// kept sorted so the text is reproducible.
pub fn rule_text(rule: &policy_rules::Model) -> String {
    let body = match rule.description.as_deref() {
        Some(description) if !description.trim().is_empty() => description.to_string(),
        _ => rule.keywords.join(" "),
    };
    format!("{} \n\n {}", rule.rule_type, body)
}

/// A ranked match from [`nearest`].
#[derive(Clone, Debug, PartialEq)]
pub struct Hit {
    pub content_type: ContentType,
    pub content_id: Id,
    /// Cosine similarity clamped to `[0, 1]`
    pub similarity: f64,
}

/// Embeds `text` and makes it the live vector for the content item.
pub async fn upsert_text(
    db: &DatabaseConnection,
    embedder: &dyn Provider,
    content_type: ContentType,
    content_id: Id,
    text: &str,
) -> Result<embeddings::Model, Error> {
    let values = embed(embedder, text).await.map_err(|err| {
        error!("Embedding {content_type} {content_id} failed: {err}");
        err
    })?;

    Ok(embedding::replace(db, content_type, content_id, Vector(values)).await?)
}

pub async fn upsert(
    db: &DatabaseConnection,
    embedder: &dyn Provider,
    source: &EmbeddingSource,
) -> Result<embeddings::Model, Error> {
    upsert_text(
        db,
        embedder,
        source.content_type(),
        source.content_id(),
        &source.text(),
    )
    .await
}

/// Runs [`upsert`] on its own task. Failures are logged and go no further.
pub fn schedule_upsert(
    db: DatabaseConnection,
    embedder: Arc<dyn Provider>,
    source: EmbeddingSource,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let content_type = source.content_type();
        let content_id = source.content_id();
        match upsert(&db, embedder.as_ref(), &source).await {
            Ok(row) => info!(
                "Embedded {content_type} {content_id} with {} as embedding {}",
                embedder.provider_id(),
                row.id
            ),
            Err(err) => error!("Background embedding of {content_type} {content_id} failed: {err}"),
        }
    })
}

/// Soft-deletes the live vector of the content item. Returns whether one existed.
pub async fn delete(
    db: &DatabaseConnection,
    content_type: ContentType,
    content_id: Id,
) -> Result<bool, Error> {
    let deleted = embedding::delete_live(db, content_type, content_id).await?;
    if deleted {
        debug!("Deleted embedding of {content_type} {content_id}");
    }
    Ok(deleted)
}

/// The `top_k` live content items most similar to `text`, best first.
pub async fn nearest(
    db: &DatabaseConnection,
    embedder: &dyn Provider,
    text: &str,
    top_k: usize,
) -> Result<Vec<Hit>, Error> {
    nearest_matching(db, embedder, text, top_k, |_| true).await
}

/// [`nearest`] over only the live rows `candidate` accepts. Rows are filtered
/// before ranking, so rejected rows never take one of the `top_k` places.
pub async fn nearest_matching<F>(
    db: &DatabaseConnection,
    embedder: &dyn Provider,
    text: &str,
    top_k: usize,
    candidate: F,
) -> Result<Vec<Hit>, Error>
where
    F: Fn(&embeddings::Model) -> bool,
{
    if top_k == 0 {
        return Ok(Vec::new());
    }

    let query = embed(embedder, text).await?;
    let rows: Vec<embeddings::Model> = embedding::find_all_live(db)
        .await?
        .into_iter()
        .filter(|row| candidate(row))
        .collect();
    debug!("Ranking {} candidate embeddings for top {top_k}", rows.len());

    Ok(rank(&query, rows, top_k))
}

/// Scores `rows` against `query` and keeps the best `top_k`.
///
/// Rows must come in id order: equal similarities keep that order. Rows whose
/// dimensionality differs from the query's are skipped.
pub fn rank(query: &[f32], rows: Vec<embeddings::Model>, top_k: usize) -> Vec<Hit> {
    let mut hits: Vec<Hit> = rows
        .into_iter()
        .filter_map(|row| {
            if row.embedding.dimensions() != query.len() {
                warn!(
                    "Skipping embedding {} of {} {}: {} dimensions, query has {}",
                    row.id,
                    row.content_type,
                    row.content_id,
                    row.embedding.dimensions(),
                    query.len()
                );
                return None;
            }
            let similarity = row.embedding.cosine_similarity(query).unwrap_or(0.0);
            Some(Hit {
                content_type: row.content_type,
                content_id: row.content_id,
                similarity: similarity.clamp(0.0, 1.0),
            })
        })
        .collect();

    hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    hits.truncate(top_k);
    hits
}

/// Outcome of a [`reindex`] run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReindexSummary {
    pub embedded: usize,
    /// Policies without a description
    pub skipped: usize,
    pub failed: usize,
}

/// Re-embeds every live policy that has a description and every live rule,
/// calling the provider at most `requests_per_minute` times a minute. A
/// failed item is logged and counted; the run carries on with the next one.
pub async fn reindex(
    db: &DatabaseConnection,
    embedder: &dyn Provider,
    requests_per_minute: u32,
) -> Result<ReindexSummary, Error> {
    let rate = NonZeroU32::new(requests_per_minute)
        .ok_or_else(|| Error::invalid("requests_per_minute must be at least 1"))?;
    let limiter = RateLimiter::direct(Quota::per_minute(rate));
    let mut summary = ReindexSummary::default();

    let mut sources = Vec::new();
    let mut offset = 0;
    loop {
        let page = policy::find_all(db, offset, REINDEX_PAGE_SIZE).await?;
        let fetched = page.len() as u64;
        for policy in page {
            if policy.description.as_deref().is_some_and(|d| !d.trim().is_empty()) {
                sources.push(EmbeddingSource::Policy(policy));
            } else {
                summary.skipped += 1;
            }
        }
        if fetched < REINDEX_PAGE_SIZE {
            break;
        }
        offset += fetched;
    }
    sources.extend(
        policy_rule::find_all_live(db)
            .await?
            .into_iter()
            .map(EmbeddingSource::Rule),
    );
    info!(
        "Re-embedding {} policies and rules at {requests_per_minute} per minute",
        sources.len()
    );

    for source in &sources {
        limiter.until_ready().await;
        match upsert(db, embedder, source).await {
            Ok(_) => summary.embedded += 1,
            Err(err) => {
                error!(
                    "Re-embedding {} {} failed: {err}",
                    source.content_type(),
                    source.content_id()
                );
                summary.failed += 1;
            }
        }
    }

    info!("Re-embedding finished: {summary:?}");
    Ok(summary)
}

async fn embed(embedder: &dyn Provider, text: &str) -> Result<Vec<f32>, Error> {
    let values = embedder.embed(text).await.map_err(Error::embedding)?;
    if values.is_empty() || values.len() != embedder.dimensions() {
        return Err(Error::embedding(AiError::InvalidResponse(format!(
            "{} returned {} values, expected {}",
            embedder.provider_id(),
            values.len(),
            embedder.dimensions()
        ))));
    }
    Ok(values)
}
