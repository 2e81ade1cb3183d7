use crate::embedding_index::{self, EmbeddingSource};
use crate::error::Error;
use crate::policy::ensure_can_edit;
use crate::{lifecycle, policy_rules, users, Id, IntoUpdateMap};
use entity::ownership::EntityKind;
use entity_api::{mutate, policy, policy_rule};
use log::*;
use review_ai::traits::embedding::Provider;
use sea_orm::{DatabaseConnection, IntoActiveModel};
use std::sync::Arc;

pub use entity_api::policy_rule::find_by_id;

/// Creates a rule under a policy the actor may edit and schedules its embedding.
pub async fn create(
    db: &DatabaseConnection,
    embedder: Arc<dyn Provider>,
    actor: &users::Model,
    rule_model: policy_rules::Model,
) -> Result<policy_rules::Model, Error> {
    let owner = policy::find_by_id(db, rule_model.policy_id).await?;
    ensure_can_edit(actor, &owner)?;

    let rule = policy_rule::create(db, rule_model).await?;
    info!("Created rule {} for policy {}", rule.id, owner.id);

    embedding_index::schedule_upsert(db.clone(), embedder, EmbeddingSource::Rule(rule.clone()));
    Ok(rule)
}

/// Applies `params` and re-embeds the rule when its embedded text may have changed.
/// A rule cannot move to another policy.
pub async fn update(
    db: &DatabaseConnection,
    embedder: Arc<dyn Provider>,
    actor: &users::Model,
    id: Id,
    params: impl IntoUpdateMap + std::fmt::Debug,
) -> Result<policy_rules::Model, Error> {
    let existing = policy_rule::find_by_id(db, id).await?;
    let owner = policy::find_by_id(db, existing.policy_id).await?;
    ensure_can_edit(actor, &owner)?;
    debug!("Updating rule {id} with {params:?}");

    let mut update_map = params.into_update_map();
    update_map.remove("policy_id");
    let re_embed = update_map.touches(&["rule_type", "description", "keywords"]);

    let updated = mutate::update::<policy_rules::ActiveModel, policy_rules::Column>(
        db,
        existing.into_active_model(),
        update_map,
    )
    .await?;

    if re_embed {
        embedding_index::schedule_upsert(db.clone(), embedder, EmbeddingSource::Rule(updated.clone()));
    }
    Ok(updated)
}

/// Soft-deletes the rule and its embedding.
pub async fn delete(db: &DatabaseConnection, actor: &users::Model, id: Id) -> Result<u64, Error> {
    let existing = policy_rule::find_by_id(db, id).await?;
    let owner = policy::find_by_id(db, existing.policy_id).await?;
    ensure_can_edit(actor, &owner)?;

    lifecycle::soft_delete(db, EntityKind::PolicyRule, id, true).await
}

/// Rules of the active policies the actor's company may use whose description
/// or keywords contain `term`.
pub async fn find_rules(
    db: &DatabaseConnection,
    actor: &users::Model,
    term: &str,
) -> Result<Vec<policy_rules::Model>, Error> {
    let policy_ids = policy::find_active_ids_for_company(db, actor.company_id).await?;
    Ok(policy_rule::search(db, &policy_ids, term).await?)
}
