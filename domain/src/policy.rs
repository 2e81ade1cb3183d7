use crate::embedding_index::{self, EmbeddingSource};
use crate::error::Error;
use crate::{lifecycle, policies, users, Id, IntoUpdateMap, PolicyWithRules};
use entity::ownership::EntityKind;
use entity::policy_type::PolicyType;
use entity_api::{company, mutate, policy, policy_rule, soft_delete};
use log::*;
use review_ai::traits::embedding::Provider;
use sea_orm::{DatabaseConnection, IntoActiveModel};
use std::sync::Arc;

pub use entity_api::policy::find_active_for_company;

/// Creates a policy and schedules its embedding.
///
/// Company policies belong to the actor's company unless a superuser names
/// another one. Only superusers create industry and standard policies.
pub async fn create(
    db: &DatabaseConnection,
    embedder: Arc<dyn Provider>,
    actor: &users::Model,
    mut policy_model: policies::Model,
) -> Result<policies::Model, Error> {
    match policy_model.policy_type {
        PolicyType::Company => match (actor.is_superuser, policy_model.company_id) {
            (true, Some(company_id)) => {
                company::find_by_id(db, company_id).await?;
            }
            _ => {
                policy_model.company_id = Some(actor.company_id.ok_or_else(|| {
                    Error::invalid("You must belong to a company to create a company policy")
                })?);
            }
        },
        PolicyType::Industry | PolicyType::Standard => {
            if !actor.is_superuser {
                return Err(Error::forbidden(
                    "Only superusers can create industry or standard policies",
                ));
            }
            policy_model.company_id = None;
        }
    }

    let policy = policy::create(db, policy_model).await?;
    info!("Created {} policy {}", policy.policy_type, policy.id);

    embedding_index::schedule_upsert(db.clone(), embedder, EmbeddingSource::Policy(policy.clone()));
    Ok(policy)
}

/// A live policy the actor can see. Policies of other companies are reported
/// as missing.
pub async fn find(
    db: &DatabaseConnection,
    actor: &users::Model,
    id: Id,
) -> Result<policies::Model, Error> {
    let policy = policy::find_by_id(db, id).await?;
    if !can_see(actor, &policy) {
        return Err(Error::not_found());
    }
    Ok(policy)
}

pub async fn find_with_rules(
    db: &DatabaseConnection,
    actor: &users::Model,
    id: Id,
) -> Result<PolicyWithRules, Error> {
    let policy = find(db, actor, id).await?;
    let rules = policy_rule::find_by_policy(db, policy.id).await?;
    Ok(PolicyWithRules::new(policy, rules))
}

pub async fn list(
    db: &DatabaseConnection,
    actor: &users::Model,
    offset: u64,
    limit: u64,
) -> Result<Vec<policies::Model>, Error> {
    if actor.is_superuser {
        Ok(policy::find_all(db, offset, limit).await?)
    } else {
        Ok(policy::find_visible(db, actor.company_id, offset, limit).await?)
    }
}

/// Applies `params` and re-embeds the policy when its name or description changed.
/// Only superusers may move a policy between types or companies.
pub async fn update(
    db: &DatabaseConnection,
    embedder: Arc<dyn Provider>,
    actor: &users::Model,
    id: Id,
    params: impl IntoUpdateMap + std::fmt::Debug,
) -> Result<policies::Model, Error> {
    let existing = policy::find_by_id(db, id).await?;
    ensure_can_edit(actor, &existing)?;
    debug!("Updating policy {id} with {params:?}");

    let mut update_map = params.into_update_map();
    if !actor.is_superuser {
        update_map.remove("policy_type");
        update_map.remove("company_id");
    }
    let re_embed = update_map.touches(&["name", "description"]);

    let updated = mutate::update::<policies::ActiveModel, policies::Column>(
        db,
        existing.into_active_model(),
        update_map,
    )
    .await?;

    if re_embed {
        embedding_index::schedule_upsert(
            db.clone(),
            embedder,
            EmbeddingSource::Policy(updated.clone()),
        );
    }
    Ok(updated)
}

/// Soft-deletes the policy with its rules and their embeddings.
pub async fn delete(db: &DatabaseConnection, actor: &users::Model, id: Id) -> Result<u64, Error> {
    let existing = policy::find_by_id(db, id).await?;
    ensure_can_edit(actor, &existing)?;

    lifecycle::soft_delete(db, EntityKind::Policy, id, true).await
}

/// Restores a deleted policy, and its rules with `restore_children`.
///
/// Embeddings stay deleted through a restore, so the restored records are
/// embedded again.
pub async fn restore(
    db: &DatabaseConnection,
    embedder: Arc<dyn Provider>,
    actor: &users::Model,
    id: Id,
    restore_children: bool,
) -> Result<policies::Model, Error> {
    let existing = soft_delete::find_any_by_id::<policies::Entity, _>(db, id).await?;
    ensure_can_edit(actor, &existing)?;

    lifecycle::restore(db, EntityKind::Policy, id, true, restore_children).await?;

    let restored = policy::find_by_id(db, id).await?;
    embedding_index::schedule_upsert(
        db.clone(),
        Arc::clone(&embedder),
        EmbeddingSource::Policy(restored.clone()),
    );
    if restore_children {
        for rule in policy_rule::find_by_policy(db, id).await? {
            embedding_index::schedule_upsert(
                db.clone(),
                Arc::clone(&embedder),
                EmbeddingSource::Rule(rule),
            );
        }
    }
    Ok(restored)
}

fn can_see(actor: &users::Model, policy: &policies::Model) -> bool {
    if actor.is_superuser {
        return true;
    }
    match actor.company_id {
        Some(company_id) => policy.visible_to(company_id),
        None => policy.policy_type.is_shared(),
    }
}

/// Superusers edit every policy. Everyone else edits only their own company's.
pub(crate) fn ensure_can_edit(actor: &users::Model, policy: &policies::Model) -> Result<(), Error> {
    let own_company_policy = policy.policy_type == PolicyType::Company
        && actor.company_id.is_some()
        && policy.company_id == actor.company_id;

    if actor.is_superuser || own_company_policy {
        Ok(())
    } else {
        Err(Error::forbidden("You don't have permission to edit this policy"))
    }
}
