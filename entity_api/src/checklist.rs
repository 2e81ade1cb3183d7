use super::error::Error;
use crate::policy::PolicyWithRules;
use crate::soft_delete::{filtered_query, find_live_by_id};
use crate::{policy, policy_rule};
use chrono::Utc;
use entity::{checklists::*, policy_rules, Id};
use sea_orm::{
    entity::prelude::*, sea_query::Condition, ActiveValue::Set, DatabaseConnection, QueryOrder,
};
use std::collections::HashMap;

use log::*;

pub async fn create(db: &DatabaseConnection, checklist_model: Model) -> Result<Model, Error> {
    debug!("New Checklist Model to be inserted: {checklist_model:?}");

    let now = Utc::now();

    let checklist_active_model: ActiveModel = ActiveModel {
        name: Set(checklist_model.name),
        user_id: Set(checklist_model.user_id),
        company_id: Set(checklist_model.company_id),
        ruleset: Set(checklist_model.ruleset),
        is_deleted: Set(false),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    };

    Ok(checklist_active_model.insert(db).await?)
}

pub async fn find_by_id(db: &DatabaseConnection, id: Id) -> Result<Model, Error> {
    find_live_by_id::<Entity, _>(db, id).await
}

/// Every live checklist, newest first.
pub async fn find_all(db: &DatabaseConnection) -> Result<Vec<Model>, Error> {
    Ok(filtered_query::<Entity>(false)
        .order_by_desc(Column::Id)
        .all(db)
        .await?)
}

/// Live checklists belonging to the company or authored by the user.
pub async fn find_by_company_or_user(
    db: &DatabaseConnection,
    company_id: Option<Id>,
    user_id: Id,
) -> Result<Vec<Model>, Error> {
    let mut scope = Condition::any().add(Column::UserId.eq(user_id));
    if let Some(company_id) = company_id {
        scope = scope.add(Column::CompanyId.eq(company_id));
    }

    Ok(filtered_query::<Entity>(false)
        .filter(scope)
        .order_by_desc(Column::Id)
        .all(db)
        .await?)
}

/// Resolves a checklist's ruleset into policies carrying only the selected rules.
///
/// Policies appear in the order their first rule appears in the ruleset, and
/// each policy's rules keep ruleset order. Rule ids that no longer resolve to a
/// live rule are skipped, and a policy left with no rules is omitted.
pub async fn resolve_rules(
    db: &DatabaseConnection,
    checklist_id: Id,
) -> Result<Vec<PolicyWithRules>, Error> {
    let checklist = find_by_id(db, checklist_id).await?;
    let rule_ids = checklist.ruleset.ids();

    let mut rules = policy_rule::find_by_ids(db, rule_ids).await?;
    if rules.len() < rule_ids.len() {
        debug!(
            "Checklist {checklist_id} references {} rules that no longer exist",
            rule_ids.len() - rules.len()
        );
    }

    let mut policy_order: Vec<Id> = Vec::new();
    let mut grouped: HashMap<Id, Vec<policy_rules::Model>> = HashMap::new();
    for rule_id in rule_ids {
        if let Some(rule) = rules.remove(rule_id) {
            let selected = grouped.entry(rule.policy_id).or_default();
            if selected.is_empty() {
                policy_order.push(rule.policy_id);
            }
            selected.push(rule);
        }
    }

    let mut policies = policy::find_by_ids(db, &policy_order).await?;

    Ok(policy_order
        .into_iter()
        .filter_map(|policy_id| {
            let rules = grouped.remove(&policy_id)?;
            match policies.remove(&policy_id) {
                Some(policy) => Some(PolicyWithRules::new(policy, rules)),
                None => {
                    warn!(
                        "Checklist {checklist_id} selects rules of policy {policy_id}, which is deleted"
                    );
                    None
                }
            }
        })
        .collect())
}
