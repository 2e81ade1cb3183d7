use super::error::Error;
use crate::soft_delete::{filtered_query, find_live_by_id};
use chrono::Utc;
use entity::policy_type::PolicyType;
use entity::{policies::*, policy_rules, Id};
use sea_orm::{
    entity::prelude::*, sea_query::Condition, ActiveValue::Set, DatabaseConnection, QueryOrder,
    QuerySelect,
};
use serde::Serialize;
use std::collections::HashMap;

use log::*;

/// A rule together with how well it matched a search, when it came from one.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScoredRule {
    #[serde(flatten)]
    pub rule: policy_rules::Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

impl From<policy_rules::Model> for ScoredRule {
    fn from(rule: policy_rules::Model) -> Self {
        Self {
            rule,
            similarity: None,
        }
    }
}

/// A policy and the subset of its rules relevant to the caller.
///
/// Produced by company-wide retrieval (all live rules, no similarity),
/// checklist resolution (the checklist's rules) and semantic search (the rules
/// that matched, each scored, with the policy carrying the best score).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PolicyWithRules {
    #[serde(flatten)]
    pub policy: Model,
    pub rules: Vec<ScoredRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

impl PolicyWithRules {
    pub fn new(policy: Model, rules: Vec<policy_rules::Model>) -> Self {
        Self {
            policy,
            rules: rules.into_iter().map(ScoredRule::from).collect(),
            similarity: None,
        }
    }
}

pub async fn create(db: &DatabaseConnection, policy_model: Model) -> Result<Model, Error> {
    debug!("New Policy Model to be inserted: {policy_model:?}");

    let now = Utc::now();

    let policy_active_model: ActiveModel = ActiveModel {
        name: Set(policy_model.name),
        description: Set(policy_model.description),
        policy_type: Set(policy_model.policy_type),
        source_url: Set(policy_model.source_url),
        is_active: Set(policy_model.is_active),
        company_id: Set(policy_model.company_id),
        is_deleted: Set(false),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    };

    Ok(policy_active_model.insert(db).await?)
}

pub async fn find_by_id(db: &DatabaseConnection, id: Id) -> Result<Model, Error> {
    find_live_by_id::<Entity, _>(db, id).await
}

pub async fn find_all(db: &DatabaseConnection, offset: u64, limit: u64) -> Result<Vec<Model>, Error> {
    Ok(filtered_query::<Entity>(false)
        .order_by_asc(Column::Id)
        .offset(offset)
        .limit(limit)
        .all(db)
        .await?)
}

/// Live policies owned by the company, in id order.
pub async fn find_by_company(db: &DatabaseConnection, company_id: Id) -> Result<Vec<Model>, Error> {
    Ok(filtered_query::<Entity>(false)
        .filter(Column::CompanyId.eq(company_id))
        .order_by_asc(Column::Id)
        .all(db)
        .await?)
}

/// Live policies with the given ids, keyed by id. Missing ids are absent.
pub async fn find_by_ids(db: &DatabaseConnection, ids: &[Id]) -> Result<HashMap<Id, Model>, Error> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let policies = filtered_query::<Entity>(false)
        .filter(Column::Id.is_in(ids.iter().copied()))
        .all(db)
        .await?;

    Ok(policies.into_iter().map(|p| (p.id, p)).collect())
}

/// Company policies owned by `company_id` plus every industry and standard policy.
pub fn visible_to_company(company_id: Id) -> Condition {
    Condition::any()
        .add(
            Condition::all()
                .add(Column::PolicyType.eq(PolicyType::Company))
                .add(Column::CompanyId.eq(company_id)),
        )
        .add(Column::PolicyType.is_in([PolicyType::Industry, PolicyType::Standard]))
}

/// [`visible_to_company`], or only the shared policies for a user without a company.
pub fn visible_to(company_id: Option<Id>) -> Condition {
    match company_id {
        Some(company_id) => visible_to_company(company_id),
        None => Condition::all()
            .add(Column::PolicyType.is_in([PolicyType::Industry, PolicyType::Standard])),
    }
}

/// A page of live policies visible to the company, active or not.
pub async fn find_visible(
    db: &DatabaseConnection,
    company_id: Option<Id>,
    offset: u64,
    limit: u64,
) -> Result<Vec<Model>, Error> {
    Ok(filtered_query::<Entity>(false)
        .filter(visible_to(company_id))
        .order_by_asc(Column::Id)
        .offset(offset)
        .limit(limit)
        .all(db)
        .await?)
}

/// Ids of the active, live policies a company may use.
pub async fn find_active_ids_for_company(
    db: &DatabaseConnection,
    company_id: Option<Id>,
) -> Result<Vec<Id>, Error> {
    Ok(filtered_query::<Entity>(false)
        .select_only()
        .column(Column::Id)
        .filter(Column::IsActive.eq(true))
        .filter(visible_to(company_id))
        .order_by_asc(Column::Id)
        .into_tuple::<Id>()
        .all(db)
        .await?)
}

/// Every active, live policy visible to the company, each with all of its
/// live rules. Unranked; policies and rules come back in id order.
/// Without a company only the industry and standard policies apply.
pub async fn find_active_for_company(
    db: &DatabaseConnection,
    company_id: Option<Id>,
) -> Result<Vec<PolicyWithRules>, Error> {
    let policies = filtered_query::<Entity>(false)
        .filter(Column::IsActive.eq(true))
        .filter(visible_to(company_id))
        .order_by_asc(Column::Id)
        .all(db)
        .await?;

    let policy_ids: Vec<Id> = policies.iter().map(|p| p.id).collect();
    let mut rules_by_policy = crate::policy_rule::find_by_policies(db, &policy_ids).await?;

    debug!(
        "Found {} active policies for company {company_id:?}",
        policies.len()
    );

    Ok(policies
        .into_iter()
        .map(|policy| {
            let rules = rules_by_policy.remove(&policy.id).unwrap_or_default();
            PolicyWithRules::new(policy, rules)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soft_delete::soft_delete;
    use crate::test_db::{self, fixtures};
    use entity::ownership::EntityKind;
    use sea_orm::{DbBackend, QueryTrait};

    #[test]
    fn visible_to_company_builds_inclusive_condition() {
        assert_eq!(
            filtered_query::<Entity>(false)
                .filter(visible_to_company(7))
                .build(DbBackend::Postgres)
                .to_string(),
            r#"SELECT "policies"."id", "policies"."name", "policies"."description", "policies"."policy_type", "policies"."source_url", "policies"."is_active", "policies"."company_id", "policies"."is_deleted", "policies"."created_at", "policies"."updated_at" FROM "policies" WHERE "policies"."is_deleted" = FALSE AND (("policies"."policy_type" = 'company' AND "policies"."company_id" = 7) OR "policies"."policy_type" IN ('industry', 'standard'))"#
        );
    }

    #[tokio::test]
    async fn find_active_for_company_includes_shared_policies_with_live_rules() -> Result<(), Error>
    {
        let db = test_db::connect().await?;
        let acme = fixtures::company(&db, "Acme").await;
        let globex = fixtures::company(&db, "Globex").await;

        let own = fixtures::policy(&db, "Acme payments", Some(acme.id)).await;
        let own_rule = fixtures::rule(&db, own.id, "Net 30").await;
        let deleted_rule = fixtures::rule(&db, own.id, "Net 60").await;
        soft_delete(&db, EntityKind::PolicyRule, deleted_rule.id, true).await?;

        let industry =
            fixtures::policy_of_type(&db, "Industry", PolicyType::Industry, None, true).await;
        let standard =
            fixtures::policy_of_type(&db, "Standard", PolicyType::Standard, None, true).await;
        fixtures::policy(&db, "Globex payments", Some(globex.id)).await;
        fixtures::policy_of_type(&db, "Inactive", PolicyType::Industry, None, false).await;
        let removed = fixtures::policy(&db, "Removed", Some(acme.id)).await;
        soft_delete(&db, EntityKind::Policy, removed.id, true).await?;

        let found = find_active_for_company(&db, Some(acme.id)).await?;

        let ids: Vec<Id> = found.iter().map(|p| p.policy.id).collect();
        assert_eq!(ids, vec![own.id, industry.id, standard.id]);
        assert_eq!(found[0].rules, vec![ScoredRule::from(own_rule)]);
        assert!(found[1].rules.is_empty());
        assert!(found.iter().all(|p| p.similarity.is_none()));

        assert_eq!(
            find_active_ids_for_company(&db, Some(acme.id)).await?,
            vec![own.id, industry.id, standard.id]
        );
        assert_eq!(
            find_active_ids_for_company(&db, None).await?,
            vec![industry.id, standard.id]
        );
        Ok(())
    }

    #[tokio::test]
    async fn find_visible_pages_through_visible_policies() -> Result<(), Error> {
        let db = test_db::connect().await?;
        let acme = fixtures::company(&db, "Acme").await;
        let globex = fixtures::company(&db, "Globex").await;
        let own = fixtures::policy(&db, "Acme payments", Some(acme.id)).await;
        fixtures::policy(&db, "Globex payments", Some(globex.id)).await;
        let retired =
            fixtures::policy_of_type(&db, "Retired", PolicyType::Standard, None, false).await;

        let visible = find_visible(&db, Some(acme.id), 0, 10).await?;
        assert_eq!(visible, vec![own, retired.clone()]);
        assert_eq!(find_visible(&db, Some(acme.id), 1, 10).await?.len(), 1);
        assert_eq!(find_visible(&db, None, 0, 10).await?, vec![retired]);
        Ok(())
    }

    #[tokio::test]
    async fn find_by_ids_skips_deleted_and_missing() -> Result<(), Error> {
        let db = test_db::connect().await?;
        let kept = fixtures::policy(&db, "Kept", None).await;
        let deleted = fixtures::policy(&db, "Deleted", None).await;
        soft_delete(&db, EntityKind::Policy, deleted.id, false).await?;

        let found = find_by_ids(&db, &[kept.id, deleted.id, 999]).await?;

        assert_eq!(found.len(), 1);
        assert_eq!(found.get(&kept.id), Some(&kept));
        Ok(())
    }

    #[test]
    fn policy_with_rules_serializes_flat() {
        let now = Utc::now();
        let policy = Model {
            id: 3,
            name: "Payments".to_owned(),
            description: None,
            policy_type: PolicyType::Standard,
            source_url: None,
            is_active: true,
            company_id: None,
            is_deleted: false,
            created_at: now.into(),
            updated_at: now.into(),
        };
        let mut with_rules = PolicyWithRules::new(policy, vec![]);
        with_rules.similarity = Some(0.5);

        let json = serde_json::to_value(&with_rules).unwrap();

        assert_eq!(json["id"], 3);
        assert_eq!(json["policy_type"], "standard");
        assert_eq!(json["similarity"], 0.5);
        assert_eq!(json["rules"], serde_json::json!([]));
    }
}
