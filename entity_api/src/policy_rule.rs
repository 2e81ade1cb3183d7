use super::error::{EntityApiErrorKind, Error};
use crate::soft_delete::{filtered_query, find_live_by_id};
use chrono::Utc;
use entity::{policy_rules::*, Id};
use sea_orm::{entity::prelude::*, ActiveValue::Set, DatabaseConnection, QueryOrder, QuerySelect};
use std::collections::{BTreeSet, HashMap};

use log::*;

pub async fn create(db: &DatabaseConnection, rule_model: Model) -> Result<Model, Error> {
    debug!("New PolicyRule Model to be inserted: {rule_model:?}");

    let now = Utc::now();

    let rule_active_model: ActiveModel = ActiveModel {
        policy_id: Set(rule_model.policy_id),
        rule_type: Set(rule_model.rule_type),
        description: Set(rule_model.description),
        severity: Set(rule_model.severity),
        keywords: Set(rule_model.keywords),
        is_deleted: Set(false),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    };

    Ok(rule_active_model.insert(db).await?)
}

pub async fn find_by_id(db: &DatabaseConnection, id: Id) -> Result<Model, Error> {
    find_live_by_id::<Entity, _>(db, id).await
}

pub async fn find_by_policy(db: &DatabaseConnection, policy_id: Id) -> Result<Vec<Model>, Error> {
    Ok(filtered_query::<Entity>(false)
        .filter(Column::PolicyId.eq(policy_id))
        .order_by_asc(Column::Id)
        .all(db)
        .await?)
}

pub async fn find_all_live(db: &DatabaseConnection) -> Result<Vec<Model>, Error> {
    Ok(filtered_query::<Entity>(false)
        .order_by_asc(Column::Id)
        .all(db)
        .await?)
}

/// Live rules of the given policies grouped by policy id, each group in id order.
pub async fn find_by_policies(
    db: &DatabaseConnection,
    policy_ids: &[Id],
) -> Result<HashMap<Id, Vec<Model>>, Error> {
    if policy_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rules = filtered_query::<Entity>(false)
        .filter(Column::PolicyId.is_in(policy_ids.iter().copied()))
        .order_by_asc(Column::Id)
        .all(db)
        .await?;

    let mut grouped: HashMap<Id, Vec<Model>> = HashMap::new();
    for rule in rules {
        grouped.entry(rule.policy_id).or_default().push(rule);
    }
    Ok(grouped)
}

/// Live rules with the given ids, keyed by id. Missing ids are absent.
pub async fn find_by_ids(db: &DatabaseConnection, ids: &[Id]) -> Result<HashMap<Id, Model>, Error> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rules = filtered_query::<Entity>(false)
        .filter(Column::Id.is_in(ids.iter().copied()))
        .all(db)
        .await?;

    Ok(rules.into_iter().map(|r| (r.id, r)).collect())
}

/// The ids in `ids` that do not name a live rule, ascending and de-duplicated.
pub async fn find_missing_ids(db: &DatabaseConnection, ids: &[Id]) -> Result<Vec<Id>, Error> {
    let wanted: BTreeSet<Id> = ids.iter().copied().collect();
    if wanted.is_empty() {
        return Ok(Vec::new());
    }

    let existing: BTreeSet<Id> = filtered_query::<Entity>(false)
        .select_only()
        .column(Column::Id)
        .filter(Column::Id.is_in(wanted.iter().copied()))
        .into_tuple::<Id>()
        .all(db)
        .await?
        .into_iter()
        .collect();

    Ok(wanted.difference(&existing).copied().collect())
}

/// Fails with [`EntityApiErrorKind::MissingRules`] naming every id in `ids`
/// that is not a live rule.
pub async fn ensure_exist(db: &DatabaseConnection, ids: &[Id]) -> Result<(), Error> {
    let missing = find_missing_ids(db, ids).await?;
    if missing.is_empty() {
        return Ok(());
    }

    debug!("Rejecting ruleset with unknown rule ids {missing:?}");
    Err(Error {
        source: None,
        error_kind: EntityApiErrorKind::MissingRules(missing),
    })
}

/// Live rules of the given policies whose description or keywords contain
/// `term`, ignoring case.
pub async fn search(
    db: &DatabaseConnection,
    policy_ids: &[Id],
    term: &str,
) -> Result<Vec<Model>, Error> {
    let term = term.trim().to_lowercase();
    if policy_ids.is_empty() || term.is_empty() {
        return Ok(Vec::new());
    }

    let rules = filtered_query::<Entity>(false)
        .filter(Column::PolicyId.is_in(policy_ids.iter().copied()))
        .order_by_asc(Column::Id)
        .all(db)
        .await?;

    Ok(rules
        .into_iter()
        .filter(|rule| {
            rule.description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&term))
                || rule
                    .keywords
                    .as_slice()
                    .iter()
                    .any(|k| k.to_lowercase().contains(&term))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutate::{self, UpdateMap};
    use crate::soft_delete::soft_delete;
    use crate::test_db::{self, fixtures};
    use entity::keywords::Keywords;
    use entity::ownership::EntityKind;
    use sea_orm::{IntoActiveModel, Value};

    #[tokio::test]
    async fn find_missing_ids_reports_unknown_and_deleted_rules() -> Result<(), Error> {
        let db = test_db::connect().await?;
        let policy = fixtures::policy(&db, "Payments", None).await;
        let live = fixtures::rule(&db, policy.id, "Net 30").await;
        let deleted = fixtures::rule(&db, policy.id, "Net 60").await;
        soft_delete(&db, EntityKind::PolicyRule, deleted.id, true).await?;

        let missing = find_missing_ids(&db, &[live.id, deleted.id, 99, 99]).await?;

        assert_eq!(missing, vec![deleted.id, 99]);
        assert!(find_missing_ids(&db, &[live.id]).await?.is_empty());
        assert!(find_missing_ids(&db, &[]).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn ensure_exist_names_the_missing_rules() -> Result<(), Error> {
        let db = test_db::connect().await?;
        let policy = fixtures::policy(&db, "Payments", None).await;
        let live = fixtures::rule(&db, policy.id, "Net 30").await;

        let err = ensure_exist(&db, &[live.id, 42]).await.unwrap_err();

        assert_eq!(err.error_kind, EntityApiErrorKind::MissingRules(vec![42]));
        assert!(ensure_exist(&db, &[live.id]).await.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn find_by_policies_groups_live_rules() -> Result<(), Error> {
        let db = test_db::connect().await?;
        let a = fixtures::policy(&db, "A", None).await;
        let b = fixtures::policy(&db, "B", None).await;
        let a1 = fixtures::rule(&db, a.id, "a1").await;
        let a2 = fixtures::rule(&db, a.id, "a2").await;
        let b1 = fixtures::rule(&db, b.id, "b1").await;
        soft_delete(&db, EntityKind::PolicyRule, b1.id, false).await?;

        let grouped = find_by_policies(&db, &[a.id, b.id]).await?;

        assert_eq!(grouped.get(&a.id), Some(&vec![a1, a2]));
        assert_eq!(grouped.get(&b.id), None);
        Ok(())
    }

    #[tokio::test]
    async fn search_matches_description_or_keywords_case_insensitively() -> Result<(), Error> {
        let db = test_db::connect().await?;
        let policy = fixtures::policy(&db, "Payments", None).await;
        let other = fixtures::policy(&db, "Other", None).await;
        let by_description = fixtures::rule(&db, policy.id, "Late PAYMENT fees apply").await;
        let by_keyword = fixtures::rule(&db, policy.id, "Invoices are due monthly").await;
        let mut update_map = UpdateMap::new();
        update_map.insert(
            "keywords".to_string(),
            Some(Value::Json(Some(Box::new(serde_json::json!(["payment terms"]))))),
        );
        let by_keyword = mutate::update::<ActiveModel, Column>(
            &db,
            by_keyword.into_active_model(),
            update_map,
        )
        .await?;
        assert_eq!(by_keyword.keywords, Keywords::new(["payment terms"]));
        fixtures::rule(&db, policy.id, "Unrelated").await;
        fixtures::rule(&db, other.id, "payment elsewhere").await;

        let found = search(&db, &[policy.id], "payment").await?;

        assert_eq!(found, vec![by_description, by_keyword]);
        assert!(search(&db, &[policy.id], "  ").await?.is_empty());
        Ok(())
    }
}
