//! Free-text search returning the policies whose text, or whose rules' text,
//! is closest to the query.
//!
//! Each result carries only the rules that were hits themselves, each with its
//! own similarity, and the policy's similarity is the best of its direct hit
//! and its rule hits.
use crate::embedding_index::{self, Hit};
use crate::error::Error;
use crate::{Id, PolicyWithRules, ScoredRule};
use entity::content_type::ContentType;
use entity_api::{policies, policy, policy_rule, policy_rules};
use log::*;
use review_ai::traits::embedding::Provider;
use sea_orm::DatabaseConnection;
use std::collections::{HashMap, HashSet};

pub async fn search(
    db: &DatabaseConnection,
    embedder: &dyn Provider,
    query_text: &str,
    top_k: usize,
) -> Result<Vec<PolicyWithRules>, Error> {
    let hits = embedding_index::nearest(db, embedder, query_text, top_k).await?;
    resolve(db, hits).await
}

/// [`search`] restricted to the active policies a company may use, and to
/// their rules. Without a company only industry and standard policies count.
///
/// Other policies are left out before ranking, so they never crowd the
/// company's own policies out of the `top_k` hits.
pub async fn search_for_company(
    db: &DatabaseConnection,
    embedder: &dyn Provider,
    company_id: Option<Id>,
    query_text: &str,
    top_k: usize,
) -> Result<Vec<PolicyWithRules>, Error> {
    let policy_ids = policy::find_active_ids_for_company(db, company_id).await?;
    let rule_ids: HashSet<Id> = policy_rule::find_by_policies(db, &policy_ids)
        .await?
        .into_values()
        .flatten()
        .map(|rule| rule.id)
        .collect();
    let policy_ids: HashSet<Id> = policy_ids.into_iter().collect();
    debug!(
        "Searching {} policies and {} rules usable by company {company_id:?}",
        policy_ids.len(),
        rule_ids.len()
    );

    let hits = embedding_index::nearest_matching(db, embedder, query_text, top_k, |row| {
        match row.content_type {
            ContentType::Policy => policy_ids.contains(&row.content_id),
            ContentType::Rule => rule_ids.contains(&row.content_id),
        }
    })
    .await?;
    resolve(db, hits).await
}

/// Loads the live records behind `hits` and groups them with [`assemble`].
async fn resolve(db: &DatabaseConnection, hits: Vec<Hit>) -> Result<Vec<PolicyWithRules>, Error> {
    debug!("Semantic search produced {} raw hits", hits.len());
    let hits = dedup(hits);

    let rule_ids: Vec<Id> = hits
        .iter()
        .filter(|h| h.content_type == ContentType::Rule)
        .map(|h| h.content_id)
        .collect();
    let rules = policy_rule::find_by_ids(db, &rule_ids).await?;

    let mut policy_ids: Vec<Id> = hits
        .iter()
        .filter(|h| h.content_type == ContentType::Policy)
        .map(|h| h.content_id)
        .chain(rules.values().map(|r| r.policy_id))
        .collect();
    policy_ids.sort_unstable();
    policy_ids.dedup();
    let policies = policy::find_by_ids(db, &policy_ids).await?;

    Ok(assemble(&hits, &rules, &policies))
}

/// Collapses repeated keys to their best similarity, keeping first-seen order.
pub fn dedup(hits: Vec<Hit>) -> Vec<Hit> {
    let mut position: HashMap<(ContentType, Id), usize> = HashMap::new();
    let mut unique: Vec<Hit> = Vec::with_capacity(hits.len());

    for hit in hits {
        match position.get(&(hit.content_type, hit.content_id)) {
            Some(&index) => {
                let kept = &mut unique[index];
                kept.similarity = kept.similarity.max(hit.similarity);
            }
            None => {
                position.insert((hit.content_type, hit.content_id), unique.len());
                unique.push(hit);
            }
        }
    }
    unique
}

/// Groups resolved hits under their policies, best policy first.
///
/// Hits whose record is missing from `rules` or `policies` are dropped.
pub fn assemble(
    hits: &[Hit],
    rules: &HashMap<Id, policy_rules::Model>,
    policies: &HashMap<Id, policies::Model>,
) -> Vec<PolicyWithRules> {
    let mut order: Vec<Id> = Vec::new();
    let mut by_policy: HashMap<Id, PolicyWithRules> = HashMap::new();

    for hit in hits {
        let (policy_id, rule) = match hit.content_type {
            ContentType::Policy => (hit.content_id, None),
            ContentType::Rule => match rules.get(&hit.content_id) {
                Some(rule) => (rule.policy_id, Some(rule)),
                None => {
                    warn!("Dropping hit for rule {}, which no longer exists", hit.content_id);
                    continue;
                }
            },
        };

        let Some(policy) = policies.get(&policy_id) else {
            warn!(
                "Dropping {} {} hit, policy {policy_id} no longer exists",
                hit.content_type, hit.content_id
            );
            continue;
        };

        let entry = by_policy.entry(policy_id).or_insert_with(|| {
            order.push(policy_id);
            PolicyWithRules::new(policy.clone(), Vec::new())
        });
        entry.similarity = Some(
            entry
                .similarity
                .map_or(hit.similarity, |s| s.max(hit.similarity)),
        );
        if let Some(rule) = rule {
            entry.rules.push(ScoredRule {
                rule: rule.clone(),
                similarity: Some(hit.similarity),
            });
        }
    }

    let mut assembled: Vec<PolicyWithRules> = order
        .into_iter()
        .filter_map(|id| by_policy.remove(&id))
        .collect();
    assembled.sort_by(|a, b| {
        b.similarity
            .unwrap_or_default()
            .total_cmp(&a.similarity.unwrap_or_default())
    });
    assembled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{BagOfWords, DIMENSIONS};
    use entity::ownership::EntityKind;
    use entity::policy_type::PolicyType;
    use entity_api::soft_delete::soft_delete;
    use entity_api::test_db::{self, fixtures};

    const QUERY: &str = "When are invoices due?";

    fn embedder() -> BagOfWords {
        BagOfWords::new().with_fixed(QUERY, at(1.0))
    }

    /// A vector whose cosine similarity to the query vector is `similarity`.
    fn at(similarity: f32) -> Vec<f32> {
        let mut vector = vec![0.0; DIMENSIONS];
        vector[0] = similarity;
        vector[1] = (1.0 - similarity * similarity).sqrt();
        vector
    }

    fn close(actual: Option<f64>, expected: f64) -> bool {
        actual.is_some_and(|a| (a - expected).abs() < 1e-5)
    }

    #[tokio::test]
    async fn policies_rank_by_their_best_rule() -> Result<(), Error> {
        let db = test_db::connect().await?;
        let a = fixtures::policy(&db, "Payments", None).await;
        let b = fixtures::policy(&db, "Termination", None).await;
        let r1 = fixtures::rule(&db, a.id, "Invoices are due in 30 days").await;
        let r2 = fixtures::rule(&db, a.id, "Late fees are capped").await;
        let r3 = fixtures::rule(&db, b.id, "Notice period is 90 days").await;
        fixtures::embedding(&db, ContentType::Rule, r1.id, at(0.9)).await;
        fixtures::embedding(&db, ContentType::Rule, r2.id, at(0.4)).await;
        fixtures::embedding(&db, ContentType::Rule, r3.id, at(0.6)).await;

        let found = search(&db, &embedder(), QUERY, 10).await?;

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].policy.id, a.id);
        assert!(close(found[0].similarity, 0.9));
        let rules: Vec<Id> = found[0].rules.iter().map(|r| r.rule.id).collect();
        assert_eq!(rules, vec![r1.id, r2.id]);
        assert!(close(found[0].rules[0].similarity, 0.9));
        assert!(close(found[0].rules[1].similarity, 0.4));
        assert_eq!(found[1].policy.id, b.id);
        assert!(close(found[1].similarity, 0.6));
        Ok(())
    }

    #[tokio::test]
    async fn direct_policy_hits_never_lower_the_score() -> Result<(), Error> {
        let db = test_db::connect().await?;
        let p = fixtures::policy(&db, "Payments", None).await;
        let q = fixtures::policy(&db, "Privacy", None).await;
        let rule = fixtures::rule(&db, p.id, "Invoices are due in 30 days").await;
        let orphan = fixtures::rule(&db, q.id, "Data stays in the EU").await;
        fixtures::embedding(&db, ContentType::Policy, p.id, at(0.5)).await;
        fixtures::embedding(&db, ContentType::Rule, rule.id, at(0.8)).await;
        fixtures::embedding(&db, ContentType::Policy, q.id, at(0.7)).await;
        fixtures::embedding(&db, ContentType::Rule, orphan.id, at(0.95)).await;
        // Leaves the rule's embedding live, as an out-of-date index would.
        soft_delete(&db, EntityKind::PolicyRule, orphan.id, false).await?;

        let found = search(&db, &embedder(), QUERY, 10).await?;

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].policy.id, p.id);
        assert!(close(found[0].similarity, 0.8));
        assert_eq!(found[0].rules.len(), 1);
        assert_eq!(found[1].policy.id, q.id);
        assert!(close(found[1].similarity, 0.7));
        assert!(found[1].rules.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn search_without_embeddings_is_empty() -> Result<(), Error> {
        let db = test_db::connect().await?;
        fixtures::policy(&db, "Payments", None).await;

        assert!(search(&db, &embedder(), QUERY, 10).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn company_search_keeps_only_usable_policies() -> Result<(), Error> {
        let db = test_db::connect().await?;
        let acme = fixtures::company(&db, "Acme").await;
        let globex = fixtures::company(&db, "Globex").await;
        let own = fixtures::policy(&db, "Acme payments", Some(acme.id)).await;
        let foreign = fixtures::policy(&db, "Globex payments", Some(globex.id)).await;
        let shared =
            fixtures::policy_of_type(&db, "Industry", PolicyType::Industry, None, true).await;
        let inactive =
            fixtures::policy_of_type(&db, "Retired", PolicyType::Standard, None, false).await;
        fixtures::embedding(&db, ContentType::Policy, own.id, at(0.5)).await;
        fixtures::embedding(&db, ContentType::Policy, foreign.id, at(0.99)).await;
        fixtures::embedding(&db, ContentType::Policy, shared.id, at(0.6)).await;
        fixtures::embedding(&db, ContentType::Policy, inactive.id, at(0.9)).await;

        let found = search_for_company(&db, &embedder(), Some(acme.id), QUERY, 10).await?;

        let ids: Vec<Id> = found.iter().map(|p| p.policy.id).collect();
        assert_eq!(ids, vec![shared.id, own.id]);
        Ok(())
    }

    #[tokio::test]
    async fn foreign_hits_never_crowd_out_company_policies() -> Result<(), Error> {
        let db = test_db::connect().await?;
        let acme = fixtures::company(&db, "Acme").await;
        let globex = fixtures::company(&db, "Globex").await;
        let own = fixtures::policy(&db, "Acme payments", Some(acme.id)).await;
        let own_rule = fixtures::rule(&db, own.id, "Invoices are due in 30 days").await;
        let foreign = fixtures::policy(&db, "Globex payments", Some(globex.id)).await;
        let foreign_rule = fixtures::rule(&db, foreign.id, "Invoices are due in 10 days").await;
        let inactive =
            fixtures::policy_of_type(&db, "Retired", PolicyType::Standard, None, false).await;
        let inactive_rule = fixtures::rule(&db, inactive.id, "Invoices are due on receipt").await;
        fixtures::embedding(&db, ContentType::Policy, own.id, at(0.5)).await;
        fixtures::embedding(&db, ContentType::Rule, own_rule.id, at(0.4)).await;
        fixtures::embedding(&db, ContentType::Policy, foreign.id, at(0.99)).await;
        fixtures::embedding(&db, ContentType::Rule, foreign_rule.id, at(0.98)).await;
        fixtures::embedding(&db, ContentType::Rule, inactive_rule.id, at(0.97)).await;

        let found = search_for_company(&db, &embedder(), Some(acme.id), QUERY, 1).await?;

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].policy.id, own.id);
        assert!(close(found[0].similarity, 0.5));

        let found = search_for_company(&db, &embedder(), Some(acme.id), QUERY, 2).await?;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].rules.len(), 1);
        assert_eq!(found[0].rules[0].rule.id, own_rule.id);
        Ok(())
    }

    #[tokio::test]
    async fn search_without_a_company_uses_shared_policies_only() -> Result<(), Error> {
        let db = test_db::connect().await?;
        let acme = fixtures::company(&db, "Acme").await;
        let own = fixtures::policy(&db, "Acme payments", Some(acme.id)).await;
        let shared =
            fixtures::policy_of_type(&db, "Industry", PolicyType::Industry, None, true).await;
        fixtures::embedding(&db, ContentType::Policy, own.id, at(0.99)).await;
        fixtures::embedding(&db, ContentType::Policy, shared.id, at(0.3)).await;

        let found = search_for_company(&db, &embedder(), None, QUERY, 1).await?;

        let ids: Vec<Id> = found.iter().map(|p| p.policy.id).collect();
        assert_eq!(ids, vec![shared.id]);
        Ok(())
    }

    #[test]
    fn dedup_keeps_the_best_similarity() {
        let hit = |content_type, content_id, similarity| Hit {
            content_type,
            content_id,
            similarity,
        };

        let unique = dedup(vec![
            hit(ContentType::Rule, 1, 0.3),
            hit(ContentType::Policy, 1, 0.5),
            hit(ContentType::Rule, 1, 0.7),
        ]);

        assert_eq!(
            unique,
            vec![hit(ContentType::Rule, 1, 0.7), hit(ContentType::Policy, 1, 0.5)]
        );
    }
}
