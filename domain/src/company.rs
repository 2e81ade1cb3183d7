use crate::embedding_index::{self, EmbeddingSource};
use crate::error::Error;
use crate::{companies, lifecycle, users, Id};
use entity::ownership::EntityKind;
use entity_api::{company, policy, policy_rule, soft_delete};
use log::*;
use review_ai::traits::embedding::Provider;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use uuid::Uuid;

pub use entity_api::company::find_by_invite_code;

/// Creates a company. A company without an invite code gets a fresh one.
pub async fn create(
    db: &DatabaseConnection,
    actor: &users::Model,
    mut company_model: companies::Model,
) -> Result<companies::Model, Error> {
    ensure_superuser(actor)?;

    if company_model.invite_code.is_none() {
        company_model.invite_code = Some(Uuid::new_v4().simple().to_string());
    }
    let created = company::create(db, company_model).await?;
    info!("Created company {} ({})", created.id, created.name);
    Ok(created)
}

/// Members see their own company, superusers every company.
pub async fn find(
    db: &DatabaseConnection,
    actor: &users::Model,
    id: Id,
) -> Result<companies::Model, Error> {
    if !actor.is_superuser && actor.company_id != Some(id) {
        return Err(Error::not_found());
    }
    Ok(company::find_by_id(db, id).await?)
}

pub async fn list(
    db: &DatabaseConnection,
    actor: &users::Model,
    offset: u64,
    limit: u64,
) -> Result<Vec<companies::Model>, Error> {
    ensure_superuser(actor)?;
    Ok(company::find_all(db, offset, limit).await?)
}

/// Replaces the descriptive fields. The invite code is kept.
pub async fn update(
    db: &DatabaseConnection,
    actor: &users::Model,
    id: Id,
    company_model: companies::Model,
) -> Result<companies::Model, Error> {
    ensure_superuser(actor)?;
    Ok(company::update(db, id, company_model).await?)
}

/// Soft-deletes the company with everything it owns.
pub async fn delete(db: &DatabaseConnection, actor: &users::Model, id: Id) -> Result<u64, Error> {
    ensure_superuser(actor)?;
    lifecycle::soft_delete(db, EntityKind::Company, id, true).await
}

/// Restores a deleted company, and everything it owns with `restore_children`.
///
/// Embeddings stay deleted through a restore, so the company's live policies
/// and their rules are embedded again.
pub async fn restore(
    db: &DatabaseConnection,
    embedder: Arc<dyn Provider>,
    actor: &users::Model,
    id: Id,
    restore_children: bool,
) -> Result<companies::Model, Error> {
    ensure_superuser(actor)?;
    soft_delete::find_any_by_id::<companies::Entity, _>(db, id).await?;

    lifecycle::restore(db, EntityKind::Company, id, true, restore_children).await?;
    if restore_children {
        reembed_policies(db, embedder, id).await?;
    }
    Ok(company::find_by_id(db, id).await?)
}

async fn reembed_policies(
    db: &DatabaseConnection,
    embedder: Arc<dyn Provider>,
    company_id: Id,
) -> Result<(), Error> {
    let policies = policy::find_by_company(db, company_id).await?;
    let policy_ids: Vec<Id> = policies.iter().map(|p| p.id).collect();
    let rules = policy_rule::find_by_policies(db, &policy_ids).await?;
    info!(
        "Re-embedding {} policies and {} rules of restored company {company_id}",
        policies.len(),
        rules.values().map(Vec::len).sum::<usize>()
    );

    let sources = policies
        .into_iter()
        .map(EmbeddingSource::Policy)
        .chain(rules.into_values().flatten().map(EmbeddingSource::Rule));
    for source in sources {
        embedding_index::schedule_upsert(db.clone(), Arc::clone(&embedder), source);
    }
    Ok(())
}

fn ensure_superuser(actor: &users::Model) -> Result<(), Error> {
    if actor.is_superuser {
        Ok(())
    } else {
        Err(Error::forbidden("Only superusers can manage companies"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Classification;
    use chrono::Utc;
    use crate::fakes::{wait_for_embedding, BagOfWords};
    use crate::semantic_search;
    use entity::content_type::ContentType;
    use entity_api::test_db::{self, fixtures};
    use entity_api::{document, user};

    fn embedder() -> Arc<dyn Provider> {
        Arc::new(BagOfWords::new())
    }

    fn new_company(name: &str) -> companies::Model {
        let now = Utc::now();
        companies::Model {
            id: 0,
            name: name.to_string(),
            registration_number: None,
            country: Some("NL".to_string()),
            address: None,
            invite_code: None,
            is_deleted: false,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    #[tokio::test]
    async fn create_generates_an_invite_code() -> Result<(), Error> {
        let db = test_db::connect().await?;
        let mut root = fixtures::user(&db, None, "root@legalcheck.test").await;

        let refused = create(&db, &root, new_company("Acme")).await.unwrap_err();
        assert_eq!(refused.classification(), Classification::Forbidden);

        root.is_superuser = true;
        let acme = create(&db, &root, new_company("Acme")).await?;
        let globex = create(&db, &root, new_company("Globex")).await?;

        let code = acme.invite_code.clone().unwrap();
        assert_eq!(code.len(), 32);
        assert_ne!(acme.invite_code, globex.invite_code);
        assert_eq!(find_by_invite_code(&db, &code).await?.id, acme.id);
        Ok(())
    }

    #[tokio::test]
    async fn members_see_only_their_company() -> Result<(), Error> {
        let db = test_db::connect().await?;
        let acme = fixtures::company(&db, "Acme").await;
        let globex = fixtures::company(&db, "Globex").await;
        let ann = fixtures::user(&db, Some(acme.id), "ann@acme.test").await;

        assert_eq!(find(&db, &ann, acme.id).await?.id, acme.id);
        assert!(find(&db, &ann, globex.id).await.is_err());
        assert!(list(&db, &ann, 0, 10).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn delete_and_restore_the_tenant() -> Result<(), Error> {
        let db = test_db::connect().await?;
        let acme = fixtures::company(&db, "Acme").await;
        let ann = fixtures::user(&db, Some(acme.id), "ann@acme.test").await;
        let contract = fixtures::document(&db, Some(acme.id)).await;
        let mut root = fixtures::user(&db, None, "root@legalcheck.test").await;
        root.is_superuser = true;

        assert_eq!(delete(&db, &root, acme.id).await?, 3);
        assert!(user::find_by_id(&db, ann.id).await.is_err());

        restore(&db, embedder(), &root, acme.id, false).await?;
        assert!(document::find_by_id(&db, contract.id).await.is_err());

        delete(&db, &root, acme.id).await?;
        restore(&db, embedder(), &root, acme.id, true).await?;
        assert!(user::find_by_id(&db, ann.id).await.is_ok());
        assert!(document::find_by_id(&db, contract.id).await.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn restored_tenant_policies_are_searchable_again() -> Result<(), Error> {
        let db = test_db::connect().await?;
        let acme = fixtures::company(&db, "Acme").await;
        let payments = fixtures::policy(&db, "Payments", Some(acme.id)).await;
        let rule = fixtures::rule(&db, payments.id, "Invoices are due in 30 days").await;
        let mut root = fixtures::user(&db, None, "root@legalcheck.test").await;
        root.is_superuser = true;
        let embedder = embedder();
        embedding_index::upsert(&db, embedder.as_ref(), &EmbeddingSource::Policy(payments.clone()))
            .await?;
        embedding_index::upsert(&db, embedder.as_ref(), &EmbeddingSource::Rule(rule.clone()))
            .await?;

        delete(&db, &root, acme.id).await?;
        assert!(
            semantic_search::search(&db, embedder.as_ref(), "invoices due", 10)
                .await?
                .is_empty()
        );

        restore(&db, Arc::clone(&embedder), &root, acme.id, true).await?;
        assert!(wait_for_embedding(&db, ContentType::Policy, payments.id, |_| true)
            .await
            .is_some());
        assert!(wait_for_embedding(&db, ContentType::Rule, rule.id, |_| true)
            .await
            .is_some());

        let found = semantic_search::search(&db, embedder.as_ref(), "invoices due", 10).await?;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].policy.id, payments.id);
        assert_eq!(found[0].rules.len(), 1);
        assert_eq!(found[0].rules[0].rule.id, rule.id);
        Ok(())
    }
}
