//! In-memory SQLite database built from the entity definitions.
//!
//! Available to this crate's tests and, through the `test-db` feature, to
//! downstream crates that want to exercise real queries without Postgres.

use entity::{
    analysis_results, checklists, companies, conversations, documents, embeddings, messages,
    policies, policy_rules, users,
};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
};

/// Opens a fresh database with every table and the live-embedding index.
pub async fn connect() -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    // A second pooled connection would open a different, empty database.
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await?;

    let schema = Schema::new(db.get_database_backend());
    create_table(&db, &schema, companies::Entity).await?;
    create_table(&db, &schema, users::Entity).await?;
    create_table(&db, &schema, documents::Entity).await?;
    create_table(&db, &schema, policies::Entity).await?;
    create_table(&db, &schema, policy_rules::Entity).await?;
    create_table(&db, &schema, checklists::Entity).await?;
    create_table(&db, &schema, embeddings::Entity).await?;
    create_table(&db, &schema, analysis_results::Entity).await?;
    create_table(&db, &schema, conversations::Entity).await?;
    create_table(&db, &schema, messages::Entity).await?;

    db.execute_unprepared(
        "CREATE UNIQUE INDEX embeddings_live_content_key \
         ON embeddings (content_type, content_id) WHERE NOT is_deleted",
    )
    .await?;

    Ok(db)
}

async fn create_table<E: EntityTrait>(
    db: &DatabaseConnection,
    schema: &Schema,
    entity: E,
) -> Result<(), DbErr> {
    let stmt = schema.create_table_from_entity(entity);
    db.execute(db.get_database_backend().build(&stmt)).await?;
    Ok(())
}

/// Row builders for tests. They panic on failure.
pub mod fixtures {
    use chrono::Utc;
    use entity::content_type::ContentType;
    use entity::keywords::Keywords;
    use entity::message_author::MessageAuthor;
    use entity::policy_type::PolicyType;
    use entity::rule_type::RuleType;
    use entity::ruleset::Ruleset;
    use entity::severity::Severity;
    use entity::vector::Vector;
    use entity::{
        checklists, companies, conversations, documents, embeddings, messages, policies,
        policy_rules, users, Id,
    };
    use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

    pub async fn company(db: &DatabaseConnection, name: &str) -> companies::Model {
        let now = Utc::now();
        companies::ActiveModel {
            name: Set(name.to_owned()),
            registration_number: Set(None),
            country: Set(None),
            address: Set(None),
            invite_code: Set(None),
            is_deleted: Set(false),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    pub async fn user(db: &DatabaseConnection, company_id: Option<Id>, email: &str) -> users::Model {
        let now = Utc::now();
        users::ActiveModel {
            company_id: Set(company_id),
            email: Set(email.to_owned()),
            first_name: Set("Test".to_owned()),
            last_name: Set("User".to_owned()),
            is_superuser: Set(false),
            is_active: Set(true),
            is_deleted: Set(false),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    pub async fn document(db: &DatabaseConnection, company_id: Option<Id>) -> documents::Model {
        let now = Utc::now();
        documents::ActiveModel {
            filename: Set("contract.txt".to_owned()),
            content_type: Set("text/plain".to_owned()),
            file_path: Set("/tmp/contract.txt".to_owned()),
            text_content: Set(Some("The buyer pays within 30 days.".to_owned())),
            company_id: Set(company_id),
            is_processed: Set(false),
            external_name: Set(None),
            is_deleted: Set(false),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    pub async fn policy(
        db: &DatabaseConnection,
        name: &str,
        company_id: Option<Id>,
    ) -> policies::Model {
        let policy_type = if company_id.is_some() {
            PolicyType::Company
        } else {
            PolicyType::Standard
        };
        policy_of_type(db, name, policy_type, company_id, true).await
    }

    pub async fn policy_of_type(
        db: &DatabaseConnection,
        name: &str,
        policy_type: PolicyType,
        company_id: Option<Id>,
        is_active: bool,
    ) -> policies::Model {
        let now = Utc::now();
        policies::ActiveModel {
            name: Set(name.to_owned()),
            description: Set(Some(format!("{name} policy"))),
            policy_type: Set(policy_type),
            source_url: Set(None),
            is_active: Set(is_active),
            company_id: Set(company_id),
            is_deleted: Set(false),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    pub async fn rule(db: &DatabaseConnection, policy_id: Id, description: &str) -> policy_rules::Model {
        let now = Utc::now();
        policy_rules::ActiveModel {
            policy_id: Set(policy_id),
            rule_type: Set(RuleType::Requirement),
            description: Set(Some(description.to_owned())),
            severity: Set(Severity::Medium),
            keywords: Set(Keywords::default()),
            is_deleted: Set(false),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    pub async fn checklist(
        db: &DatabaseConnection,
        company_id: Option<Id>,
        user_id: Option<Id>,
        rule_ids: Vec<Id>,
    ) -> checklists::Model {
        let now = Utc::now();
        checklists::ActiveModel {
            name: Set("Review".to_owned()),
            user_id: Set(user_id),
            company_id: Set(company_id),
            ruleset: Set(Ruleset::new(rule_ids)),
            is_deleted: Set(false),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    pub async fn conversation(
        db: &DatabaseConnection,
        document_id: Id,
        user_id: Id,
    ) -> conversations::Model {
        let now = Utc::now();
        conversations::ActiveModel {
            document_id: Set(document_id),
            user_id: Set(user_id),
            title: Set(None),
            is_deleted: Set(false),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    pub async fn message(db: &DatabaseConnection, conversation_id: Id, content: &str) -> messages::Model {
        messages::ActiveModel {
            conversation_id: Set(conversation_id),
            content: Set(content.to_owned()),
            author: Set(MessageAuthor::User),
            is_deleted: Set(false),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    pub async fn embedding(
        db: &DatabaseConnection,
        content_type: ContentType,
        content_id: Id,
        values: Vec<f32>,
    ) -> embeddings::Model {
        let now = Utc::now();
        embeddings::ActiveModel {
            content_type: Set(content_type),
            content_id: Set(content_id),
            embedding: Set(Vector(values)),
            is_deleted: Set(false),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }
}
