use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Tables in creation order; dropped in reverse.
const TABLES: [&str; 10] = [
    "companies",
    "users",
    "documents",
    "policies",
    "policy_rules",
    "checklists",
    "embeddings",
    "analysis_results",
    "conversations",
    "messages",
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(
            "CREATE TABLE IF NOT EXISTS companies (
                id SERIAL PRIMARY KEY,
                name VARCHAR NOT NULL,
                registration_number VARCHAR,
                country VARCHAR,
                address VARCHAR,
                invite_code VARCHAR UNIQUE,
                is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .await?;

        db.execute_unprepared(
            "CREATE TABLE IF NOT EXISTS users (
                id SERIAL PRIMARY KEY,
                company_id INTEGER REFERENCES companies(id) ON DELETE SET NULL,
                email VARCHAR NOT NULL UNIQUE,
                first_name VARCHAR NOT NULL,
                last_name VARCHAR NOT NULL,
                is_superuser BOOLEAN NOT NULL DEFAULT FALSE,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .await?;

        db.execute_unprepared(
            "CREATE TABLE IF NOT EXISTS documents (
                id SERIAL PRIMARY KEY,
                filename VARCHAR NOT NULL,
                content_type VARCHAR NOT NULL,
                file_path VARCHAR NOT NULL,
                text_content TEXT,
                company_id INTEGER REFERENCES companies(id) ON DELETE CASCADE,
                is_processed BOOLEAN NOT NULL DEFAULT FALSE,
                external_name VARCHAR,
                is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .await?;

        // policy_type is one of company, industry, standard
        db.execute_unprepared(
            "CREATE TABLE IF NOT EXISTS policies (
                id SERIAL PRIMARY KEY,
                name VARCHAR NOT NULL,
                description TEXT,
                policy_type VARCHAR NOT NULL DEFAULT 'company',
                source_url VARCHAR,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                company_id INTEGER REFERENCES companies(id) ON DELETE CASCADE,
                is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .await?;

        db.execute_unprepared(
            "CREATE TABLE IF NOT EXISTS policy_rules (
                id SERIAL PRIMARY KEY,
                policy_id INTEGER NOT NULL REFERENCES policies(id) ON DELETE CASCADE,
                rule_type VARCHAR NOT NULL DEFAULT 'requirement',
                description TEXT,
                severity VARCHAR NOT NULL DEFAULT 'medium',
                keywords JSON NOT NULL DEFAULT '[]',
                is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .await?;

        // ruleset holds policy rule ids without a foreign key
        db.execute_unprepared(
            "CREATE TABLE IF NOT EXISTS checklists (
                id SERIAL PRIMARY KEY,
                name VARCHAR NOT NULL,
                user_id INTEGER REFERENCES users(id) ON DELETE CASCADE,
                company_id INTEGER REFERENCES companies(id) ON DELETE CASCADE,
                ruleset JSON NOT NULL DEFAULT '[]',
                is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .await?;

        // content_id points at a policy or a rule depending on content_type
        db.execute_unprepared(
            "CREATE TABLE IF NOT EXISTS embeddings (
                id SERIAL PRIMARY KEY,
                content_type VARCHAR NOT NULL,
                content_id INTEGER NOT NULL,
                embedding JSON NOT NULL,
                is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .await?;

        db.execute_unprepared(
            "CREATE TABLE IF NOT EXISTS analysis_results (
                id SERIAL PRIMARY KEY,
                document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                checklist_id INTEGER REFERENCES checklists(id) ON DELETE SET NULL,
                title VARCHAR,
                company_name VARCHAR,
                conflicts JSON,
                risks JSON,
                missing_clauses JSON,
                suggestions JSON,
                payment_terms JSON,
                is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .await?;

        db.execute_unprepared(
            "CREATE TABLE IF NOT EXISTS conversations (
                id SERIAL PRIMARY KEY,
                document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title VARCHAR,
                is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .await?;

        db.execute_unprepared(
            "CREATE TABLE IF NOT EXISTS messages (
                id SERIAL PRIMARY KEY,
                conversation_id INTEGER NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                content TEXT NOT NULL,
                author VARCHAR NOT NULL DEFAULT 'User',
                is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .await?;

        // At most one live embedding per policy or rule
        db.execute_unprepared(
            "CREATE UNIQUE INDEX IF NOT EXISTS embeddings_live_content_key
            ON embeddings (content_type, content_id) WHERE NOT is_deleted",
        )
        .await?;

        // Child lookups made by the cascade and by the listing queries
        for (index, table, columns) in [
            ("users_company_id_idx", "users", "company_id"),
            ("documents_company_id_idx", "documents", "company_id"),
            ("policies_company_id_idx", "policies", "company_id"),
            ("policy_rules_policy_id_idx", "policy_rules", "policy_id"),
            ("checklists_company_id_idx", "checklists", "company_id"),
            ("checklists_user_id_idx", "checklists", "user_id"),
            ("analysis_results_document_id_idx", "analysis_results", "document_id"),
            (
                "conversations_document_user_idx",
                "conversations",
                "document_id, user_id",
            ),
            (
                "messages_conversation_created_idx",
                "messages",
                "conversation_id, created_at",
            ),
        ] {
            db.execute_unprepared(&format!(
                "CREATE INDEX IF NOT EXISTS {index} ON {table} ({columns})"
            ))
            .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Dropping the tables also drops their indexes and foreign keys
        for table in TABLES.iter().rev() {
            manager
                .get_connection()
                .execute_unprepared(&format!("DROP TABLE IF EXISTS {table}"))
                .await?;
        }

        Ok(())
    }
}
