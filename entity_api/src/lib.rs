//! Data access for the review backend.
//!
//! Every read goes through [`soft_delete::filtered_query`], so soft-deleted
//! rows are invisible unless a function says otherwise.

pub use entity::{
    analysis_results, checklists, companies, content_type, conversations, documents, embeddings,
    keywords, message_author, messages, ownership, policies, policy_rules, policy_type,
    rule_type, ruleset, severity, users, vector, Id,
};

pub mod analysis_result;
pub mod checklist;
pub mod company;
pub mod conversation;
pub mod document;
pub mod embedding;
pub mod error;
pub mod message;
pub mod mutate;
pub mod policy;
pub mod policy_rule;
pub mod soft_delete;
pub mod user;

#[cfg(any(test, feature = "test-db"))]
pub mod test_db;

use chrono::Utc;
use keywords::Keywords;
use policy_type::PolicyType;
use rule_type::RuleType;
use ruleset::Ruleset;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use severity::Severity;

/// Demo tenant: one company with an invite code, a superuser, two members,
/// a company policy and a shared standard with rules, and a checklist.
pub async fn seed_database(db: &DatabaseConnection) {
    let now = Utc::now();

    let acme = companies::ActiveModel {
        name: Set("Acme Trading Ltd".to_owned()),
        registration_number: Set(Some("HRB 104233".to_owned())),
        country: Set(Some("DE".to_owned())),
        address: Set(Some("Hafenstrasse 12, Hamburg".to_owned())),
        invite_code: Set(Some("acme-demo-invite".to_owned())),
        is_deleted: Set(false),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap();

    for (email, first_name, last_name, company_id, is_superuser) in [
        ("admin@legalcheck.dev", "Admin", "User", None, true),
        ("anna.weber@acme.dev", "Anna", "Weber", Some(acme.id), false),
        ("tom.fischer@acme.dev", "Tom", "Fischer", Some(acme.id), false),
    ] {
        users::ActiveModel {
            company_id: Set(company_id),
            email: Set(email.to_owned()),
            first_name: Set(first_name.to_owned()),
            last_name: Set(last_name.to_owned()),
            is_superuser: Set(is_superuser),
            is_active: Set(true),
            is_deleted: Set(false),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();
    }

    let payments = policies::ActiveModel {
        name: Set("Payment Terms".to_owned()),
        description: Set(Some(
            "Customer contracts must be paid within 30 days of invoice.".to_owned(),
        )),
        policy_type: Set(PolicyType::Company),
        source_url: Set(None),
        is_active: Set(true),
        company_id: Set(Some(acme.id)),
        is_deleted: Set(false),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap();

    let gdpr = policies::ActiveModel {
        name: Set("GDPR".to_owned()),
        description: Set(Some(
            "Processing of personal data of EU residents.".to_owned(),
        )),
        policy_type: Set(PolicyType::Standard),
        source_url: Set(Some("https://eur-lex.europa.eu/eli/reg/2016/679/oj".to_owned())),
        is_active: Set(true),
        company_id: Set(None),
        is_deleted: Set(false),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap();

    let mut rule_ids = Vec::new();
    for (policy_id, rule_type, severity, description, keywords) in [
        (
            payments.id,
            RuleType::Conflict,
            Severity::High,
            "Payment terms longer than 30 days conflict with company policy.",
            vec!["payment", "net 30", "invoice"],
        ),
        (
            payments.id,
            RuleType::Requirement,
            Severity::Medium,
            "Late payments must carry interest or a penalty.",
            vec!["late fee", "interest", "penalty"],
        ),
        (
            gdpr.id,
            RuleType::Requirement,
            Severity::High,
            "A data processing agreement is required when personal data is shared.",
            vec!["personal data", "processor", "dpa"],
        ),
        (
            gdpr.id,
            RuleType::Risk,
            Severity::Medium,
            "Transfers of personal data outside the EU need safeguards.",
            vec!["transfer", "third country", "scc"],
        ),
    ] {
        let rule = policy_rules::ActiveModel {
            policy_id: Set(policy_id),
            rule_type: Set(rule_type),
            description: Set(Some(description.to_owned())),
            severity: Set(severity),
            keywords: Set(Keywords::new(keywords)),
            is_deleted: Set(false),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();
        rule_ids.push(rule.id);
    }

    checklists::ActiveModel {
        name: Set("Supplier contract review".to_owned()),
        user_id: Set(None),
        company_id: Set(Some(acme.id)),
        ruleset: Set(Ruleset::new(rule_ids)),
        is_deleted: Set(false),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap();
}
