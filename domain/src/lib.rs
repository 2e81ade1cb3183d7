//! Review operations on top of `entity_api`.
//!
//! Entity models and the update helpers are re-exported so that consumers of the `domain` crate
//! do not need to depend on `entity_api` directly.
pub use entity_api::{
    mutate::{IntoUpdateMap, UpdateMap},
    policy::{PolicyWithRules, ScoredRule},
};

// Re-exports from `entity` crate via `entity_api`
pub use entity_api::{
    analysis_results, checklists, companies, content_type, conversations, documents, embeddings,
    keywords, message_author, messages, ownership, policies, policy_rules, policy_type, rule_type,
    ruleset, severity, users, Id,
};

pub mod analysis;
pub mod chat;
pub mod checklist;
pub mod company;
pub mod conversation;
pub mod document;
pub mod embedding_index;
pub mod error;
pub mod formatter;
pub mod lifecycle;
pub mod policy;
pub mod policy_rule;
pub mod semantic_search;
pub mod user;

pub mod gateway;

#[cfg(test)]
pub(crate) mod fakes;
