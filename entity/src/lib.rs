pub mod prelude;

// Tenancy
pub mod companies;
pub mod users;

// Documents and their analysis
pub mod analysis_results;
pub mod conversations;
pub mod documents;
pub mod message_author;
pub mod messages;

// Policies, rules and their semantic index
pub mod checklists;
pub mod content_type;
pub mod embeddings;
pub mod keywords;
pub mod policies;
pub mod policy_rules;
pub mod policy_type;
pub mod rule_type;
pub mod ruleset;
pub mod severity;
pub mod vector;

pub mod ownership;

/// A type alias that represents any Entity's internal id field data type.
/// Aliased so that it's easy to change the underlying type if necessary.
pub type Id = i32;
