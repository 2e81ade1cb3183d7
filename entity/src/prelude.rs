pub use super::analysis_results::Entity as AnalysisResults;
pub use super::checklists::Entity as Checklists;
pub use super::companies::Entity as Companies;
pub use super::conversations::Entity as Conversations;
pub use super::documents::Entity as Documents;
pub use super::embeddings::Entity as Embeddings;
pub use super::messages::Entity as Messages;
pub use super::policies::Entity as Policies;
pub use super::policy_rules::Entity as PolicyRules;
pub use super::users::Entity as Users;
