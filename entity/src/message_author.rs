use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Who wrote a conversation message: the person reviewing the document or
/// the assistant answering them.
#[derive(
    Debug, Clone, Copy, Eq, PartialEq, EnumIter, Deserialize, Default, Serialize, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum MessageAuthor {
    #[sea_orm(string_value = "User")]
    #[default]
    User,
    #[sea_orm(string_value = "LegalCheck")]
    LegalCheck,
}

impl std::fmt::Display for MessageAuthor {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageAuthor::User => write!(fmt, "User"),
            MessageAuthor::LegalCheck => write!(fmt, "LegalCheck"),
        }
    }
}
