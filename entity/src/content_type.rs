use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// The kind of record an embedding was computed from.
#[derive(
    Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Deserialize, Serialize, DeriveActiveEnum,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum ContentType {
    #[sea_orm(string_value = "policy")]
    Policy,
    #[sea_orm(string_value = "rule")]
    Rule,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Policy => "policy",
            ContentType::Rule => "rule",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(fmt, "{}", self.as_str())
    }
}
