use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Deserialize, Default, Serialize, DeriveActiveEnum,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum RuleType {
    #[sea_orm(string_value = "conflict")]
    Conflict,
    #[sea_orm(string_value = "risk")]
    Risk,
    #[sea_orm(string_value = "requirement")]
    #[default]
    Requirement,
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleType::Conflict => write!(fmt, "conflict"),
            RuleType::Risk => write!(fmt, "risk"),
            RuleType::Requirement => write!(fmt, "requirement"),
        }
    }
}
