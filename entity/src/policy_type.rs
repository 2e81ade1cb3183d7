use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Where a policy comes from. Company policies belong to a single company,
/// industry and standard policies are shared by every company.
#[derive(
    Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Deserialize, Default, Serialize, DeriveActiveEnum,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum PolicyType {
    #[sea_orm(string_value = "company")]
    #[default]
    Company,
    #[sea_orm(string_value = "industry")]
    Industry,
    #[sea_orm(string_value = "standard")]
    Standard,
}

impl PolicyType {
    /// Industry and standard policies are visible to every company.
    pub fn is_shared(&self) -> bool {
        matches!(self, PolicyType::Industry | PolicyType::Standard)
    }
}

impl std::fmt::Display for PolicyType {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyType::Company => write!(fmt, "company"),
            PolicyType::Industry => write!(fmt, "industry"),
            PolicyType::Standard => write!(fmt, "standard"),
        }
    }
}
