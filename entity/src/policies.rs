//! SeaORM Entity for the policies table.
//! A policy groups the rules a document is reviewed against.

use crate::policy_type::PolicyType;
use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "policies")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key)]
    pub id: Id,

    pub name: String,

    #[sea_orm(column_type = "Text")]
    pub description: Option<String>,

    pub policy_type: PolicyType,

    pub source_url: Option<String>,

    #[serde(default)]
    pub is_active: bool,

    /// Owning company; only meaningful for company policies
    pub company_id: Option<Id>,

    #[serde(skip_deserializing)]
    pub is_deleted: bool,

    #[serde(skip_deserializing)]
    pub created_at: DateTimeWithTimeZone,

    #[serde(skip_deserializing)]
    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Whether a company may see this policy: its own policies plus every
    /// industry and standard policy.
    pub fn visible_to(&self, company_id: Id) -> bool {
        self.policy_type.is_shared()
            || (self.policy_type == PolicyType::Company && self.company_id == Some(company_id))
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::companies::Entity",
        from = "Column::CompanyId",
        to = "super::companies::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Companies,

    #[sea_orm(has_many = "super::policy_rules::Entity")]
    PolicyRules,
}

impl Related<super::companies::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Companies.def()
    }
}

impl Related<super::policy_rules::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PolicyRules.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
