//! SeaORM Entity for the companies table.
//! A company is the tenant that owns documents, policies, checklists and users.

use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "companies")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key)]
    pub id: Id,

    pub name: String,

    pub registration_number: Option<String>,

    pub country: Option<String>,

    pub address: Option<String>,

    /// Code new users present to join this company
    #[sea_orm(unique)]
    pub invite_code: Option<String>,

    #[serde(skip_deserializing)]
    pub is_deleted: bool,

    #[serde(skip_deserializing)]
    pub created_at: DateTimeWithTimeZone,

    #[serde(skip_deserializing)]
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::checklists::Entity")]
    Checklists,

    #[sea_orm(has_many = "super::documents::Entity")]
    Documents,

    #[sea_orm(has_many = "super::policies::Entity")]
    Policies,

    #[sea_orm(has_many = "super::users::Entity")]
    Users,
}

impl Related<super::checklists::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Checklists.def()
    }
}

impl Related<super::documents::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Documents.def()
    }
}

impl Related<super::policies::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Policies.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
