//! SeaORM Entity for the analysis_results table.
//! Each row is one structured review of a document; the finding lists are
//! stored as JSON.

use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "analysis_results")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key)]
    pub id: Id,

    pub document_id: Id,

    /// Checklist the document was reviewed against, if any
    pub checklist_id: Option<Id>,

    pub title: Option<String>,

    /// Counterparty named in the document
    pub company_name: Option<String>,

    pub conflicts: Option<Json>,

    pub risks: Option<Json>,

    pub missing_clauses: Option<Json>,

    pub suggestions: Option<Json>,

    pub payment_terms: Option<Json>,

    #[serde(skip_deserializing)]
    pub is_deleted: bool,

    #[serde(skip_deserializing)]
    pub created_at: DateTimeWithTimeZone,

    #[serde(skip_deserializing)]
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::documents::Entity",
        from = "Column::DocumentId",
        to = "super::documents::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Documents,
}

impl Related<super::documents::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Documents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
