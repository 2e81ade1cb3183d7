//! SeaORM Entity for the documents table.
//! Uploaded contracts and the text extracted from them.

use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "documents")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key)]
    pub id: Id,

    /// Name the file was uploaded with
    pub filename: String,

    /// MIME type reported at upload time
    pub content_type: String,

    /// Where the stored copy lives on disk
    pub file_path: String,

    /// Text extracted from the file, once extraction has finished
    #[sea_orm(column_type = "Text")]
    pub text_content: Option<String>,

    pub company_id: Option<Id>,

    /// Set once the document has been analyzed
    #[serde(skip_deserializing)]
    pub is_processed: bool,

    /// Name of the uploaded copy held by the analysis provider
    #[serde(skip_deserializing)]
    pub external_name: Option<String>,

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
        belongs_to = "super::companies::Entity",
        from = "Column::CompanyId",
        to = "super::companies::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Companies,

    #[sea_orm(has_many = "super::analysis_results::Entity")]
    AnalysisResults,

    #[sea_orm(has_many = "super::conversations::Entity")]
    Conversations,
}

impl Related<super::companies::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Companies.def()
    }
}

impl Related<super::analysis_results::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AnalysisResults.def()
    }
}

impl Related<super::conversations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Conversations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
