//! `SeaORM` Entity for ledger_lines table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "ledger_lines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub company_id: String,
    pub line_date: Date,
    pub account_no: String,
    pub account_title: String,
    #[sea_orm(column_type = "Decimal(Some((18, 4)))")]
    pub debit: Decimal,
    #[sea_orm(column_type = "Decimal(Some((18, 4)))")]
    pub credit: Decimal,
    pub reference_document_id: Uuid,
    pub reference_no: String,
    pub document_type: String,
    pub description: String,
    pub sub_account_type: Option<String>,
    pub sub_account_id: Option<String>,
    pub sub_account_name: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::documents::Entity",
        from = "Column::ReferenceDocumentId",
        to = "super::documents::Column::Id"
    )]
    Documents,
}

impl Related<super::documents::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Documents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
