//! `SeaORM` Entity for cost_layers table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "cost_layers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub company_id: String,
    pub product_code: String,
    pub entry_date: Date,
    pub sequence: i64,
    pub movement_kind: String,
    #[sea_orm(column_type = "Decimal(Some((18, 4)))")]
    pub quantity: Decimal,
    #[sea_orm(column_type = "Decimal(Some((18, 4)))", nullable)]
    pub purchase_cost: Option<Decimal>,
    pub source_document_id: Uuid,
    pub is_voided: bool,
    #[sea_orm(column_type = "Decimal(Some((18, 4)))")]
    pub unit_cost: Decimal,
    #[sea_orm(column_type = "Decimal(Some((18, 4)))")]
    pub total: Decimal,
    #[sea_orm(column_type = "Decimal(Some((18, 4)))")]
    pub running_balance: Decimal,
    #[sea_orm(column_type = "Decimal(Some((18, 4)))")]
    pub running_total: Decimal,
    #[sea_orm(column_type = "Decimal(Some((18, 4)))")]
    pub running_average_cost: Decimal,
    pub needs_review: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
