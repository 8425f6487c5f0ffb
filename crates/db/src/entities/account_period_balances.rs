//! `SeaORM` Entity for account_period_balances table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "account_period_balances")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub company_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub account_no: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub fiscal_year: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub fiscal_month: i32,
    pub account_title: String,
    pub normal_balance: String,
    #[sea_orm(column_type = "Decimal(Some((18, 4)))")]
    pub beginning_balance: Decimal,
    #[sea_orm(column_type = "Decimal(Some((18, 4)))")]
    pub debit_total: Decimal,
    #[sea_orm(column_type = "Decimal(Some((18, 4)))")]
    pub credit_total: Decimal,
    #[sea_orm(column_type = "Decimal(Some((18, 4)))")]
    pub ending_balance: Decimal,
    pub is_closed: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
