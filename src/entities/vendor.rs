use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Marketplace vendor with default commission terms and a wallet.
///
/// `wallet_balance` and `pending_balance` are mutated only through
/// settlement, always paired with a `vendor_transactions` row, and never go
/// negative.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vendors")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub commission_rate: Decimal,
    pub commission_fixed: Decimal,
    pub wallet_balance: Decimal,
    pub pending_balance: Decimal,
    pub escrow_hold_days: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::vendor_transaction::Entity")]
    Transactions,
}

impl Related<super::vendor_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
