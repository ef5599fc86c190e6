use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VendorTransactionType {
    EscrowRelease,
    RefundReversal,
    Adjustment,
    Withdrawal,
}

impl VendorTransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VendorTransactionType::EscrowRelease => "escrow_release",
            VendorTransactionType::RefundReversal => "refund_reversal",
            VendorTransactionType::Adjustment => "adjustment",
            VendorTransactionType::Withdrawal => "withdrawal",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "escrow_release" => Some(VendorTransactionType::EscrowRelease),
            "refund_reversal" => Some(VendorTransactionType::RefundReversal),
            "adjustment" => Some(VendorTransactionType::Adjustment),
            "withdrawal" => Some(VendorTransactionType::Withdrawal),
            _ => None,
        }
    }
}

/// Immutable wallet ledger entry. `balance_before`/`balance_after` make
/// every payout reconcilable without replaying history.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vendor_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub vendor_id: Uuid,
    pub order_id: Option<Uuid>,
    pub transaction_type: String,
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::vendor::Entity",
        from = "Column::VendorId",
        to = "super::vendor::Column::Id"
    )]
    Vendor,
}

impl Related<super::vendor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vendor.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
