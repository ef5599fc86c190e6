use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of physical stock change recorded by a movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementType {
    In,
    Out,
    Adjustment,
    Return,
    Damaged,
    Transfer,
    CorrectionIn,
    CorrectionOut,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "in",
            MovementType::Out => "out",
            MovementType::Adjustment => "adjustment",
            MovementType::Return => "return",
            MovementType::Damaged => "damaged",
            MovementType::Transfer => "transfer",
            MovementType::CorrectionIn => "correction_in",
            MovementType::CorrectionOut => "correction_out",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "in" => Some(MovementType::In),
            "out" => Some(MovementType::Out),
            "adjustment" => Some(MovementType::Adjustment),
            "return" => Some(MovementType::Return),
            "damaged" => Some(MovementType::Damaged),
            "transfer" => Some(MovementType::Transfer),
            "correction_in" => Some(MovementType::CorrectionIn),
            "correction_out" => Some(MovementType::CorrectionOut),
            _ => None,
        }
    }

    /// Audit-driven corrections adjust `quantity` while leaving `reserved`
    /// untouched.
    pub fn is_correction(&self) -> bool {
        matches!(self, MovementType::CorrectionIn | MovementType::CorrectionOut)
    }
}

/// Immutable audit record of a change to a stock record's physical quantity.
/// Inserted in the same transaction as the quantity change; never updated.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub stock_record_id: Uuid,
    pub order_id: Option<Uuid>,
    pub movement_type: String,
    /// Signed delta applied to `quantity`.
    pub quantity: i32,
    pub quantity_before: i32,
    pub quantity_after: i32,
    pub unit_cost: Option<Decimal>,
    pub reference_type: Option<String>,
    pub reference_number: Option<String>,
    pub reason: Option<String>,
    pub actor_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stock_record::Entity",
        from = "Column::StockRecordId",
        to = "super::stock_record::Column::Id"
    )]
    StockRecord,
}

impl Related<super::stock_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockRecord.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
