use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stock level status derived from the live quantities at query time.
///
/// Never persisted: storing it alongside `quantity`/`reserved` would let the
/// flag drift from the numbers it summarizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
}

/// Per-(product, variant, warehouse) stock record.
///
/// `quantity` is physical stock on hand, `reserved` the portion held by
/// active reservations. Only the reservation manager and movement
/// application mutate these columns.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub warehouse_id: Uuid,
    pub quantity: i32,
    pub reserved: i32,
    pub reorder_point: i32,
    pub min_quantity: i32,
    pub max_quantity: Option<i32>,
    pub average_cost: Option<Decimal>,
    pub last_restocked_at: Option<DateTime<Utc>>,
    pub last_sold_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    /// Units available for new reservations. Kept derived so the
    /// `available = quantity - reserved` invariant cannot drift.
    pub fn available(&self) -> i32 {
        self.quantity - self.reserved
    }

    pub fn status(&self) -> StockStatus {
        let available = self.available();
        if available <= 0 {
            StockStatus::OutOfStock
        } else if available <= self.reorder_point {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::stock_reservation::Entity")]
    Reservations,
    #[sea_orm(has_many = "super::stock_movement::Entity")]
    Movements,
}

impl Related<super::stock_reservation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reservations.def()
    }
}

impl Related<super::stock_movement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Movements.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
