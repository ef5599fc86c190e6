use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Membership of a product in a flash sale, with an optional per-product
/// discount override and quantity caps.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "flash_sale_products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub flash_sale_id: Uuid,
    pub product_id: Uuid,
    pub discount_value: Option<Decimal>,
    pub quantity_limit: Option<i32>,
    pub sold_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::flash_sale::Entity",
        from = "Column::FlashSaleId",
        to = "super::flash_sale::Column::Id"
    )]
    FlashSale,
}

impl Related<super::flash_sale::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FlashSale.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
