use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One quantity tier of a bulk discount. Tiers are stored as a JSON array
/// on the parent row; the tier whose `min_quantity` is the highest one not
/// exceeding the ordered quantity applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkTier {
    pub min_quantity: i32,
    pub discount_type: String,
    pub discount_value: Decimal,
}

/// Quantity-based discount scoped to a product, category or vendor.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bulk_discounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub vendor_id: Option<Uuid>,
    pub name: Option<String>,
    pub tiers: Json,
    pub applicable_segments: Option<Json>,
    pub is_active: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    /// Parses the JSON tier list, dropping malformed entries.
    pub fn parsed_tiers(&self) -> Vec<BulkTier> {
        serde_json::from_value::<Vec<BulkTier>>(self.tiers.clone()).unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
