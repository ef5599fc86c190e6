use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a discount source reduces a price. Shared by promo codes, flash
/// sales and bulk tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscountType {
    Percentage,
    Fixed,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "percentage",
            DiscountType::Fixed => "fixed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "percentage" => Some(DiscountType::Percentage),
            "fixed" => Some(DiscountType::Fixed),
            _ => None,
        }
    }
}

/// A redeemable discount code.
///
/// Applicability lists are JSON arrays of UUIDs (categories, products,
/// vendors) or segment names; an absent list means no restriction.
/// `current_usage_count` is only ever mutated by an atomic increment at
/// order confirmation, never read-modify-write in application memory.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "promo_codes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub vendor_id: Option<Uuid>,
    #[sea_orm(unique)]
    pub code: String,
    pub discount_type: String,
    pub discount_value: Decimal,
    pub max_discount_amount: Option<Decimal>,
    pub min_order_amount: Option<Decimal>,
    pub min_items_count: Option<i32>,
    pub applicable_categories: Option<Json>,
    pub applicable_products: Option<Json>,
    pub applicable_vendors: Option<Json>,
    pub applicable_segments: Option<Json>,
    pub usage_limit: Option<i32>,
    pub usage_limit_per_user: Option<i32>,
    pub current_usage_count: i32,
    pub can_stack_with_other_promos: bool,
    pub can_stack_with_sales: bool,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::promo_code_usage::Entity")]
    Usage,
}

impl Related<super::promo_code_usage::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Usage.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
