use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// System-vs-counted comparison for one stock record within an audit.
/// `system_quantity` is snapshotted at count time.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_audit_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub audit_id: Uuid,
    pub stock_record_id: Uuid,
    pub system_quantity: i32,
    pub counted_quantity: i32,
    pub notes: Option<String>,
    pub counted_at: DateTime<Utc>,
}

impl Model {
    /// Positive when the shelf holds more than the system thinks.
    pub fn difference(&self) -> i32 {
        self.counted_quantity - self.system_quantity
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stock_audit::Entity",
        from = "Column::AuditId",
        to = "super::stock_audit::Column::Id"
    )]
    Audit,
}

impl Related<super::stock_audit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Audit.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
