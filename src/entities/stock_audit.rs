use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditStatus {
    InProgress,
    Completed,
    Cancelled,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::InProgress => "in_progress",
            AuditStatus::Completed => "completed",
            AuditStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(AuditStatus::InProgress),
            "completed" => Some(AuditStatus::Completed),
            "cancelled" => Some(AuditStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditType {
    Full,
    Partial,
    CycleCount,
    SpotCheck,
}

impl AuditType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditType::Full => "full",
            AuditType::Partial => "partial",
            AuditType::CycleCount => "cycle_count",
            AuditType::SpotCheck => "spot_check",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "full" => Some(AuditType::Full),
            "partial" => Some(AuditType::Partial),
            "cycle_count" => Some(AuditType::CycleCount),
            "spot_check" => Some(AuditType::SpotCheck),
            _ => None,
        }
    }
}

/// A reconciliation pass over one warehouse. Discrepancies found by an audit
/// are flagged, never auto-corrected; resolution goes through explicit
/// correction movements so the ledger trail stays complete.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_audits")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub audit_number: String,
    pub warehouse_id: Uuid,
    pub status: String,
    pub audit_type: String,
    pub performed_by: Option<Uuid>,
    pub notes: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::stock_audit_item::Entity")]
    Items,
}

impl Related<super::stock_audit_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
