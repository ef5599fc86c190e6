//! Transfer & Audit Subsystem
//!
//! Moves stock between warehouses through the ledger and reconciles
//! counted against system quantities. Only a `completed` transfer touches
//! physical stock: the source decrement and destination increment land in
//! one transaction, each with its own movement row. Audits flag
//! discrepancies but never auto-correct; resolution is an explicit
//! correction movement so the ledger trail stays complete.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::with_retry;
use crate::entities::stock_audit::{self, AuditStatus, AuditType, Entity as StockAuditEntity};
use crate::entities::stock_audit_item::{self, Entity as StockAuditItemEntity};
use crate::entities::stock_movement::MovementType;
use crate::entities::stock_record::{self, Entity as StockRecordEntity};
use crate::entities::stock_transfer::{self, Entity as StockTransferEntity, TransferStatus};
use crate::entities::stock_transfer_item::{self, Entity as StockTransferItemEntity};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::inventory::{ApplyMovementRequest, InventoryService};

#[derive(Debug, Clone)]
pub struct TransferLine {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct CreateTransferRequest {
    pub from_warehouse_id: Uuid,
    pub to_warehouse_id: Uuid,
    pub lines: Vec<TransferLine>,
    pub requested_by: Option<Uuid>,
    pub notes: Option<String>,
}

/// Service for warehouse transfers and stock audits.
#[derive(Clone)]
pub struct TransferService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    inventory: InventoryService,
}

impl TransferService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        inventory: InventoryService,
    ) -> Self {
        Self {
            db,
            event_sender,
            inventory,
        }
    }

    /// Opens a `pending` transfer. No stock moves yet.
    #[instrument(skip(self, request), fields(from = %request.from_warehouse_id, to = %request.to_warehouse_id))]
    pub async fn create_transfer(
        &self,
        request: CreateTransferRequest,
    ) -> Result<(stock_transfer::Model, Vec<stock_transfer_item::Model>), ServiceError> {
        if request.from_warehouse_id == request.to_warehouse_id {
            return Err(ServiceError::ValidationError(
                "Transfer source and destination must differ".to_string(),
            ));
        }
        if request.lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "Transfer must contain at least one line".to_string(),
            ));
        }
        if request.lines.iter().any(|l| l.quantity <= 0) {
            return Err(ServiceError::ValidationError(
                "Transfer quantities must be positive".to_string(),
            ));
        }

        let now = Utc::now();
        let transfer_id = Uuid::new_v4();
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let transfer = stock_transfer::ActiveModel {
            id: Set(transfer_id),
            transfer_number: Set(format!(
                "TRF-{}",
                transfer_id.to_string()[..8].to_uppercase()
            )),
            from_warehouse_id: Set(request.from_warehouse_id),
            to_warehouse_id: Set(request.to_warehouse_id),
            status: Set(TransferStatus::Pending.as_str().to_string()),
            requested_by: Set(request.requested_by),
            notes: Set(request.notes),
            created_at: Set(now),
            updated_at: Set(Some(now)),
            shipped_at: Set(None),
            completed_at: Set(None),
            cancelled_at: Set(None),
        };
        let transfer = transfer.insert(&txn).await.map_err(ServiceError::db_error)?;

        let mut items = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            let item = stock_transfer_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                transfer_id: Set(transfer_id),
                product_id: Set(line.product_id),
                variant_id: Set(line.variant_id),
                requested_quantity: Set(line.quantity),
                transferred_quantity: Set(0),
                notes: Set(None),
            };
            items.push(item.insert(&txn).await.map_err(ServiceError::db_error)?);
        }

        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(transfer_id = %transfer_id, transfer_number = %transfer.transfer_number, "Transfer created");

        Ok((transfer, items))
    }

    /// `pending -> in_transit`.
    #[instrument(skip(self), fields(transfer_id = %transfer_id))]
    pub async fn ship_transfer(
        &self,
        transfer_id: Uuid,
    ) -> Result<stock_transfer::Model, ServiceError> {
        self.step_transfer(
            transfer_id,
            TransferStatus::Pending,
            TransferStatus::InTransit,
        )
        .await
    }

    /// `pending -> cancelled`. In-transit transfers cannot be cancelled.
    #[instrument(skip(self), fields(transfer_id = %transfer_id))]
    pub async fn cancel_transfer(
        &self,
        transfer_id: Uuid,
    ) -> Result<stock_transfer::Model, ServiceError> {
        self.step_transfer(
            transfer_id,
            TransferStatus::Pending,
            TransferStatus::Cancelled,
        )
        .await
    }

    async fn step_transfer(
        &self,
        transfer_id: Uuid,
        from: TransferStatus,
        to: TransferStatus,
    ) -> Result<stock_transfer::Model, ServiceError> {
        let db = &*self.db;
        let now = Utc::now();

        let transfer = StockTransferEntity::find_by_id(transfer_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Transfer {} not found", transfer_id)))?;

        if TransferStatus::from_str(&transfer.status) != Some(from) {
            return Err(ServiceError::InvalidTransition(format!(
                "Cannot move transfer {} from '{}' to '{}'",
                transfer_id,
                transfer.status,
                to.as_str()
            )));
        }

        let mut update = StockTransferEntity::update_many()
            .col_expr(stock_transfer::Column::Status, Expr::value(to.as_str()))
            .col_expr(stock_transfer::Column::UpdatedAt, Expr::value(Some(now)))
            .filter(stock_transfer::Column::Id.eq(transfer_id))
            .filter(stock_transfer::Column::Status.eq(from.as_str()));

        update = match to {
            TransferStatus::InTransit => {
                update.col_expr(stock_transfer::Column::ShippedAt, Expr::value(Some(now)))
            }
            TransferStatus::Cancelled => {
                update.col_expr(stock_transfer::Column::CancelledAt, Expr::value(Some(now)))
            }
            _ => update,
        };

        let result = update.exec(db).await.map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::InvalidTransition(format!(
                "Transfer {} changed concurrently",
                transfer_id
            )));
        }

        info!(transfer_id = %transfer_id, to_status = to.as_str(), "Transfer stepped");

        let mut stepped = transfer;
        stepped.status = to.as_str().to_string();
        stepped.updated_at = Some(now);
        match to {
            TransferStatus::InTransit => stepped.shipped_at = Some(now),
            TransferStatus::Cancelled => stepped.cancelled_at = Some(now),
            _ => {}
        }
        Ok(stepped)
    }

    /// `in_transit -> completed`: moves physical stock.
    ///
    /// `received` overrides the quantity per transfer item id; items not
    /// listed receive their full requested quantity. Receiving less than
    /// requested is a lower-than-planned outcome, not an error. The
    /// destination record is created on first receipt.
    #[instrument(skip(self, received), fields(transfer_id = %transfer_id))]
    pub async fn complete_transfer(
        &self,
        transfer_id: Uuid,
        received: &HashMap<Uuid, i32>,
    ) -> Result<stock_transfer::Model, ServiceError> {
        let completed = with_retry("complete_transfer", || {
            Box::pin(self.complete_transfer_once(transfer_id, received))
        })
        .await?;

        let _ = self
            .event_sender
            .send(Event::TransferCompleted(transfer_id))
            .await;

        Ok(completed)
    }

    async fn complete_transfer_once(
        &self,
        transfer_id: Uuid,
        received: &HashMap<Uuid, i32>,
    ) -> Result<stock_transfer::Model, ServiceError> {
        let now = Utc::now();
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let transfer = StockTransferEntity::find_by_id(transfer_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Transfer {} not found", transfer_id)))?;

        if TransferStatus::from_str(&transfer.status) != Some(TransferStatus::InTransit) {
            return Err(ServiceError::InvalidTransition(format!(
                "Cannot complete transfer {} in status {}",
                transfer_id, transfer.status
            )));
        }

        let claimed = StockTransferEntity::update_many()
            .col_expr(
                stock_transfer::Column::Status,
                Expr::value(TransferStatus::Completed.as_str()),
            )
            .col_expr(stock_transfer::Column::CompletedAt, Expr::value(Some(now)))
            .col_expr(stock_transfer::Column::UpdatedAt, Expr::value(Some(now)))
            .filter(stock_transfer::Column::Id.eq(transfer_id))
            .filter(stock_transfer::Column::Status.eq(TransferStatus::InTransit.as_str()))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        if claimed.rows_affected == 0 {
            return Err(ServiceError::SerializationConflict(format!(
                "Transfer {} claimed concurrently",
                transfer_id
            )));
        }

        let items = StockTransferItemEntity::find()
            .filter(stock_transfer_item::Column::TransferId.eq(transfer_id))
            .all(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        for item in items {
            let quantity = received
                .get(&item.id)
                .copied()
                .unwrap_or(item.requested_quantity);
            if quantity < 0 || quantity > item.requested_quantity {
                return Err(ServiceError::ValidationError(format!(
                    "Received quantity {} outside 0..={} for transfer item {}",
                    quantity, item.requested_quantity, item.id
                )));
            }
            if quantity == 0 {
                continue;
            }

            let source = self
                .find_record(&txn, item.product_id, item.variant_id, transfer.from_warehouse_id)
                .await?
                .ok_or_else(|| {
                    ServiceError::StockNotFound(format!(
                        "product {} in warehouse {}",
                        item.product_id, transfer.from_warehouse_id
                    ))
                })?;

            self.inventory
                .apply_movement_in(
                    &txn,
                    ApplyMovementRequest {
                        stock_record_id: source.id,
                        movement_type: MovementType::Transfer,
                        delta: -quantity,
                        reason: Some(format!("transfer to {}", transfer.to_warehouse_id)),
                        order_id: None,
                        reference_number: Some(transfer.transfer_number.clone()),
                        actor_id: transfer.requested_by,
                    },
                )
                .await?;

            let destination = match self
                .find_record(&txn, item.product_id, item.variant_id, transfer.to_warehouse_id)
                .await?
            {
                Some(record) => record,
                None => {
                    let record = stock_record::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        product_id: Set(item.product_id),
                        variant_id: Set(item.variant_id),
                        warehouse_id: Set(transfer.to_warehouse_id),
                        quantity: Set(0),
                        reserved: Set(0),
                        reorder_point: Set(source.reorder_point),
                        min_quantity: Set(source.min_quantity),
                        max_quantity: Set(source.max_quantity),
                        average_cost: Set(source.average_cost),
                        last_restocked_at: Set(None),
                        last_sold_at: Set(None),
                        created_at: Set(now),
                        updated_at: Set(Some(now)),
                    };
                    record.insert(&txn).await.map_err(ServiceError::db_error)?
                }
            };

            self.inventory
                .apply_movement_in(
                    &txn,
                    ApplyMovementRequest {
                        stock_record_id: destination.id,
                        movement_type: MovementType::Transfer,
                        delta: quantity,
                        reason: Some(format!("transfer from {}", transfer.from_warehouse_id)),
                        order_id: None,
                        reference_number: Some(transfer.transfer_number.clone()),
                        actor_id: transfer.requested_by,
                    },
                )
                .await?;

            let updated_item = StockTransferItemEntity::update_many()
                .col_expr(
                    stock_transfer_item::Column::TransferredQuantity,
                    Expr::value(quantity),
                )
                .filter(stock_transfer_item::Column::Id.eq(item.id))
                .exec(&txn)
                .await
                .map_err(ServiceError::db_error)?;
            debug_assert_eq!(updated_item.rows_affected, 1);
        }

        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(transfer_id = %transfer_id, "Transfer completed");

        let mut completed = transfer;
        completed.status = TransferStatus::Completed.as_str().to_string();
        completed.completed_at = Some(now);
        completed.updated_at = Some(now);
        Ok(completed)
    }

    async fn find_record<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        warehouse_id: Uuid,
    ) -> Result<Option<stock_record::Model>, ServiceError> {
        let mut query = StockRecordEntity::find()
            .filter(stock_record::Column::ProductId.eq(product_id))
            .filter(stock_record::Column::WarehouseId.eq(warehouse_id));

        query = match variant_id {
            Some(variant) => query.filter(stock_record::Column::VariantId.eq(variant)),
            None => query.filter(stock_record::Column::VariantId.is_null()),
        };

        query.one(conn).await.map_err(ServiceError::db_error)
    }

    pub async fn get_transfer(
        &self,
        transfer_id: Uuid,
    ) -> Result<Option<(stock_transfer::Model, Vec<stock_transfer_item::Model>)>, ServiceError>
    {
        let transfer = StockTransferEntity::find_by_id(transfer_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        match transfer {
            None => Ok(None),
            Some(transfer) => {
                let items = StockTransferItemEntity::find()
                    .filter(stock_transfer_item::Column::TransferId.eq(transfer_id))
                    .all(&*self.db)
                    .await
                    .map_err(ServiceError::db_error)?;
                Ok(Some((transfer, items)))
            }
        }
    }

    // ------------------------------------------------------------------
    // Audits
    // ------------------------------------------------------------------

    /// Opens an `in_progress` reconciliation pass over one warehouse.
    #[instrument(skip(self), fields(warehouse_id = %warehouse_id))]
    pub async fn start_audit(
        &self,
        warehouse_id: Uuid,
        audit_type: AuditType,
        performed_by: Option<Uuid>,
        notes: Option<String>,
    ) -> Result<stock_audit::Model, ServiceError> {
        let audit_id = Uuid::new_v4();
        let audit = stock_audit::ActiveModel {
            id: Set(audit_id),
            audit_number: Set(format!("AUD-{}", audit_id.to_string()[..8].to_uppercase())),
            warehouse_id: Set(warehouse_id),
            status: Set(AuditStatus::InProgress.as_str().to_string()),
            audit_type: Set(audit_type.as_str().to_string()),
            performed_by: Set(performed_by),
            notes: Set(notes),
            started_at: Set(Utc::now()),
            completed_at: Set(None),
        };
        let audit = audit.insert(&*self.db).await.map_err(ServiceError::db_error)?;

        info!(audit_id = %audit.id, audit_number = %audit.audit_number, "Audit started");

        Ok(audit)
    }

    /// Records one count. The system quantity is snapshotted at count time
    /// so later movements cannot blur what the auditor compared against.
    #[instrument(skip(self), fields(audit_id = %audit_id, stock_record_id = %stock_record_id))]
    pub async fn record_count(
        &self,
        audit_id: Uuid,
        stock_record_id: Uuid,
        counted_quantity: i32,
        notes: Option<String>,
    ) -> Result<stock_audit_item::Model, ServiceError> {
        if counted_quantity < 0 {
            return Err(ServiceError::ValidationError(
                "Counted quantity cannot be negative".to_string(),
            ));
        }

        let db = &*self.db;

        let audit = StockAuditEntity::find_by_id(audit_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Audit {} not found", audit_id)))?;

        if AuditStatus::from_str(&audit.status) != Some(AuditStatus::InProgress) {
            return Err(ServiceError::InvalidOperation(format!(
                "Audit {} is not in progress",
                audit_id
            )));
        }

        let record = StockRecordEntity::find_by_id(stock_record_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::StockNotFound(stock_record_id.to_string()))?;

        if record.warehouse_id != audit.warehouse_id {
            return Err(ServiceError::ValidationError(format!(
                "Stock record {} does not belong to audited warehouse {}",
                stock_record_id, audit.warehouse_id
            )));
        }

        let item = stock_audit_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            audit_id: Set(audit_id),
            stock_record_id: Set(stock_record_id),
            system_quantity: Set(record.quantity),
            counted_quantity: Set(counted_quantity),
            notes: Set(notes),
            counted_at: Set(Utc::now()),
        };
        let item = item.insert(db).await.map_err(ServiceError::db_error)?;

        if item.difference() != 0 {
            info!(
                audit_id = %audit_id,
                stock_record_id = %stock_record_id,
                difference = item.difference(),
                "Audit discrepancy recorded"
            );
        }

        Ok(item)
    }

    /// `in_progress -> completed`.
    #[instrument(skip(self), fields(audit_id = %audit_id))]
    pub async fn complete_audit(&self, audit_id: Uuid) -> Result<stock_audit::Model, ServiceError> {
        self.finish_audit(audit_id, AuditStatus::Completed).await
    }

    /// `in_progress -> cancelled`.
    #[instrument(skip(self), fields(audit_id = %audit_id))]
    pub async fn cancel_audit(&self, audit_id: Uuid) -> Result<stock_audit::Model, ServiceError> {
        self.finish_audit(audit_id, AuditStatus::Cancelled).await
    }

    async fn finish_audit(
        &self,
        audit_id: Uuid,
        to: AuditStatus,
    ) -> Result<stock_audit::Model, ServiceError> {
        let db = &*self.db;
        let now = Utc::now();

        let audit = StockAuditEntity::find_by_id(audit_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Audit {} not found", audit_id)))?;

        if AuditStatus::from_str(&audit.status) != Some(AuditStatus::InProgress) {
            return Err(ServiceError::InvalidTransition(format!(
                "Cannot move audit {} from '{}' to '{}'",
                audit_id,
                audit.status,
                to.as_str()
            )));
        }

        let result = StockAuditEntity::update_many()
            .col_expr(stock_audit::Column::Status, Expr::value(to.as_str()))
            .col_expr(stock_audit::Column::CompletedAt, Expr::value(Some(now)))
            .filter(stock_audit::Column::Id.eq(audit_id))
            .filter(stock_audit::Column::Status.eq(AuditStatus::InProgress.as_str()))
            .exec(db)
            .await
            .map_err(ServiceError::db_error)?;

        if result.rows_affected == 0 {
            return Err(ServiceError::InvalidTransition(format!(
                "Audit {} changed concurrently",
                audit_id
            )));
        }

        info!(audit_id = %audit_id, to_status = to.as_str(), "Audit finished");

        let mut finished = audit;
        finished.status = to.as_str().to_string();
        finished.completed_at = Some(now);
        Ok(finished)
    }

    /// Count lines whose counted quantity deviates from the snapshot.
    /// Resolution is an explicit correction movement, never automatic.
    pub async fn discrepancies(
        &self,
        audit_id: Uuid,
    ) -> Result<Vec<stock_audit_item::Model>, ServiceError> {
        let items = StockAuditItemEntity::find()
            .filter(stock_audit_item::Column::AuditId.eq(audit_id))
            .order_by_asc(stock_audit_item::Column::CountedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(items.into_iter().filter(|i| i.difference() != 0).collect())
    }
}
