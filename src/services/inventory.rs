//! Inventory Ledger
//!
//! Owns the per-(product, variant, warehouse) stock records and the
//! append-only movement log. Quantities are only ever changed here and in
//! the reservation manager; every quantity change appends a movement row in
//! the same transaction.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::db::with_retry;
use crate::entities::stock_movement::{self, Entity as StockMovementEntity, MovementType};
use crate::entities::stock_record::{self, Entity as StockRecordEntity, StockStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

#[derive(Debug, Clone, Validate)]
pub struct CreateStockRecordRequest {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub warehouse_id: Uuid,
    #[validate(range(min = 0))]
    pub quantity: i32,
    #[validate(range(min = 0))]
    pub reorder_point: i32,
}

#[derive(Debug, Clone)]
pub struct ApplyMovementRequest {
    pub stock_record_id: Uuid,
    pub movement_type: MovementType,
    /// Signed quantity delta. Inbound types carry positive deltas,
    /// outbound types negative ones.
    pub delta: i32,
    pub reason: Option<String>,
    pub order_id: Option<Uuid>,
    pub reference_number: Option<String>,
    pub actor_id: Option<Uuid>,
}

/// Service for the stock ledger.
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl InventoryService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Seeds a stock record for a (product, variant, warehouse) triple.
    #[instrument(skip(self, request), fields(product_id = %request.product_id, warehouse_id = %request.warehouse_id))]
    pub async fn create_stock_record(
        &self,
        request: CreateStockRecordRequest,
    ) -> Result<stock_record::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db;

        let existing = self
            .find_stock(request.product_id, request.variant_id, request.warehouse_id)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::ValidationError(format!(
                "Stock record already exists for product {} in warehouse {}",
                request.product_id, request.warehouse_id
            )));
        }

        let now = Utc::now();
        let record = stock_record::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(request.product_id),
            variant_id: Set(request.variant_id),
            warehouse_id: Set(request.warehouse_id),
            quantity: Set(request.quantity),
            reserved: Set(0),
            reorder_point: Set(request.reorder_point),
            min_quantity: Set(0),
            max_quantity: Set(None),
            average_cost: Set(None),
            last_restocked_at: Set(None),
            last_sold_at: Set(None),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };

        let model = record.insert(db).await.map_err(ServiceError::db_error)?;
        info!(stock_record_id = %model.id, quantity = model.quantity, "Stock record created");
        Ok(model)
    }

    pub async fn get_stock(
        &self,
        stock_record_id: Uuid,
    ) -> Result<Option<stock_record::Model>, ServiceError> {
        StockRecordEntity::find_by_id(stock_record_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    pub async fn find_stock(
        &self,
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

        query.one(&*self.db).await.map_err(ServiceError::db_error)
    }

    /// Units currently available for reservation. Read-only and
    /// non-blocking.
    #[instrument(skip(self))]
    pub async fn get_available(&self, stock_record_id: Uuid) -> Result<i32, ServiceError> {
        let record = self
            .get_stock(stock_record_id)
            .await?
            .ok_or_else(|| ServiceError::StockNotFound(stock_record_id.to_string()))?;
        Ok(record.available())
    }

    /// Derived stock status for a record, computed from the live
    /// quantities.
    pub async fn stock_status(&self, stock_record_id: Uuid) -> Result<StockStatus, ServiceError> {
        let record = self
            .get_stock(stock_record_id)
            .await?
            .ok_or_else(|| ServiceError::StockNotFound(stock_record_id.to_string()))?;
        Ok(record.status())
    }

    /// Applies a quantity change and appends the movement row atomically.
    ///
    /// `reserved` is never touched here; correction movements reconcile the
    /// physical count only. Retries internally on write conflicts.
    #[instrument(skip(self, request), fields(stock_record_id = %request.stock_record_id, movement_type = request.movement_type.as_str(), delta = request.delta))]
    pub async fn apply_movement(
        &self,
        request: ApplyMovementRequest,
    ) -> Result<stock_movement::Model, ServiceError> {
        if request.delta == 0 {
            return Err(ServiceError::InvalidDelta(
                "Movement delta must be non-zero".to_string(),
            ));
        }

        let movement = with_retry("apply_movement", || {
            Box::pin(self.apply_movement_once(request.clone()))
        })
        .await?;

        let _ = self
            .event_sender
            .send(Event::StockMovementRecorded {
                stock_record_id: movement.stock_record_id,
                movement_type: movement.movement_type.clone(),
                quantity: movement.quantity,
            })
            .await;

        self.emit_low_stock_if_needed(movement.stock_record_id)
            .await?;

        Ok(movement)
    }

    async fn apply_movement_once(
        &self,
        request: ApplyMovementRequest,
    ) -> Result<stock_movement::Model, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let movement = self.apply_movement_in(&txn, request).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(movement)
    }

    /// Movement application on a caller-supplied connection, used by the
    /// transfer subsystem to move both warehouses in one transaction.
    pub async fn apply_movement_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        request: ApplyMovementRequest,
    ) -> Result<stock_movement::Model, ServiceError> {
        let record = StockRecordEntity::find_by_id(request.stock_record_id)
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::StockNotFound(request.stock_record_id.to_string()))?;

        let before = record.quantity;
        let after = before + request.delta;
        if after < 0 {
            return Err(ServiceError::InvalidDelta(format!(
                "Movement of {} would drive quantity below zero (current {})",
                request.delta, before
            )));
        }
        if after < record.reserved {
            return Err(ServiceError::InvalidDelta(format!(
                "Movement of {} would leave quantity {} below reserved {}",
                request.delta, after, record.reserved
            )));
        }

        let now = Utc::now();

        // Optimistic guard: the update only lands if nobody changed the
        // quantity since we read it; a miss is transient contention.
        let mut update = StockRecordEntity::update_many()
            .col_expr(stock_record::Column::Quantity, Expr::value(after))
            .col_expr(stock_record::Column::UpdatedAt, Expr::value(Some(now)))
            .filter(stock_record::Column::Id.eq(record.id))
            .filter(stock_record::Column::Quantity.eq(before));

        if request.delta > 0 && request.movement_type == MovementType::In {
            update = update.col_expr(
                stock_record::Column::LastRestockedAt,
                Expr::value(Some(now)),
            );
        }
        if request.delta < 0 && request.movement_type == MovementType::Out {
            update = update.col_expr(stock_record::Column::LastSoldAt, Expr::value(Some(now)));
        }

        let result = update.exec(conn).await.map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::SerializationConflict(format!(
                "Concurrent update on stock record {}",
                record.id
            )));
        }

        let movement = stock_movement::ActiveModel {
            id: Set(Uuid::new_v4()),
            stock_record_id: Set(record.id),
            order_id: Set(request.order_id),
            movement_type: Set(request.movement_type.as_str().to_string()),
            quantity: Set(request.delta),
            quantity_before: Set(before),
            quantity_after: Set(after),
            unit_cost: Set(record.average_cost),
            reference_type: Set(request.order_id.map(|_| "order".to_string())),
            reference_number: Set(request.reference_number),
            reason: Set(request.reason),
            actor_id: Set(request.actor_id),
            created_at: Set(now),
        };
        let movement = movement.insert(conn).await.map_err(ServiceError::db_error)?;

        info!(
            stock_record_id = %record.id,
            movement_id = %movement.id,
            quantity_before = before,
            quantity_after = after,
            "Movement applied"
        );

        Ok(movement)
    }

    async fn emit_low_stock_if_needed(&self, stock_record_id: Uuid) -> Result<(), ServiceError> {
        if let Some(record) = self.get_stock(stock_record_id).await? {
            if record.status() != StockStatus::InStock {
                let _ = self
                    .event_sender
                    .send(Event::LowStock {
                        stock_record_id,
                        available: record.available(),
                    })
                    .await;
            }
        }
        Ok(())
    }

    /// Records in a warehouse at or below their reorder point but not
    /// empty. Computed from the live quantities; nothing is stored.
    #[instrument(skip(self))]
    pub async fn low_stock(
        &self,
        warehouse_id: Uuid,
    ) -> Result<Vec<stock_record::Model>, ServiceError> {
        let available = Expr::col(stock_record::Column::Quantity)
            .sub(Expr::col(stock_record::Column::Reserved));

        StockRecordEntity::find()
            .filter(stock_record::Column::WarehouseId.eq(warehouse_id))
            .filter(Expr::expr(available.clone()).lte(Expr::col(stock_record::Column::ReorderPoint)))
            .filter(Expr::expr(available).gt(0))
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Records in a warehouse with nothing left to reserve.
    #[instrument(skip(self))]
    pub async fn out_of_stock(
        &self,
        warehouse_id: Uuid,
    ) -> Result<Vec<stock_record::Model>, ServiceError> {
        let available = Expr::col(stock_record::Column::Quantity)
            .sub(Expr::col(stock_record::Column::Reserved));

        StockRecordEntity::find()
            .filter(stock_record::Column::WarehouseId.eq(warehouse_id))
            .filter(Expr::expr(available).lte(0))
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Movement history for a stock record, newest first.
    pub async fn movements(
        &self,
        stock_record_id: Uuid,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<stock_movement::Model>, u64), ServiceError> {
        if page == 0 {
            return Err(ServiceError::ValidationError(
                "Page number must be greater than 0".to_string(),
            ));
        }

        let paginator = StockMovementEntity::find()
            .filter(stock_movement::Column::StockRecordId.eq(stock_record_id))
            .order_by_desc(stock_movement::Column::CreatedAt)
            .paginate(&*self.db, limit);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let items = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::db_error)?;

        Ok((items, total))
    }
}
