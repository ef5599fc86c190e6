//! Order Assembly & State Machine
//!
//! Converts a cart into an order inside a single transaction: price
//! resolution through the pricing engine, all-or-nothing stock
//! reservation, commission computation, then the order aggregate and its
//! initial status-history row. Status transitions are validated against an
//! explicit adjacency table; the side effects of an edge run in the same
//! transaction as the status change.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::catalog::{CatalogProvider, ProductSnapshot};
use crate::config::SettlementConfig;
use crate::db::with_retry;
use crate::entities::order::{self, Entity as OrderEntity, OrderStatus};
use crate::entities::order_item;
use crate::entities::order_status_history::{self, Entity as OrderStatusHistoryEntity};
use crate::entities::payment::{self, Entity as PaymentEntity, PaymentStatus};
use crate::entities::promo_code::{self, Entity as PromoCodeEntity};
use crate::entities::stock_record::{self, Entity as StockRecordEntity};
use crate::entities::stock_reservation::ReservationStatus;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::pricing::{PriceLine, PricingService, Quote};
use crate::services::reservations::ReservationService;
use crate::services::settlement::{commission_amount, resolve_commission};

/// One cart line at checkout.
#[derive(Debug, Clone)]
pub struct CheckoutLine {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub user_id: Option<Uuid>,
    /// Warehouse the stock is reserved from.
    pub warehouse_id: Uuid,
    pub lines: Vec<CheckoutLine>,
    pub promo_codes: Vec<String>,
    pub customer_segment: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_name: Option<String>,
    pub delivery_fee: Decimal,
    /// When payment was already authorized the order lands in `confirmed`
    /// and its inventory is fulfilled immediately; otherwise it stays a
    /// draft until the payment authorization arrives.
    pub payment_authorized: bool,
}

/// Validates one edge of the order state machine.
///
/// `cancelled` is reachable from every pre-shipment state, `disputed` and
/// `refunded` from the post-delivery states. `cancelled` and `refunded`
/// are terminal; everything else moves strictly forward.
pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;
    matches!(
        (from, to),
        (Draft, Confirmed)
            | (Draft, Cancelled)
            | (Confirmed, Processing)
            | (Confirmed, Cancelled)
            | (Processing, Shipped)
            | (Processing, Cancelled)
            | (Shipped, Delivered)
            | (Delivered, Completed)
            | (Delivered, Disputed)
            | (Delivered, Refunded)
            | (Completed, Disputed)
            | (Completed, Refunded)
            | (Disputed, Refunded)
            | (Disputed, Completed)
    )
}

/// Service for order assembly and lifecycle.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    catalog: Arc<dyn CatalogProvider>,
    pricing: PricingService,
    reservations: ReservationService,
    settlement: SettlementConfig,
    reservation_ttl: chrono::Duration,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        catalog: Arc<dyn CatalogProvider>,
        pricing: PricingService,
        reservations: ReservationService,
        settlement: SettlementConfig,
        reservation_ttl: chrono::Duration,
    ) -> Self {
        Self {
            db,
            event_sender,
            catalog,
            pricing,
            reservations,
            settlement,
            reservation_ttl,
        }
    }

    /// Converts a cart into an order.
    ///
    /// All lines reserve or none do: the first `InsufficientStock` rolls
    /// the whole transaction back and surfaces to the caller.
    #[instrument(skip(self, request), fields(warehouse_id = %request.warehouse_id, line_count = request.lines.len()))]
    pub async fn place_order(
        &self,
        request: CheckoutRequest,
    ) -> Result<order::Model, ServiceError> {
        if request.lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "Order must contain at least one line".to_string(),
            ));
        }
        if request.lines.iter().any(|l| l.quantity <= 0) {
            return Err(ServiceError::ValidationError(
                "Line quantities must be positive".to_string(),
            ));
        }

        let mut snapshots = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            let snapshot = self
                .catalog
                .product_snapshot(line.product_id, line.variant_id)
                .await?;
            snapshots.push(snapshot);
        }

        let vendor_id = snapshots[0].vendor_id;
        if snapshots.iter().any(|s| s.vendor_id != vendor_id) {
            return Err(ServiceError::ValidationError(
                "All order lines must belong to the same vendor".to_string(),
            ));
        }

        let price_lines: Vec<PriceLine> = request
            .lines
            .iter()
            .zip(&snapshots)
            .map(|(line, snapshot)| PriceLine {
                product_id: line.product_id,
                variant_id: line.variant_id,
                category_id: snapshot.category_id,
                vendor_id: snapshot.vendor_id,
                quantity: line.quantity,
                unit_price: snapshot.unit_price,
            })
            .collect();

        let quote = self
            .pricing
            .quote(
                &price_lines,
                request.user_id,
                request.customer_segment.clone(),
                &request.promo_codes,
            )
            .await?;

        let order = with_retry("place_order", || {
            Box::pin(self.place_order_once(&request, &snapshots, &quote, vendor_id))
        })
        .await?;

        let _ = self.event_sender.send(Event::OrderPlaced(order.id)).await;
        if order.status == OrderStatus::Confirmed.as_str() {
            let _ = self
                .event_sender
                .send(Event::OrderConfirmed(order.id))
                .await;
        }

        info!(order_id = %order.id, order_number = %order.order_number, status = %order.status, "Order placed");

        Ok(order)
    }

    async fn place_order_once(
        &self,
        request: &CheckoutRequest,
        snapshots: &[ProductSnapshot],
        quote: &Quote,
        vendor_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        let db = &*self.db;
        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        // Reserve every line; any failure aborts the whole order.
        for line in &request.lines {
            let stock = self
                .find_stock_in(&txn, line.product_id, line.variant_id, request.warehouse_id)
                .await?
                .ok_or_else(|| {
                    ServiceError::StockNotFound(format!(
                        "product {} in warehouse {}",
                        line.product_id, request.warehouse_id
                    ))
                })?;

            self.reservations
                .reserve_in(&txn, stock.id, line.quantity, order_id, self.reservation_ttl)
                .await?;
        }

        let category_ids: Vec<Uuid> = snapshots.iter().filter_map(|s| s.category_id).collect();
        let terms = resolve_commission(&txn, vendor_id, &category_ids, &self.settlement).await?;

        let subtotal = quote.subtotal;
        let discount = quote.discount_amount;
        let tax = ((subtotal - discount) * self.settlement.tax_rate / Decimal::from(100))
            .round_dp(2)
            .max(Decimal::ZERO);
        let total = subtotal - discount + tax + request.delivery_fee;
        let commission = commission_amount(subtotal, &terms);

        let order_model = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(format!(
                "ORD-{}",
                order_id.to_string()[..8].to_uppercase()
            )),
            user_id: Set(request.user_id),
            vendor_id: Set(vendor_id),
            status: Set(OrderStatus::Draft.as_str().to_string()),
            customer_email: Set(request.customer_email.clone()),
            customer_phone: Set(request.customer_phone.clone()),
            customer_name: Set(request.customer_name.clone()),
            subtotal: Set(subtotal),
            discount_amount: Set(discount),
            tax_amount: Set(tax),
            delivery_fee: Set(request.delivery_fee),
            total_amount: Set(total),
            commission_rate: Set(Some(terms.rate)),
            commission_fixed: Set(Some(terms.fixed)),
            commission_amount: Set(Some(commission)),
            vendor_payout: Set(Some(total - commission)),
            promo_code: Set(quote.applied_promo_codes.first().cloned()),
            customer_segment: Set(request.customer_segment.clone()),
            cancellation_reason: Set(None),
            created_at: Set(now),
            updated_at: Set(Some(now)),
            confirmed_at: Set(None),
            processing_at: Set(None),
            shipped_at: Set(None),
            delivered_at: Set(None),
            cancelled_at: Set(None),
            completed_at: Set(None),
        };
        let mut order_model = order_model.insert(&txn).await.map_err(ServiceError::db_error)?;

        for (quoted, snapshot) in quote.lines.iter().zip(snapshots) {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(Some(snapshot.product_id)),
                variant_id: Set(snapshot.variant_id),
                product_name: Set(snapshot.name.clone()),
                product_sku: Set(snapshot.sku.clone()),
                quantity: Set(quoted.quantity),
                unit_price: Set(quoted.unit_price),
                total_price: Set(quoted.line_total),
                discount_amount: Set(quoted.discount_amount),
                tax_amount: Set(Decimal::ZERO),
                created_at: Set(now),
            };
            item.insert(&txn).await.map_err(ServiceError::db_error)?;
        }

        self.append_history(&txn, order_id, None, OrderStatus::Draft, None, None)
            .await?;

        if request.payment_authorized {
            order_model = self
                .apply_transition_in(
                    &txn,
                    order_model,
                    OrderStatus::Confirmed,
                    None,
                    Some("payment authorized".to_string()),
                )
                .await?;
        }

        txn.commit().await.map_err(ServiceError::db_error)?;

        Ok(order_model)
    }

    async fn find_stock_in<C: ConnectionTrait>(
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

    /// Drives one status transition, rejecting edges that are not in the
    /// adjacency table.
    #[instrument(skip(self), fields(order_id = %order_id, to_status = to_status.as_str()))]
    pub async fn transition(
        &self,
        order_id: Uuid,
        to_status: OrderStatus,
        actor_id: Option<Uuid>,
        comment: Option<String>,
    ) -> Result<order::Model, ServiceError> {
        let (old_status, updated) = with_retry("transition", || {
            let comment = comment.clone();
            Box::pin(async move {
                let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

                let order = OrderEntity::find_by_id(order_id)
                    .one(&txn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Order {} not found", order_id))
                    })?;

                let old_status = order.status.clone();
                let updated = self
                    .apply_transition_in(&txn, order, to_status, actor_id, comment)
                    .await?;

                txn.commit().await.map_err(ServiceError::db_error)?;
                Ok((old_status, updated))
            })
        })
        .await?;

        let _ = self
            .event_sender
            .send(Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status: to_status.as_str().to_string(),
            })
            .await;

        match to_status {
            OrderStatus::Confirmed => {
                let _ = self.event_sender.send(Event::OrderConfirmed(order_id)).await;
            }
            OrderStatus::Cancelled => {
                let _ = self
                    .event_sender
                    .send(Event::OrderCancelled {
                        order_id,
                        reason: updated.cancellation_reason.clone(),
                    })
                    .await;
            }
            OrderStatus::Refunded => {
                let _ = self.event_sender.send(Event::OrderRefunded(order_id)).await;
            }
            _ => {}
        }

        Ok(updated)
    }

    /// Cancels an order, releasing its holds and reversing any captured
    /// payment that is still in escrow.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn cancel(
        &self,
        order_id: Uuid,
        reason: Option<String>,
        actor_id: Option<Uuid>,
    ) -> Result<order::Model, ServiceError> {
        self.transition(order_id, OrderStatus::Cancelled, actor_id, reason)
            .await
    }

    /// Transition plus side effects on a caller transaction. Used by
    /// `place_order` (immediate confirmation), `transition` and the
    /// settlement service (full refund).
    pub async fn apply_transition_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        order: order::Model,
        to_status: OrderStatus,
        actor_id: Option<Uuid>,
        comment: Option<String>,
    ) -> Result<order::Model, ServiceError> {
        let from_status = OrderStatus::from_str(&order.status).ok_or_else(|| {
            ServiceError::InternalError(format!(
                "Order {} carries unknown status {}",
                order.id, order.status
            ))
        })?;

        if !is_valid_transition(from_status, to_status) {
            return Err(ServiceError::InvalidTransition(format!(
                "Cannot transition order {} from '{}' to '{}'",
                order.id,
                from_status.as_str(),
                to_status.as_str()
            )));
        }

        let now = Utc::now();

        match to_status {
            OrderStatus::Confirmed => {
                // Inventory leaves the pool at confirmation; shipping and
                // delivery no longer touch it.
                let active = self
                    .reservations
                    .active_for_order_in(conn, order.id)
                    .await?;
                for reservation in active {
                    self.reservations.fulfill_in(conn, reservation.id).await?;
                }
                self.consume_promo_usage(conn, &order).await?;
            }
            OrderStatus::Cancelled => {
                let active = self
                    .reservations
                    .active_for_order_in(conn, order.id)
                    .await?;
                for reservation in active {
                    self.reservations
                        .terminate_in(
                            conn,
                            reservation.id,
                            ReservationStatus::Released,
                            "order cancelled",
                        )
                        .await?;
                }
                self.reverse_held_payments(conn, order.id).await?;
            }
            _ => {}
        }

        let mut update = OrderEntity::update_many()
            .col_expr(
                order::Column::Status,
                Expr::value(to_status.as_str()),
            )
            .col_expr(order::Column::UpdatedAt, Expr::value(Some(now)))
            .filter(order::Column::Id.eq(order.id))
            .filter(order::Column::Status.eq(from_status.as_str()));

        update = match to_status {
            OrderStatus::Confirmed => {
                update.col_expr(order::Column::ConfirmedAt, Expr::value(Some(now)))
            }
            OrderStatus::Processing => {
                update.col_expr(order::Column::ProcessingAt, Expr::value(Some(now)))
            }
            OrderStatus::Shipped => {
                update.col_expr(order::Column::ShippedAt, Expr::value(Some(now)))
            }
            OrderStatus::Delivered => {
                update.col_expr(order::Column::DeliveredAt, Expr::value(Some(now)))
            }
            OrderStatus::Completed => {
                update.col_expr(order::Column::CompletedAt, Expr::value(Some(now)))
            }
            OrderStatus::Cancelled => update
                .col_expr(order::Column::CancelledAt, Expr::value(Some(now)))
                .col_expr(
                    order::Column::CancellationReason,
                    Expr::value(comment.clone()),
                ),
            _ => update,
        };

        let result = update.exec(conn).await.map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::SerializationConflict(format!(
                "Order {} changed concurrently",
                order.id
            )));
        }

        self.append_history(conn, order.id, Some(from_status), to_status, actor_id, comment.clone())
            .await?;

        info!(
            order_id = %order.id,
            from_status = from_status.as_str(),
            to_status = to_status.as_str(),
            "Order transitioned"
        );

        let mut updated = order;
        updated.status = to_status.as_str().to_string();
        updated.updated_at = Some(now);
        match to_status {
            OrderStatus::Confirmed => updated.confirmed_at = Some(now),
            OrderStatus::Processing => updated.processing_at = Some(now),
            OrderStatus::Shipped => updated.shipped_at = Some(now),
            OrderStatus::Delivered => updated.delivered_at = Some(now),
            OrderStatus::Completed => updated.completed_at = Some(now),
            OrderStatus::Cancelled => {
                updated.cancelled_at = Some(now);
                updated.cancellation_reason = comment;
            }
            _ => {}
        }
        Ok(updated)
    }

    /// Consumes the order's promo code at confirmation. Draft quotes never
    /// touch the counters, so abandoned carts cost nothing.
    async fn consume_promo_usage<C: ConnectionTrait>(
        &self,
        conn: &C,
        order: &order::Model,
    ) -> Result<(), ServiceError> {
        let Some(code) = order.promo_code.as_deref() else {
            return Ok(());
        };

        let promo = PromoCodeEntity::find()
            .filter(promo_code::Column::Code.eq(code))
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Promo code {} no longer exists", code))
            })?;

        self.pricing
            .record_usage(
                conn,
                &promo,
                order.user_id,
                order.id,
                order.discount_amount,
                order.total_amount,
            )
            .await
    }

    /// Marks captured-but-unreleased payments as refunded when an order is
    /// cancelled. Funds already released to the vendor are out of scope
    /// here; those go through the dispute/refund settlement path.
    async fn reverse_held_payments<C: ConnectionTrait>(
        &self,
        conn: &C,
        order_id: Uuid,
    ) -> Result<(), ServiceError> {
        let now = Utc::now();
        let held = PaymentEntity::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .filter(payment::Column::Status.eq(PaymentStatus::Captured.as_str()))
            .filter(payment::Column::EscrowReleasedAt.is_null())
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?;

        for held_payment in held {
            let reversed = PaymentEntity::update_many()
                .col_expr(
                    payment::Column::Status,
                    Expr::value(PaymentStatus::Refunded.as_str()),
                )
                .col_expr(
                    payment::Column::RefundedAmount,
                    Expr::value(held_payment.amount),
                )
                .col_expr(payment::Column::RefundedAt, Expr::value(Some(now)))
                .col_expr(payment::Column::UpdatedAt, Expr::value(Some(now)))
                .col_expr(
                    payment::Column::EscrowReleaseAmount,
                    Expr::value(None::<Decimal>),
                )
                .filter(payment::Column::Id.eq(held_payment.id))
                .filter(payment::Column::Status.eq(PaymentStatus::Captured.as_str()))
                .filter(payment::Column::EscrowReleasedAt.is_null())
                .exec(conn)
                .await
                .map_err(ServiceError::db_error)?;

            if reversed.rows_affected == 0 {
                return Err(ServiceError::SerializationConflict(format!(
                    "Payment {} changed concurrently during cancellation",
                    held_payment.id
                )));
            }

            info!(
                payment_id = %held_payment.id,
                order_id = %order_id,
                amount = %held_payment.amount,
                "Held payment reversed on cancellation"
            );
        }

        Ok(())
    }

    async fn append_history<C: ConnectionTrait>(
        &self,
        conn: &C,
        order_id: Uuid,
        from_status: Option<OrderStatus>,
        to_status: OrderStatus,
        actor_id: Option<Uuid>,
        comment: Option<String>,
    ) -> Result<(), ServiceError> {
        let history = order_status_history::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            from_status: Set(from_status.map(|s| s.as_str().to_string())),
            to_status: Set(to_status.as_str().to_string()),
            comment: Set(comment),
            actor_id: Set(actor_id),
            created_at: Set(Utc::now()),
        };
        history.insert(conn).await.map_err(ServiceError::db_error)?;
        Ok(())
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<Option<order::Model>, ServiceError> {
        OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Full transition log for an order, oldest first.
    pub async fn status_history(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<order_status_history::Model>, ServiceError> {
        OrderStatusHistoryEntity::find()
            .filter(order_status_history::Column::OrderId.eq(order_id))
            .order_by_asc(order_status_history::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacency_table_allows_the_happy_path() {
        use OrderStatus::*;
        for (from, to) in [
            (Draft, Confirmed),
            (Confirmed, Processing),
            (Processing, Shipped),
            (Shipped, Delivered),
            (Delivered, Completed),
        ] {
            assert!(is_valid_transition(from, to), "{:?} -> {:?}", from, to);
        }
    }

    #[test]
    fn cancellation_only_before_shipment() {
        use OrderStatus::*;
        assert!(is_valid_transition(Draft, Cancelled));
        assert!(is_valid_transition(Confirmed, Cancelled));
        assert!(is_valid_transition(Processing, Cancelled));
        assert!(!is_valid_transition(Shipped, Cancelled));
        assert!(!is_valid_transition(Delivered, Cancelled));
    }

    #[test]
    fn disputes_and_refunds_follow_delivery() {
        use OrderStatus::*;
        assert!(is_valid_transition(Delivered, Disputed));
        assert!(is_valid_transition(Completed, Disputed));
        assert!(is_valid_transition(Delivered, Refunded));
        assert!(is_valid_transition(Disputed, Refunded));
        assert!(is_valid_transition(Disputed, Completed));
        assert!(!is_valid_transition(Processing, Disputed));
        assert!(!is_valid_transition(Confirmed, Refunded));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        use OrderStatus::*;
        for to in [
            Draft, Confirmed, Processing, Shipped, Delivered, Completed, Disputed, Refunded,
        ] {
            assert!(!is_valid_transition(Cancelled, to));
            assert!(!is_valid_transition(Refunded, to));
        }
    }

    #[test]
    fn no_self_transitions() {
        use OrderStatus::*;
        for status in [
            Draft, Confirmed, Processing, Shipped, Delivered, Completed, Cancelled, Disputed,
            Refunded,
        ] {
            assert!(!is_valid_transition(status, status));
        }
    }

    #[test]
    fn backward_edges_are_rejected() {
        use OrderStatus::*;
        assert!(!is_valid_transition(Shipped, Processing));
        assert!(!is_valid_transition(Delivered, Shipped));
        assert!(!is_valid_transition(Confirmed, Draft));
    }
}
