//! Escrow & Commission Settlement
//!
//! Captured payments are held in escrow until the post-delivery hold
//! period elapses without a dispute; the scheduled sweep then releases
//! `total - commission - refunded` to the vendor wallet, recording a wallet
//! ledger entry with before/after balances. Refunds accumulate against the
//! captured amount and can never exceed it.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::SettlementConfig;
use crate::db::with_retry;
use crate::entities::category_commission::{self, Entity as CategoryCommissionEntity};
use crate::entities::order::{self, Entity as OrderEntity, OrderStatus};
use crate::entities::payment::{self, Entity as PaymentEntity, PaymentStatus};
use crate::entities::vendor::{self, Entity as VendorEntity};
use crate::entities::vendor_transaction::{self, VendorTransactionType};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::gateway::PaymentGateway;
use crate::services::orders::{is_valid_transition, OrderService};

/// Resolved commission terms for one order.
#[derive(Debug, Clone, PartialEq)]
pub struct CommissionTerms {
    pub rate: Decimal,
    pub fixed: Decimal,
}

/// `subtotal * rate/100 + fixed`, rounded to currency precision.
pub fn commission_amount(subtotal: Decimal, terms: &CommissionTerms) -> Decimal {
    (subtotal * terms.rate / Decimal::from(100) + terms.fixed).round_dp(2)
}

/// Commission precedence: category-specific override (highest priority,
/// then earliest created) beats the vendor default, which beats the
/// platform default.
pub async fn resolve_commission<C: ConnectionTrait>(
    conn: &C,
    vendor_id: Uuid,
    category_ids: &[Uuid],
    cfg: &SettlementConfig,
) -> Result<CommissionTerms, ServiceError> {
    if !category_ids.is_empty() {
        let override_row = CategoryCommissionEntity::find()
            .filter(category_commission::Column::VendorId.eq(vendor_id))
            .filter(category_commission::Column::CategoryId.is_in(category_ids.to_vec()))
            .filter(category_commission::Column::IsActive.eq(true))
            .order_by_desc(category_commission::Column::Priority)
            .order_by_asc(category_commission::Column::CreatedAt)
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?;

        if let Some(row) = override_row {
            return Ok(CommissionTerms {
                rate: row.commission_rate,
                fixed: row.commission_fixed.unwrap_or(Decimal::ZERO),
            });
        }
    }

    let vendor_row = VendorEntity::find_by_id(vendor_id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?;

    if let Some(vendor_row) = vendor_row {
        return Ok(CommissionTerms {
            rate: vendor_row.commission_rate,
            fixed: vendor_row.commission_fixed,
        });
    }

    Ok(CommissionTerms {
        rate: cfg.platform_commission_rate,
        fixed: cfg.platform_commission_fixed,
    })
}

/// Result of one escrow-release sweep pass.
#[derive(Debug, Clone)]
pub struct EscrowSweepResult {
    pub released_count: u64,
    pub released_total: Decimal,
    /// Candidates another worker claimed first.
    pub skipped_count: u64,
    pub swept_at: DateTime<Utc>,
}

/// Service for payment capture, refunds and vendor payouts.
#[derive(Clone)]
pub struct SettlementService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    orders: Arc<OrderService>,
    cfg: SettlementConfig,
}

impl SettlementService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        orders: Arc<OrderService>,
        cfg: SettlementConfig,
    ) -> Self {
        Self {
            db,
            event_sender,
            orders,
            cfg,
        }
    }

    /// Creates a payment attempt and authorizes it with the gateway.
    #[instrument(skip(self, gateway), fields(order_id = %order_id))]
    pub async fn authorize(
        &self,
        order_id: Uuid,
        method: Option<String>,
        currency: &str,
        gateway: &dyn PaymentGateway,
    ) -> Result<payment::Model, ServiceError> {
        let order = OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let now = Utc::now();
        let payment_id = Uuid::new_v4();
        let pending = payment::ActiveModel {
            id: Set(payment_id),
            order_id: Set(order_id),
            method: Set(method),
            status: Set(PaymentStatus::Pending.as_str().to_string()),
            amount: Set(order.total_amount),
            currency: Set(currency.to_string()),
            provider_txn_id: Set(None),
            error_message: Set(None),
            is_escrow: Set(false),
            escrow_hold_days: Set(self.cfg.escrow_hold_days),
            escrow_released_at: Set(None),
            escrow_release_amount: Set(None),
            refundable_amount: Set(None),
            refunded_amount: Set(Decimal::ZERO),
            created_at: Set(now),
            updated_at: Set(Some(now)),
            processed_at: Set(None),
            failed_at: Set(None),
            refunded_at: Set(None),
        };
        let pending = pending.insert(&*self.db).await.map_err(ServiceError::db_error)?;

        match gateway.authorize(payment_id, order.total_amount).await {
            Ok(receipt) => {
                let mut active: payment::ActiveModel = pending.into();
                active.status = Set(PaymentStatus::Authorized.as_str().to_string());
                active.provider_txn_id = Set(Some(receipt.provider_txn_id));
                active.updated_at = Set(Some(Utc::now()));
                let authorized = active.update(&*self.db).await.map_err(ServiceError::db_error)?;

                let _ = self
                    .event_sender
                    .send(Event::PaymentAuthorized(payment_id))
                    .await;

                Ok(authorized)
            }
            Err(err) => {
                let mut active: payment::ActiveModel = pending.into();
                active.status = Set(PaymentStatus::Failed.as_str().to_string());
                active.error_message = Set(Some(err.to_string()));
                active.failed_at = Set(Some(Utc::now()));
                active.updated_at = Set(Some(Utc::now()));
                active.update(&*self.db).await.map_err(ServiceError::db_error)?;

                Err(ServiceError::PaymentFailed(format!(
                    "Authorization declined for order {}: {}",
                    order_id, err
                )))
            }
        }
    }

    /// Captures an authorized payment into escrow.
    ///
    /// The hold period comes from the vendor's override when present,
    /// otherwise the platform default. Idempotent on already-captured
    /// payments.
    #[instrument(skip(self, gateway), fields(payment_id = %payment_id))]
    pub async fn capture(
        &self,
        payment_id: Uuid,
        gateway: &dyn PaymentGateway,
    ) -> Result<payment::Model, ServiceError> {
        let existing = PaymentEntity::find_by_id(payment_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Payment {} not found", payment_id)))?;

        match PaymentStatus::from_str(&existing.status) {
            Some(PaymentStatus::Authorized) => {}
            Some(PaymentStatus::Captured) => return Ok(existing),
            _ => {
                return Err(ServiceError::InvalidTransition(format!(
                    "Cannot capture payment {} in status {}",
                    payment_id, existing.status
                )));
            }
        }

        let order = OrderEntity::find_by_id(existing.order_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Order {} not found", existing.order_id))
            })?;

        let vendor_hold = VendorEntity::find_by_id(order.vendor_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .and_then(|v| v.escrow_hold_days);
        let hold_days = vendor_hold.unwrap_or(self.cfg.escrow_hold_days);

        let amount = existing.amount;
        let receipt = gateway.capture(payment_id, amount).await?;

        let captured = with_retry("capture", || {
            let provider_txn_id = receipt.provider_txn_id.clone();
            Box::pin(async move {
                let now = Utc::now();
                let claimed = PaymentEntity::update_many()
                    .col_expr(
                        payment::Column::Status,
                        Expr::value(PaymentStatus::Captured.as_str()),
                    )
                    .col_expr(payment::Column::IsEscrow, Expr::value(true))
                    .col_expr(payment::Column::EscrowHoldDays, Expr::value(hold_days))
                    .col_expr(
                        payment::Column::ProviderTxnId,
                        Expr::value(Some(provider_txn_id)),
                    )
                    .col_expr(
                        payment::Column::RefundableAmount,
                        Expr::value(Some(amount)),
                    )
                    .col_expr(payment::Column::ProcessedAt, Expr::value(Some(now)))
                    .col_expr(payment::Column::UpdatedAt, Expr::value(Some(now)))
                    .filter(payment::Column::Id.eq(payment_id))
                    .filter(payment::Column::Status.eq(PaymentStatus::Authorized.as_str()))
                    .exec(&*self.db)
                    .await
                    .map_err(ServiceError::db_error)?;

                if claimed.rows_affected == 0 {
                    return Err(ServiceError::SerializationConflict(format!(
                        "Payment {} changed concurrently during capture",
                        payment_id
                    )));
                }

                PaymentEntity::find_by_id(payment_id)
                    .one(&*self.db)
                    .await
                    .map_err(ServiceError::db_error)?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Payment {} not found", payment_id))
                    })
            })
        })
        .await?;

        let _ = self
            .event_sender
            .send(Event::PaymentCaptured {
                payment_id,
                amount: captured.amount,
            })
            .await;

        info!(payment_id = %payment_id, amount = %captured.amount, hold_days, "Payment captured into escrow");

        Ok(captured)
    }

    /// Refunds part or all of a captured payment.
    ///
    /// The accumulated `refunded_amount` is guarded by a single conditional
    /// update, so concurrent refunds can never push it past the captured
    /// amount. A refund that fully covers the payment transitions the order
    /// to `refunded` and cancels any not-yet-executed escrow release.
    #[instrument(skip(self, gateway), fields(payment_id = %payment_id, amount = %amount))]
    pub async fn refund(
        &self,
        payment_id: Uuid,
        amount: Decimal,
        gateway: &dyn PaymentGateway,
    ) -> Result<payment::Model, ServiceError> {
        if amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Refund amount must be positive".to_string(),
            ));
        }

        let refunded = with_retry("refund", || {
            Box::pin(self.refund_once(payment_id, amount, gateway))
        })
        .await?;

        let _ = self
            .event_sender
            .send(Event::PaymentRefunded { payment_id, amount })
            .await;
        if refunded.status == PaymentStatus::Refunded.as_str() {
            let _ = self
                .event_sender
                .send(Event::OrderRefunded(refunded.order_id))
                .await;
        }

        Ok(refunded)
    }

    async fn refund_once(
        &self,
        payment_id: Uuid,
        amount: Decimal,
        gateway: &dyn PaymentGateway,
    ) -> Result<payment::Model, ServiceError> {
        let db = &*self.db;
        let now = Utc::now();
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let current = PaymentEntity::find_by_id(payment_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Payment {} not found", payment_id)))?;

        if PaymentStatus::from_str(&current.status) != Some(PaymentStatus::Captured) {
            return Err(ServiceError::InvalidTransition(format!(
                "Cannot refund payment {} in status {}",
                payment_id, current.status
            )));
        }

        let new_refunded = current.refunded_amount + amount;
        if new_refunded > current.amount {
            return Err(ServiceError::RefundExceedsCaptured(format!(
                "Refund of {} would exceed captured {} (already refunded {})",
                amount, current.amount, current.refunded_amount
            )));
        }
        let fully_refunded = new_refunded == current.amount;

        // Single-statement guard: the increment only lands while the prior
        // total still leaves room, so two racing refunds cannot both take
        // the remainder.
        let mut update = PaymentEntity::update_many()
            .col_expr(
                payment::Column::RefundedAmount,
                Expr::value(new_refunded),
            )
            .col_expr(
                payment::Column::RefundableAmount,
                Expr::value(Some(current.amount - new_refunded)),
            )
            .col_expr(payment::Column::UpdatedAt, Expr::value(Some(now)))
            .filter(payment::Column::Id.eq(payment_id))
            .filter(payment::Column::Status.eq(PaymentStatus::Captured.as_str()))
            .filter(payment::Column::RefundedAmount.eq(current.refunded_amount));

        if fully_refunded {
            update = update
                .col_expr(
                    payment::Column::Status,
                    Expr::value(PaymentStatus::Refunded.as_str()),
                )
                .col_expr(payment::Column::RefundedAt, Expr::value(Some(now)))
                .col_expr(
                    payment::Column::EscrowReleaseAmount,
                    Expr::value(None::<Decimal>),
                );
        }

        let result = update.exec(&txn).await.map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::SerializationConflict(format!(
                "Payment {} changed concurrently during refund",
                payment_id
            )));
        }

        gateway.refund(payment_id, amount).await?;

        if fully_refunded {
            let order = OrderEntity::find_by_id(current.order_id)
                .one(&txn)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Order {} not found", current.order_id))
                })?;

            if let Some(from) = OrderStatus::from_str(&order.status) {
                if is_valid_transition(from, OrderStatus::Refunded) {
                    self.orders
                        .apply_transition_in(
                            &txn,
                            order,
                            OrderStatus::Refunded,
                            None,
                            Some("payment fully refunded".to_string()),
                        )
                        .await?;
                }
            }
        }

        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(
            payment_id = %payment_id,
            amount = %amount,
            refunded_total = %new_refunded,
            fully_refunded,
            "Refund applied"
        );

        let mut refunded = current;
        refunded.refunded_amount = new_refunded;
        refunded.refundable_amount = Some(refunded.amount - new_refunded);
        if fully_refunded {
            refunded.status = PaymentStatus::Refunded.as_str().to_string();
            refunded.refunded_at = Some(now);
            refunded.escrow_release_amount = None;
        }
        Ok(refunded)
    }

    /// Releases escrow for every eligible payment: captured, still held,
    /// order delivered (or completed) past its hold period and not under
    /// dispute. Each release claims the payment row first, so concurrent
    /// sweep workers never double-pay a vendor.
    #[instrument(skip(self))]
    pub async fn sweep_escrow(&self) -> Result<EscrowSweepResult, ServiceError> {
        let now = Utc::now();

        let candidates = PaymentEntity::find()
            .filter(payment::Column::Status.eq(PaymentStatus::Captured.as_str()))
            .filter(payment::Column::IsEscrow.eq(true))
            .filter(payment::Column::EscrowReleasedAt.is_null())
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut released_count = 0u64;
        let mut released_total = Decimal::ZERO;
        let mut skipped_count = 0u64;

        for candidate in candidates {
            let order = OrderEntity::find_by_id(candidate.order_id)
                .one(&*self.db)
                .await
                .map_err(ServiceError::db_error)?;
            let Some(order) = order else {
                warn!(payment_id = %candidate.id, "Escrow candidate without order");
                continue;
            };

            if !escrow_eligible(&order, &candidate, now) {
                continue;
            }

            let payment_id = candidate.id;
            let outcome = with_retry("escrow_release", || {
                Box::pin(self.release_one(payment_id))
            })
            .await;

            match outcome {
                Ok(amount) => {
                    released_count += 1;
                    released_total += amount;
                }
                Err(ServiceError::InvalidOperation(_)) => skipped_count += 1,
                Err(err) => {
                    warn!(payment_id = %payment_id, error = %err, "Escrow release failed");
                }
            }
        }

        if released_count > 0 {
            info!(released_count, %released_total, "Escrow sweep completed");
        }

        Ok(EscrowSweepResult {
            released_count,
            released_total,
            skipped_count,
            swept_at: now,
        })
    }

    async fn release_one(&self, payment_id: Uuid) -> Result<Decimal, ServiceError> {
        let db = &*self.db;
        let now = Utc::now();
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let held = PaymentEntity::find_by_id(payment_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Payment {} not found", payment_id)))?;

        if held.escrow_released_at.is_some()
            || PaymentStatus::from_str(&held.status) != Some(PaymentStatus::Captured)
        {
            return Err(ServiceError::InvalidOperation(format!(
                "Payment {} is no longer releasable",
                payment_id
            )));
        }

        let order = OrderEntity::find_by_id(held.order_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", held.order_id)))?;

        let commission = order.commission_amount.unwrap_or(Decimal::ZERO);
        let release = (order.total_amount - commission - held.refunded_amount).max(Decimal::ZERO);

        let claimed = PaymentEntity::update_many()
            .col_expr(
                payment::Column::EscrowReleasedAt,
                Expr::value(Some(now)),
            )
            .col_expr(
                payment::Column::EscrowReleaseAmount,
                Expr::value(Some(release)),
            )
            .col_expr(payment::Column::UpdatedAt, Expr::value(Some(now)))
            .filter(payment::Column::Id.eq(payment_id))
            .filter(payment::Column::Status.eq(PaymentStatus::Captured.as_str()))
            .filter(payment::Column::EscrowReleasedAt.is_null())
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        if claimed.rows_affected == 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "Payment {} claimed by another sweep worker",
                payment_id
            )));
        }

        let vendor_row = VendorEntity::find_by_id(order.vendor_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Vendor {} not found", order.vendor_id))
            })?;

        let balance_before = vendor_row.wallet_balance;
        let balance_after = balance_before + release;

        let credited = VendorEntity::update_many()
            .col_expr(
                vendor::Column::WalletBalance,
                Expr::value(balance_after),
            )
            .col_expr(vendor::Column::UpdatedAt, Expr::value(Some(now)))
            .filter(vendor::Column::Id.eq(vendor_row.id))
            .filter(vendor::Column::WalletBalance.eq(balance_before))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        if credited.rows_affected == 0 {
            return Err(ServiceError::SerializationConflict(format!(
                "Vendor {} wallet changed concurrently",
                vendor_row.id
            )));
        }

        let ledger_entry = vendor_transaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            vendor_id: Set(vendor_row.id),
            order_id: Set(Some(order.id)),
            transaction_type: Set(VendorTransactionType::EscrowRelease.as_str().to_string()),
            amount: Set(release),
            balance_before: Set(balance_before),
            balance_after: Set(balance_after),
            description: Set(Some(format!(
                "Escrow release for order {}",
                order.order_number
            ))),
            created_at: Set(now),
        };
        ledger_entry.insert(&txn).await.map_err(ServiceError::db_error)?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        let _ = self
            .event_sender
            .send(Event::EscrowReleased {
                payment_id,
                vendor_id: vendor_row.id,
                amount: release,
                released_at: now,
            })
            .await;

        info!(
            payment_id = %payment_id,
            vendor_id = %vendor_row.id,
            amount = %release,
            "Escrow released to vendor wallet"
        );

        Ok(release)
    }

    /// Wallet ledger for a vendor, newest first.
    pub async fn vendor_ledger(
        &self,
        vendor_id: Uuid,
    ) -> Result<Vec<vendor_transaction::Model>, ServiceError> {
        vendor_transaction::Entity::find()
            .filter(vendor_transaction::Column::VendorId.eq(vendor_id))
            .order_by_desc(vendor_transaction::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }
}

/// Release condition: delivered (or completed) order, hold period elapsed,
/// no open dispute. A `disputed` order simply fails the status check.
fn escrow_eligible(order: &order::Model, held: &payment::Model, now: DateTime<Utc>) -> bool {
    let delivered = matches!(
        OrderStatus::from_str(&order.status),
        Some(OrderStatus::Delivered) | Some(OrderStatus::Completed)
    );
    if !delivered {
        return false;
    }
    match order.delivered_at {
        Some(delivered_at) => delivered_at + Duration::days(held.escrow_hold_days as i64) <= now,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn commission_is_rate_plus_fixed() {
        let terms = CommissionTerms {
            rate: dec!(15.00),
            fixed: dec!(5.00),
        };
        assert_eq!(commission_amount(dec!(1000.00), &terms), dec!(155.00));
    }

    #[test]
    fn commission_rounds_to_currency_precision() {
        let terms = CommissionTerms {
            rate: dec!(12.50),
            fixed: Decimal::ZERO,
        };
        assert_eq!(commission_amount(dec!(99.99), &terms), dec!(12.50));
    }

    fn order_fixture(status: OrderStatus, delivered_at: Option<DateTime<Utc>>) -> order::Model {
        order::Model {
            id: Uuid::new_v4(),
            order_number: "ORD-TEST".to_string(),
            user_id: None,
            vendor_id: Uuid::new_v4(),
            status: status.as_str().to_string(),
            customer_email: None,
            customer_phone: None,
            customer_name: None,
            subtotal: dec!(100.00),
            discount_amount: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            delivery_fee: Decimal::ZERO,
            total_amount: dec!(100.00),
            commission_rate: Some(dec!(15.00)),
            commission_fixed: Some(Decimal::ZERO),
            commission_amount: Some(dec!(15.00)),
            vendor_payout: Some(dec!(85.00)),
            promo_code: None,
            customer_segment: None,
            cancellation_reason: None,
            created_at: Utc::now(),
            updated_at: None,
            confirmed_at: None,
            processing_at: None,
            shipped_at: None,
            delivered_at,
            cancelled_at: None,
            completed_at: None,
        }
    }

    fn payment_fixture(hold_days: i32) -> payment::Model {
        payment::Model {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            method: None,
            status: PaymentStatus::Captured.as_str().to_string(),
            amount: dec!(100.00),
            currency: "USD".to_string(),
            provider_txn_id: None,
            error_message: None,
            is_escrow: true,
            escrow_hold_days: hold_days,
            escrow_released_at: None,
            escrow_release_amount: None,
            refundable_amount: Some(dec!(100.00)),
            refunded_amount: Decimal::ZERO,
            created_at: Utc::now(),
            updated_at: None,
            processed_at: None,
            failed_at: None,
            refunded_at: None,
        }
    }

    #[test]
    fn escrow_waits_out_the_hold_period() {
        let now = Utc::now();
        let held = payment_fixture(7);

        let young = order_fixture(OrderStatus::Delivered, Some(now - Duration::days(3)));
        assert!(!escrow_eligible(&young, &held, now));

        let ripe = order_fixture(OrderStatus::Delivered, Some(now - Duration::days(8)));
        assert!(escrow_eligible(&ripe, &held, now));
    }

    #[test]
    fn disputed_orders_never_release() {
        let now = Utc::now();
        let held = payment_fixture(7);
        let disputed = order_fixture(OrderStatus::Disputed, Some(now - Duration::days(30)));
        assert!(!escrow_eligible(&disputed, &held, now));
    }

    #[test]
    fn undelivered_orders_never_release() {
        let now = Utc::now();
        let held = payment_fixture(0);
        let shipped = order_fixture(OrderStatus::Shipped, None);
        assert!(!escrow_eligible(&shipped, &held, now));
    }
}
