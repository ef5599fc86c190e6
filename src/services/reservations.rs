//! Reservation Manager
//!
//! Creates time-bounded holds against the stock ledger and drives each
//! reservation to exactly one terminal state. The oversell race is guarded
//! by an atomic conditional update on the stock record: the `reserved`
//! increment only lands when `quantity - reserved` still covers the
//! requested amount, so two concurrent reservations can never both commit
//! against the same units.
//!
//! The `*_in` variants run on a caller-supplied connection so order
//! assembly can reserve and fulfill inside its own transaction; the public
//! methods wrap them in a transaction plus contention retry.

use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::db::with_retry;
use crate::entities::stock_movement::{self, MovementType};
use crate::entities::stock_record::{self, Entity as StockRecordEntity};
use crate::entities::stock_reservation::{
    self, Entity as StockReservationEntity, ReservationStatus,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Result of one expiry sweep pass.
#[derive(Debug, Clone)]
pub struct SweepResult {
    /// Reservations this worker claimed and expired.
    pub expired_count: u64,
    /// Candidates another worker claimed first.
    pub skipped_count: u64,
    pub swept_at: DateTime<Utc>,
}

/// Service for stock reservations.
#[derive(Clone)]
pub struct ReservationService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl ReservationService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Places a hold of `quantity` units for `order_id`.
    ///
    /// Fails with `InsufficientStock` when the pool cannot cover the
    /// request; that error is surfaced to the caller, never retried.
    #[instrument(skip(self), fields(stock_record_id = %stock_record_id, order_id = %order_id, quantity = quantity))]
    pub async fn reserve(
        &self,
        stock_record_id: Uuid,
        quantity: i32,
        order_id: Uuid,
        ttl: Duration,
    ) -> Result<stock_reservation::Model, ServiceError> {
        let reservation = with_retry("reserve", || {
            Box::pin(async move {
                let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
                let reservation = self
                    .reserve_in(&txn, stock_record_id, quantity, order_id, ttl)
                    .await?;
                txn.commit().await.map_err(ServiceError::db_error)?;
                Ok(reservation)
            })
        })
        .await?;

        let _ = self
            .event_sender
            .send(Event::StockReserved {
                stock_record_id,
                order_id,
                quantity,
            })
            .await;

        Ok(reservation)
    }

    /// Reservation step on a caller-supplied connection. The guard and the
    /// `reserved` increment are one statement, so a stale read of
    /// `available` can never over-commit stock.
    pub async fn reserve_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        stock_record_id: Uuid,
        quantity: i32,
        order_id: Uuid,
        ttl: Duration,
    ) -> Result<stock_reservation::Model, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Reservation quantity must be positive".to_string(),
            ));
        }

        let now = Utc::now();

        let claimed = StockRecordEntity::update_many()
            .col_expr(
                stock_record::Column::Reserved,
                Expr::col(stock_record::Column::Reserved).add(quantity),
            )
            .col_expr(stock_record::Column::UpdatedAt, Expr::value(Some(now)))
            .filter(stock_record::Column::Id.eq(stock_record_id))
            .filter(
                Expr::expr(
                    Expr::col(stock_record::Column::Quantity)
                        .sub(Expr::col(stock_record::Column::Reserved)),
                )
                .gte(quantity),
            )
            .exec(conn)
            .await
            .map_err(ServiceError::db_error)?;

        if claimed.rows_affected == 0 {
            let record = StockRecordEntity::find_by_id(stock_record_id)
                .one(conn)
                .await
                .map_err(ServiceError::db_error)?;
            return match record {
                None => Err(ServiceError::StockNotFound(stock_record_id.to_string())),
                Some(record) => Err(ServiceError::InsufficientStock(format!(
                    "Requested {} but only {} available for stock record {}",
                    quantity,
                    record.available(),
                    stock_record_id
                ))),
            };
        }

        let reservation = stock_reservation::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            stock_record_id: Set(stock_record_id),
            quantity: Set(quantity),
            status: Set(ReservationStatus::Active.as_str().to_string()),
            expires_at: Set(now + ttl),
            release_reason: Set(None),
            created_at: Set(now),
            released_at: Set(None),
            fulfilled_at: Set(None),
        };
        let reservation = reservation
            .insert(conn)
            .await
            .map_err(ServiceError::db_error)?;

        info!(
            reservation_id = %reservation.id,
            expires_at = %reservation.expires_at,
            "Reservation placed"
        );

        Ok(reservation)
    }

    /// Converts an active reservation into a permanent stock decrement.
    ///
    /// `quantity` and `reserved` drop together, leaving `available`
    /// unchanged, and an `out` movement is appended. Idempotent: calling
    /// fulfill on an already-fulfilled reservation is a no-op.
    #[instrument(skip(self), fields(reservation_id = %reservation_id))]
    pub async fn fulfill(
        &self,
        reservation_id: Uuid,
    ) -> Result<stock_reservation::Model, ServiceError> {
        with_retry("fulfill", || {
            Box::pin(async move {
                let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
                let fulfilled = self.fulfill_in(&txn, reservation_id).await?;
                txn.commit().await.map_err(ServiceError::db_error)?;
                Ok(fulfilled)
            })
        })
        .await
    }

    pub async fn fulfill_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        reservation_id: Uuid,
    ) -> Result<stock_reservation::Model, ServiceError> {
        let now = Utc::now();

        let reservation = StockReservationEntity::find_by_id(reservation_id)
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Reservation {} not found", reservation_id))
            })?;

        match ReservationStatus::from_str(&reservation.status) {
            Some(ReservationStatus::Active) => {}
            Some(ReservationStatus::Fulfilled) => {
                // Already converted; exactly one movement exists.
                return Ok(reservation);
            }
            _ => {
                return Err(ServiceError::InvalidTransition(format!(
                    "Cannot fulfill reservation {} in status {}",
                    reservation_id, reservation.status
                )));
            }
        }

        let claimed = StockReservationEntity::update_many()
            .col_expr(
                stock_reservation::Column::Status,
                Expr::value(ReservationStatus::Fulfilled.as_str()),
            )
            .col_expr(
                stock_reservation::Column::FulfilledAt,
                Expr::value(Some(now)),
            )
            .filter(stock_reservation::Column::Id.eq(reservation_id))
            .filter(stock_reservation::Column::Status.eq(ReservationStatus::Active.as_str()))
            .exec(conn)
            .await
            .map_err(ServiceError::db_error)?;

        if claimed.rows_affected == 0 {
            // Raced with another worker; the retry re-reads the new state.
            return Err(ServiceError::SerializationConflict(format!(
                "Reservation {} claimed concurrently",
                reservation_id
            )));
        }

        let record = StockRecordEntity::find_by_id(reservation.stock_record_id)
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::StockNotFound(reservation.stock_record_id.to_string()))?;

        let before = record.quantity;
        let after = before - reservation.quantity;

        let updated = StockRecordEntity::update_many()
            .col_expr(stock_record::Column::Quantity, Expr::value(after))
            .col_expr(
                stock_record::Column::Reserved,
                Expr::col(stock_record::Column::Reserved).sub(reservation.quantity),
            )
            .col_expr(stock_record::Column::LastSoldAt, Expr::value(Some(now)))
            .col_expr(stock_record::Column::UpdatedAt, Expr::value(Some(now)))
            .filter(stock_record::Column::Id.eq(record.id))
            .filter(stock_record::Column::Quantity.eq(before))
            .filter(stock_record::Column::Reserved.gte(reservation.quantity))
            .exec(conn)
            .await
            .map_err(ServiceError::db_error)?;

        if updated.rows_affected == 0 {
            return Err(ServiceError::SerializationConflict(format!(
                "Concurrent update on stock record {}",
                record.id
            )));
        }

        let movement = stock_movement::ActiveModel {
            id: Set(Uuid::new_v4()),
            stock_record_id: Set(record.id),
            order_id: Set(Some(reservation.order_id)),
            movement_type: Set(MovementType::Out.as_str().to_string()),
            quantity: Set(-reservation.quantity),
            quantity_before: Set(before),
            quantity_after: Set(after),
            unit_cost: Set(record.average_cost),
            reference_type: Set(Some("order".to_string())),
            reference_number: Set(None),
            reason: Set(Some("reservation fulfilled".to_string())),
            actor_id: Set(None),
            created_at: Set(now),
        };
        movement.insert(conn).await.map_err(ServiceError::db_error)?;

        info!(
            reservation_id = %reservation_id,
            stock_record_id = %record.id,
            quantity = reservation.quantity,
            "Reservation fulfilled"
        );

        let mut fulfilled = reservation;
        fulfilled.status = ReservationStatus::Fulfilled.as_str().to_string();
        fulfilled.fulfilled_at = Some(now);
        Ok(fulfilled)
    }

    /// Returns a hold to the pool. Allowed only from `active`.
    #[instrument(skip(self), fields(reservation_id = %reservation_id, reason = reason))]
    pub async fn release(
        &self,
        reservation_id: Uuid,
        reason: &str,
    ) -> Result<stock_reservation::Model, ServiceError> {
        let released = with_retry("release", || {
            Box::pin(async move {
                let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
                let released = self
                    .terminate_in(&txn, reservation_id, ReservationStatus::Released, reason)
                    .await?;
                txn.commit().await.map_err(ServiceError::db_error)?;
                Ok(released)
            })
        })
        .await?;

        let _ = self
            .event_sender
            .send(Event::ReservationReleased {
                reservation_id,
                reason: reason.to_string(),
            })
            .await;

        Ok(released)
    }

    /// Shared terminal path for release and expiry: claim the active row,
    /// then hand the reserved units back. The claim makes the `reserved`
    /// decrement happen exactly once no matter how many workers race.
    pub async fn terminate_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        reservation_id: Uuid,
        to_status: ReservationStatus,
        reason: &str,
    ) -> Result<stock_reservation::Model, ServiceError> {
        debug_assert!(matches!(
            to_status,
            ReservationStatus::Released | ReservationStatus::Expired
        ));

        let now = Utc::now();

        let reservation = StockReservationEntity::find_by_id(reservation_id)
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Reservation {} not found", reservation_id))
            })?;

        if ReservationStatus::from_str(&reservation.status) != Some(ReservationStatus::Active) {
            return Err(ServiceError::InvalidTransition(format!(
                "Cannot release reservation {} in status {}",
                reservation_id, reservation.status
            )));
        }

        let claimed = StockReservationEntity::update_many()
            .col_expr(
                stock_reservation::Column::Status,
                Expr::value(to_status.as_str()),
            )
            .col_expr(
                stock_reservation::Column::ReleasedAt,
                Expr::value(Some(now)),
            )
            .col_expr(
                stock_reservation::Column::ReleaseReason,
                Expr::value(Some(reason.to_string())),
            )
            .filter(stock_reservation::Column::Id.eq(reservation_id))
            .filter(stock_reservation::Column::Status.eq(ReservationStatus::Active.as_str()))
            .exec(conn)
            .await
            .map_err(ServiceError::db_error)?;

        if claimed.rows_affected == 0 {
            return Err(ServiceError::SerializationConflict(format!(
                "Reservation {} claimed concurrently",
                reservation_id
            )));
        }

        let updated = StockRecordEntity::update_many()
            .col_expr(
                stock_record::Column::Reserved,
                Expr::col(stock_record::Column::Reserved).sub(reservation.quantity),
            )
            .col_expr(stock_record::Column::UpdatedAt, Expr::value(Some(now)))
            .filter(stock_record::Column::Id.eq(reservation.stock_record_id))
            .filter(stock_record::Column::Reserved.gte(reservation.quantity))
            .exec(conn)
            .await
            .map_err(ServiceError::db_error)?;

        if updated.rows_affected == 0 {
            return Err(ServiceError::InternalError(format!(
                "Reserved count on stock record {} does not cover reservation {}",
                reservation.stock_record_id, reservation_id
            )));
        }

        info!(
            reservation_id = %reservation_id,
            to_status = to_status.as_str(),
            "Reservation terminated"
        );

        let mut terminated = reservation;
        terminated.status = to_status.as_str().to_string();
        terminated.released_at = Some(now);
        terminated.release_reason = Some(reason.to_string());
        Ok(terminated)
    }

    /// Expires overdue reservations, returning their stock to the pool.
    ///
    /// Safe to run from multiple workers at once: each candidate is claimed
    /// with a conditional status update before its `reserved` units are
    /// returned, so a row is never processed twice.
    #[instrument(skip(self))]
    pub async fn sweep_expired(&self) -> Result<SweepResult, ServiceError> {
        let now = Utc::now();

        let candidates = StockReservationEntity::find()
            .filter(stock_reservation::Column::Status.eq(ReservationStatus::Active.as_str()))
            .filter(stock_reservation::Column::ExpiresAt.lt(now))
            .order_by_asc(stock_reservation::Column::ExpiresAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut expired_count = 0u64;
        let mut skipped_count = 0u64;

        for candidate in candidates {
            let reservation_id = candidate.id;
            let outcome = with_retry("expire", || {
                Box::pin(async move {
                    let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
                    let expired = self
                        .terminate_in(&txn, reservation_id, ReservationStatus::Expired, "expired")
                        .await?;
                    txn.commit().await.map_err(ServiceError::db_error)?;
                    Ok(expired)
                })
            })
            .await;

            match outcome {
                Ok(_) => {
                    expired_count += 1;
                    let _ = self
                        .event_sender
                        .send(Event::ReservationExpired(reservation_id))
                        .await;
                }
                // Another sweep worker, or a racing fulfill/release, got
                // there first.
                Err(ServiceError::InvalidTransition(_)) => skipped_count += 1,
                Err(err) => {
                    warn!(
                        reservation_id = %reservation_id,
                        error = %err,
                        "Failed to expire reservation"
                    );
                }
            }
        }

        if expired_count > 0 {
            info!(expired_count, skipped_count, "Expiry sweep completed");
        }

        Ok(SweepResult {
            expired_count,
            skipped_count,
            swept_at: now,
        })
    }

    pub async fn get_reservation(
        &self,
        reservation_id: Uuid,
    ) -> Result<Option<stock_reservation::Model>, ServiceError> {
        StockReservationEntity::find_by_id(reservation_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Reservations belonging to an order, newest first.
    pub async fn reservations_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<stock_reservation::Model>, ServiceError> {
        StockReservationEntity::find()
            .filter(stock_reservation::Column::OrderId.eq(order_id))
            .order_by_desc(stock_reservation::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Still-active reservations for an order, on a caller connection.
    pub async fn active_for_order_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        order_id: Uuid,
    ) -> Result<Vec<stock_reservation::Model>, ServiceError> {
        StockReservationEntity::find()
            .filter(stock_reservation::Column::OrderId.eq(order_id))
            .filter(stock_reservation::Column::Status.eq(ReservationStatus::Active.as_str()))
            .all(conn)
            .await
            .map_err(ServiceError::db_error)
    }
}
