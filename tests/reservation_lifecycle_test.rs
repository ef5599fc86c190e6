mod common;

use assert_matches::assert_matches;
use chrono::Duration;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use marketplace_core::entities::stock_movement::{self, Entity as StockMovementEntity};
use marketplace_core::entities::stock_reservation::ReservationStatus;
use marketplace_core::errors::ServiceError;

#[tokio::test]
async fn reserve_holds_stock_and_keeps_the_invariant() {
    let ctx = common::setup().await;
    let vendor = common::seed_vendor(&ctx, Decimal::from(10), Decimal::ZERO).await;
    let product = common::seed_product(&ctx, vendor.id, Decimal::from(20)).await;
    let warehouse = Uuid::new_v4();
    let stock = common::seed_stock(&ctx, product.product_id, warehouse, 10).await;

    let reservation = ctx
        .services
        .reservations
        .reserve(stock.id, 4, Uuid::new_v4(), Duration::minutes(15))
        .await
        .unwrap();

    assert_eq!(reservation.status, ReservationStatus::Active.as_str());
    assert_eq!(reservation.quantity, 4);

    let stock = common::fetch_stock(&ctx, stock.id).await;
    assert_eq!(stock.quantity, 10);
    assert_eq!(stock.reserved, 4);
    assert_eq!(stock.available(), 6);
}

#[tokio::test]
async fn reserve_rejects_more_than_available() {
    let ctx = common::setup().await;
    let vendor = common::seed_vendor(&ctx, Decimal::from(10), Decimal::ZERO).await;
    let product = common::seed_product(&ctx, vendor.id, Decimal::from(20)).await;
    let stock = common::seed_stock(&ctx, product.product_id, Uuid::new_v4(), 5).await;

    let result = ctx
        .services
        .reservations
        .reserve(stock.id, 6, Uuid::new_v4(), Duration::minutes(15))
        .await;

    assert_matches!(result, Err(ServiceError::InsufficientStock(_)));

    let stock = common::fetch_stock(&ctx, stock.id).await;
    assert_eq!(stock.reserved, 0);
}

#[tokio::test]
async fn reserve_on_unknown_stock_key_fails() {
    let ctx = common::setup().await;

    let result = ctx
        .services
        .reservations
        .reserve(Uuid::new_v4(), 1, Uuid::new_v4(), Duration::minutes(15))
        .await;

    assert_matches!(result, Err(ServiceError::StockNotFound(_)));
}

// Two simultaneous reserve(3) calls against available=5: exactly one can
// succeed, because the second would leave only 2 units.
#[tokio::test]
async fn concurrent_reservations_cannot_oversell() {
    let ctx = common::setup().await;
    let vendor = common::seed_vendor(&ctx, Decimal::from(10), Decimal::ZERO).await;
    let product = common::seed_product(&ctx, vendor.id, Decimal::from(20)).await;
    let stock = common::seed_stock(&ctx, product.product_id, Uuid::new_v4(), 5).await;

    let svc_a = ctx.services.reservations.clone();
    let svc_b = ctx.services.reservations.clone();
    let stock_id = stock.id;

    let (a, b) = tokio::join!(
        tokio::spawn(async move {
            svc_a
                .reserve(stock_id, 3, Uuid::new_v4(), Duration::minutes(15))
                .await
        }),
        tokio::spawn(async move {
            svc_b
                .reserve(stock_id, 3, Uuid::new_v4(), Duration::minutes(15))
                .await
        }),
    );

    let results = [a.unwrap(), b.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let insufficient = results
        .iter()
        .filter(|r| matches!(r, Err(ServiceError::InsufficientStock(_))))
        .count();

    assert_eq!(successes, 1);
    assert_eq!(insufficient, 1);

    let stock = common::fetch_stock(&ctx, stock.id).await;
    assert_eq!(stock.reserved, 3);
    assert_eq!(stock.available(), 2);
}

#[tokio::test]
async fn many_concurrent_single_unit_reservations_stop_at_capacity() {
    let ctx = common::setup().await;
    let vendor = common::seed_vendor(&ctx, Decimal::from(10), Decimal::ZERO).await;
    let product = common::seed_product(&ctx, vendor.id, Decimal::from(20)).await;
    let stock = common::seed_stock(&ctx, product.product_id, Uuid::new_v4(), 10).await;

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let svc = ctx.services.reservations.clone();
        let stock_id = stock.id;
        tasks.push(tokio::spawn(async move {
            svc.reserve(stock_id, 1, Uuid::new_v4(), Duration::minutes(15))
                .await
                .is_ok()
        }));
    }

    let mut successes = 0;
    for task in tasks {
        if task.await.unwrap() {
            successes += 1;
        }
    }

    assert_eq!(successes, 10, "exactly 10 single-unit reservations succeed");

    let stock = common::fetch_stock(&ctx, stock.id).await;
    assert_eq!(stock.reserved, 10);
    assert_eq!(stock.available(), 0);
}

#[tokio::test]
async fn fulfill_converts_the_hold_into_an_out_movement() {
    let ctx = common::setup().await;
    let vendor = common::seed_vendor(&ctx, Decimal::from(10), Decimal::ZERO).await;
    let product = common::seed_product(&ctx, vendor.id, Decimal::from(20)).await;
    let stock = common::seed_stock(&ctx, product.product_id, Uuid::new_v4(), 10).await;
    let order_id = Uuid::new_v4();

    let reservation = ctx
        .services
        .reservations
        .reserve(stock.id, 4, order_id, Duration::minutes(15))
        .await
        .unwrap();

    let fulfilled = ctx
        .services
        .reservations
        .fulfill(reservation.id)
        .await
        .unwrap();
    assert_eq!(fulfilled.status, ReservationStatus::Fulfilled.as_str());

    // quantity and reserved drop together; available is unchanged.
    let stock_after = common::fetch_stock(&ctx, stock.id).await;
    assert_eq!(stock_after.quantity, 6);
    assert_eq!(stock_after.reserved, 0);
    assert_eq!(stock_after.available(), 6);

    let movements = StockMovementEntity::find()
        .filter(stock_movement::Column::OrderId.eq(order_id))
        .all(&*ctx.db)
        .await
        .unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].movement_type, "out");
    assert_eq!(movements[0].quantity, -4);
    assert_eq!(movements[0].quantity_before, 10);
    assert_eq!(movements[0].quantity_after, 6);
}

#[tokio::test]
async fn fulfill_is_idempotent() {
    let ctx = common::setup().await;
    let vendor = common::seed_vendor(&ctx, Decimal::from(10), Decimal::ZERO).await;
    let product = common::seed_product(&ctx, vendor.id, Decimal::from(20)).await;
    let stock = common::seed_stock(&ctx, product.product_id, Uuid::new_v4(), 10).await;
    let order_id = Uuid::new_v4();

    let reservation = ctx
        .services
        .reservations
        .reserve(stock.id, 3, order_id, Duration::minutes(15))
        .await
        .unwrap();

    ctx.services.reservations.fulfill(reservation.id).await.unwrap();
    let second = ctx.services.reservations.fulfill(reservation.id).await.unwrap();
    assert_eq!(second.status, ReservationStatus::Fulfilled.as_str());

    // One movement, not two, and no double decrement.
    let movements = StockMovementEntity::find()
        .filter(stock_movement::Column::OrderId.eq(order_id))
        .all(&*ctx.db)
        .await
        .unwrap();
    assert_eq!(movements.len(), 1);

    let stock_after = common::fetch_stock(&ctx, stock.id).await;
    assert_eq!(stock_after.quantity, 7);
    assert_eq!(stock_after.reserved, 0);
}

#[tokio::test]
async fn release_returns_the_hold_to_the_pool() {
    let ctx = common::setup().await;
    let vendor = common::seed_vendor(&ctx, Decimal::from(10), Decimal::ZERO).await;
    let product = common::seed_product(&ctx, vendor.id, Decimal::from(20)).await;
    let stock = common::seed_stock(&ctx, product.product_id, Uuid::new_v4(), 10).await;

    let reservation = ctx
        .services
        .reservations
        .reserve(stock.id, 5, Uuid::new_v4(), Duration::minutes(15))
        .await
        .unwrap();

    let released = ctx
        .services
        .reservations
        .release(reservation.id, "customer abandoned checkout")
        .await
        .unwrap();
    assert_eq!(released.status, ReservationStatus::Released.as_str());
    assert_eq!(
        released.release_reason.as_deref(),
        Some("customer abandoned checkout")
    );

    let stock_after = common::fetch_stock(&ctx, stock.id).await;
    assert_eq!(stock_after.quantity, 10);
    assert_eq!(stock_after.reserved, 0);
}

#[tokio::test]
async fn terminal_reservations_reject_further_transitions() {
    let ctx = common::setup().await;
    let vendor = common::seed_vendor(&ctx, Decimal::from(10), Decimal::ZERO).await;
    let product = common::seed_product(&ctx, vendor.id, Decimal::from(20)).await;
    let stock = common::seed_stock(&ctx, product.product_id, Uuid::new_v4(), 10).await;

    let reservation = ctx
        .services
        .reservations
        .reserve(stock.id, 2, Uuid::new_v4(), Duration::minutes(15))
        .await
        .unwrap();
    ctx.services
        .reservations
        .release(reservation.id, "test")
        .await
        .unwrap();

    assert_matches!(
        ctx.services.reservations.fulfill(reservation.id).await,
        Err(ServiceError::InvalidTransition(_))
    );
    assert_matches!(
        ctx.services.reservations.release(reservation.id, "again").await,
        Err(ServiceError::InvalidTransition(_))
    );
}

// A reservation that was never fulfilled is swept after expiry; `reserved`
// returns to its pre-reservation value.
#[tokio::test]
async fn expiry_sweep_returns_abandoned_holds() {
    let ctx = common::setup().await;
    let vendor = common::seed_vendor(&ctx, Decimal::from(10), Decimal::ZERO).await;
    let product = common::seed_product(&ctx, vendor.id, Decimal::from(20)).await;
    let stock = common::seed_stock(&ctx, product.product_id, Uuid::new_v4(), 10).await;

    // Already past its expiry when the sweep runs.
    let reservation = ctx
        .services
        .reservations
        .reserve(stock.id, 4, Uuid::new_v4(), Duration::seconds(-1))
        .await
        .unwrap();

    let stock_during = common::fetch_stock(&ctx, stock.id).await;
    assert_eq!(stock_during.reserved, 4);

    let result = ctx.services.reservations.sweep_expired().await.unwrap();
    assert_eq!(result.expired_count, 1);

    let swept = ctx
        .services
        .reservations
        .get_reservation(reservation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(swept.status, ReservationStatus::Expired.as_str());
    assert_eq!(swept.release_reason.as_deref(), Some("expired"));

    let stock_after = common::fetch_stock(&ctx, stock.id).await;
    assert_eq!(stock_after.quantity, 10);
    assert_eq!(stock_after.reserved, 0);

    // A second sweep finds nothing; `reserved` was returned exactly once.
    let again = ctx.services.reservations.sweep_expired().await.unwrap();
    assert_eq!(again.expired_count, 0);
    let stock_final = common::fetch_stock(&ctx, stock.id).await;
    assert_eq!(stock_final.reserved, 0);
}

#[tokio::test]
async fn sweep_leaves_unexpired_reservations_alone() {
    let ctx = common::setup().await;
    let vendor = common::seed_vendor(&ctx, Decimal::from(10), Decimal::ZERO).await;
    let product = common::seed_product(&ctx, vendor.id, Decimal::from(20)).await;
    let stock = common::seed_stock(&ctx, product.product_id, Uuid::new_v4(), 10).await;

    let reservation = ctx
        .services
        .reservations
        .reserve(stock.id, 3, Uuid::new_v4(), Duration::minutes(15))
        .await
        .unwrap();

    let result = ctx.services.reservations.sweep_expired().await.unwrap();
    assert_eq!(result.expired_count, 0);

    let untouched = ctx
        .services
        .reservations
        .get_reservation(reservation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(untouched.status, ReservationStatus::Active.as_str());
}
