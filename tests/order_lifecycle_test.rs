mod common;

use assert_matches::assert_matches;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use marketplace_core::entities::order::OrderStatus;
use marketplace_core::entities::order_item::{self, Entity as OrderItemEntity};
use marketplace_core::entities::promo_code::Entity as PromoCodeEntity;
use marketplace_core::entities::stock_reservation::ReservationStatus;
use marketplace_core::errors::ServiceError;
use marketplace_core::services::orders::{CheckoutLine, CheckoutRequest};

fn checkout(warehouse_id: Uuid, lines: Vec<CheckoutLine>) -> CheckoutRequest {
    CheckoutRequest {
        user_id: Some(Uuid::new_v4()),
        warehouse_id,
        lines,
        promo_codes: Vec::new(),
        customer_segment: None,
        customer_email: Some("buyer@example.com".to_string()),
        customer_phone: Some("+380501234567".to_string()),
        customer_name: Some("Test Buyer".to_string()),
        delivery_fee: Decimal::ZERO,
        payment_authorized: false,
    }
}

// subtotal 1000, discount 100, tax 0, delivery fee 50 => total 950.
#[tokio::test]
async fn order_totals_satisfy_the_money_invariant() {
    let ctx = common::setup().await;
    let vendor = common::seed_vendor(&ctx, dec!(10.00), Decimal::ZERO).await;
    let product = common::seed_product(&ctx, vendor.id, dec!(500.00)).await;
    let warehouse = Uuid::new_v4();
    common::seed_stock(&ctx, product.product_id, warehouse, 10).await;
    common::seed_promo_code(&ctx, "MINUS100", |promo| {
        promo.discount_type = Set("fixed".to_string());
        promo.discount_value = Set(dec!(100.00));
    })
    .await;

    let mut request = checkout(
        warehouse,
        vec![CheckoutLine {
            product_id: product.product_id,
            variant_id: None,
            quantity: 2,
        }],
    );
    request.promo_codes = vec!["MINUS100".to_string()];
    request.delivery_fee = dec!(50.00);

    let order = ctx.services.orders.place_order(request).await.unwrap();

    assert_eq!(order.subtotal, dec!(1000.00));
    assert_eq!(order.discount_amount, dec!(100.00));
    assert_eq!(order.tax_amount, Decimal::ZERO);
    assert_eq!(order.delivery_fee, dec!(50.00));
    assert_eq!(order.total_amount, dec!(950.00));
    assert_eq!(
        order.total_amount,
        order.subtotal - order.discount_amount + order.tax_amount + order.delivery_fee
    );
    assert_eq!(order.promo_code.as_deref(), Some("MINUS100"));

    // Commission follows the vendor default: 10% of subtotal.
    assert_eq!(order.commission_amount, Some(dec!(100.00)));
    assert_eq!(order.vendor_payout, Some(dec!(850.00)));
}

#[tokio::test]
async fn order_items_snapshot_the_catalog() {
    let ctx = common::setup().await;
    let vendor = common::seed_vendor(&ctx, dec!(10.00), Decimal::ZERO).await;
    let product = common::seed_product(&ctx, vendor.id, dec!(75.50)).await;
    let warehouse = Uuid::new_v4();
    common::seed_stock(&ctx, product.product_id, warehouse, 5).await;

    let order = ctx
        .services
        .orders
        .place_order(checkout(
            warehouse,
            vec![CheckoutLine {
                product_id: product.product_id,
                variant_id: None,
                quantity: 2,
            }],
        ))
        .await
        .unwrap();

    let items = OrderItemEntity::find()
        .filter(order_item::Column::OrderId.eq(order.id))
        .all(&*ctx.db)
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].product_name, product.name);
    assert_eq!(items[0].product_sku, product.sku);
    assert_eq!(items[0].unit_price, dec!(75.50));
    assert_eq!(items[0].quantity, 2);
    assert_eq!(items[0].total_price, dec!(151.00));
}

#[tokio::test]
async fn placing_an_order_is_all_or_nothing() {
    let ctx = common::setup().await;
    let vendor = common::seed_vendor(&ctx, dec!(10.00), Decimal::ZERO).await;
    let plentiful = common::seed_product(&ctx, vendor.id, dec!(10.00)).await;
    let scarce = common::seed_product(&ctx, vendor.id, dec!(10.00)).await;
    let warehouse = Uuid::new_v4();
    let plentiful_stock = common::seed_stock(&ctx, plentiful.product_id, warehouse, 100).await;
    common::seed_stock(&ctx, scarce.product_id, warehouse, 1).await;

    let result = ctx
        .services
        .orders
        .place_order(checkout(
            warehouse,
            vec![
                CheckoutLine {
                    product_id: plentiful.product_id,
                    variant_id: None,
                    quantity: 5,
                },
                CheckoutLine {
                    product_id: scarce.product_id,
                    variant_id: None,
                    quantity: 2,
                },
            ],
        ))
        .await;

    assert_matches!(result, Err(ServiceError::InsufficientStock(_)));

    // The first line's reservation rolled back with the order.
    let stock = common::fetch_stock(&ctx, plentiful_stock.id).await;
    assert_eq!(stock.reserved, 0);
}

#[tokio::test]
async fn authorized_payment_confirms_and_fulfills_immediately() {
    let ctx = common::setup().await;
    let vendor = common::seed_vendor(&ctx, dec!(10.00), Decimal::ZERO).await;
    let product = common::seed_product(&ctx, vendor.id, dec!(30.00)).await;
    let warehouse = Uuid::new_v4();
    let stock = common::seed_stock(&ctx, product.product_id, warehouse, 10).await;

    let mut request = checkout(
        warehouse,
        vec![CheckoutLine {
            product_id: product.product_id,
            variant_id: None,
            quantity: 3,
        }],
    );
    request.payment_authorized = true;

    let order = ctx.services.orders.place_order(request).await.unwrap();
    assert_eq!(order.status, OrderStatus::Confirmed.as_str());
    assert!(order.confirmed_at.is_some());

    // Inventory was fulfilled at confirmation.
    let stock = common::fetch_stock(&ctx, stock.id).await;
    assert_eq!(stock.quantity, 7);
    assert_eq!(stock.reserved, 0);

    let reservations = ctx
        .services
        .reservations
        .reservations_for_order(order.id)
        .await
        .unwrap();
    assert!(reservations
        .iter()
        .all(|r| r.status == ReservationStatus::Fulfilled.as_str()));

    let history = ctx.services.orders.status_history(order.id).await.unwrap();
    let edges: Vec<(Option<&str>, &str)> = history
        .iter()
        .map(|h| (h.from_status.as_deref(), h.to_status.as_str()))
        .collect();
    assert_eq!(edges, vec![(None, "draft"), (Some("draft"), "confirmed")]);
}

#[tokio::test]
async fn invalid_edges_are_rejected() {
    let ctx = common::setup().await;
    let vendor = common::seed_vendor(&ctx, dec!(10.00), Decimal::ZERO).await;
    let product = common::seed_product(&ctx, vendor.id, dec!(30.00)).await;
    let warehouse = Uuid::new_v4();
    common::seed_stock(&ctx, product.product_id, warehouse, 10).await;

    let order = ctx
        .services
        .orders
        .place_order(checkout(
            warehouse,
            vec![CheckoutLine {
                product_id: product.product_id,
                variant_id: None,
                quantity: 1,
            }],
        ))
        .await
        .unwrap();

    // draft -> shipped skips confirmation and processing.
    let result = ctx
        .services
        .orders
        .transition(order.id, OrderStatus::Shipped, None, None)
        .await;
    assert_matches!(result, Err(ServiceError::InvalidTransition(_)));

    // Same-status transitions are rejected too.
    let result = ctx
        .services
        .orders
        .transition(order.id, OrderStatus::Draft, None, None)
        .await;
    assert_matches!(result, Err(ServiceError::InvalidTransition(_)));
}

#[tokio::test]
async fn cancellation_releases_holds_and_records_the_reason() {
    let ctx = common::setup().await;
    let vendor = common::seed_vendor(&ctx, dec!(10.00), Decimal::ZERO).await;
    let product = common::seed_product(&ctx, vendor.id, dec!(30.00)).await;
    let warehouse = Uuid::new_v4();
    let stock = common::seed_stock(&ctx, product.product_id, warehouse, 10).await;

    let order = ctx
        .services
        .orders
        .place_order(checkout(
            warehouse,
            vec![CheckoutLine {
                product_id: product.product_id,
                variant_id: None,
                quantity: 4,
            }],
        ))
        .await
        .unwrap();

    let held = common::fetch_stock(&ctx, stock.id).await;
    assert_eq!(held.reserved, 4);

    let cancelled = ctx
        .services
        .orders
        .cancel(order.id, Some("changed my mind".to_string()), None)
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled.as_str());
    assert_eq!(
        cancelled.cancellation_reason.as_deref(),
        Some("changed my mind")
    );

    // No ghost holds: the release lands before the cancellation completes.
    let stock = common::fetch_stock(&ctx, stock.id).await;
    assert_eq!(stock.quantity, 10);
    assert_eq!(stock.reserved, 0);

    let reservations = ctx
        .services
        .reservations
        .reservations_for_order(order.id)
        .await
        .unwrap();
    assert!(reservations
        .iter()
        .all(|r| r.status == ReservationStatus::Released.as_str()));

    // Terminal: nothing leaves cancelled.
    let result = ctx
        .services
        .orders
        .transition(order.id, OrderStatus::Confirmed, None, None)
        .await;
    assert_matches!(result, Err(ServiceError::InvalidTransition(_)));
}

#[tokio::test]
async fn full_lifecycle_reaches_completed_with_a_full_audit_trail() {
    let ctx = common::setup().await;
    let vendor = common::seed_vendor(&ctx, dec!(10.00), Decimal::ZERO).await;
    let product = common::seed_product(&ctx, vendor.id, dec!(30.00)).await;
    let warehouse = Uuid::new_v4();
    common::seed_stock(&ctx, product.product_id, warehouse, 10).await;

    let mut request = checkout(
        warehouse,
        vec![CheckoutLine {
            product_id: product.product_id,
            variant_id: None,
            quantity: 1,
        }],
    );
    request.payment_authorized = true;
    let order = ctx.services.orders.place_order(request).await.unwrap();

    let actor = Some(Uuid::new_v4());
    for status in [
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Completed,
    ] {
        ctx.services
            .orders
            .transition(order.id, status, actor, None)
            .await
            .unwrap();
    }

    let final_order = ctx
        .services
        .orders
        .get_order(order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(final_order.status, OrderStatus::Completed.as_str());
    assert!(final_order.shipped_at.is_some());
    assert!(final_order.delivered_at.is_some());
    assert!(final_order.completed_at.is_some());
    assert_eq!(
        final_order.total_amount,
        final_order.subtotal - final_order.discount_amount
            + final_order.tax_amount
            + final_order.delivery_fee
    );

    let history = ctx.services.orders.status_history(order.id).await.unwrap();
    assert_eq!(history.len(), 6); // draft, confirmed, processing, shipped, delivered, completed
    assert!(history[2..].iter().all(|h| h.actor_id == actor));
}

#[tokio::test]
async fn promo_usage_is_consumed_at_confirmation_only() {
    let ctx = common::setup().await;
    let vendor = common::seed_vendor(&ctx, dec!(10.00), Decimal::ZERO).await;
    let product = common::seed_product(&ctx, vendor.id, dec!(100.00)).await;
    let warehouse = Uuid::new_v4();
    common::seed_stock(&ctx, product.product_id, warehouse, 50).await;
    let promo = common::seed_promo_code(&ctx, "TEN", |_| {}).await;

    let mut request = checkout(
        warehouse,
        vec![CheckoutLine {
            product_id: product.product_id,
            variant_id: None,
            quantity: 1,
        }],
    );
    request.promo_codes = vec!["TEN".to_string()];

    // Draft order: priced with the code, but nothing consumed yet.
    let order = ctx.services.orders.place_order(request).await.unwrap();
    assert_eq!(order.discount_amount, dec!(10.00));

    let unconsumed = PromoCodeEntity::find_by_id(promo.id)
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unconsumed.current_usage_count, 0);

    ctx.services
        .orders
        .transition(order.id, OrderStatus::Confirmed, None, None)
        .await
        .unwrap();

    let consumed = PromoCodeEntity::find_by_id(promo.id)
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(consumed.current_usage_count, 1);
}

// usage_limit_per_user = 1: a second order by the same user prices without
// the code even though the first order was cancelled afterwards.
#[tokio::test]
async fn per_user_usage_survives_cancellation() {
    let ctx = common::setup().await;
    let vendor = common::seed_vendor(&ctx, dec!(10.00), Decimal::ZERO).await;
    let product = common::seed_product(&ctx, vendor.id, dec!(100.00)).await;
    let warehouse = Uuid::new_v4();
    common::seed_stock(&ctx, product.product_id, warehouse, 50).await;
    common::seed_promo_code(&ctx, "ONESHOT", |promo| {
        promo.usage_limit_per_user = Set(Some(1));
    })
    .await;

    let user_id = Some(Uuid::new_v4());

    let mut first = checkout(
        warehouse,
        vec![CheckoutLine {
            product_id: product.product_id,
            variant_id: None,
            quantity: 1,
        }],
    );
    first.user_id = user_id;
    first.promo_codes = vec!["ONESHOT".to_string()];
    first.payment_authorized = true;

    let first_order = ctx.services.orders.place_order(first).await.unwrap();
    assert_eq!(first_order.discount_amount, dec!(10.00));

    ctx.services
        .orders
        .cancel(first_order.id, Some("buyer regret".to_string()), None)
        .await
        .unwrap();

    let mut second = checkout(
        warehouse,
        vec![CheckoutLine {
            product_id: product.product_id,
            variant_id: None,
            quantity: 1,
        }],
    );
    second.user_id = user_id;
    second.promo_codes = vec!["ONESHOT".to_string()];

    // Usage is not reversed on cancellation; the code no longer applies.
    let second_order = ctx.services.orders.place_order(second).await.unwrap();
    assert_eq!(second_order.discount_amount, Decimal::ZERO);
    assert_eq!(second_order.promo_code, None);
}

#[tokio::test]
async fn mixed_vendor_carts_are_rejected() {
    let ctx = common::setup().await;
    let vendor_a = common::seed_vendor(&ctx, dec!(10.00), Decimal::ZERO).await;
    let vendor_b = common::seed_vendor(&ctx, dec!(10.00), Decimal::ZERO).await;
    let product_a = common::seed_product(&ctx, vendor_a.id, dec!(10.00)).await;
    let product_b = common::seed_product(&ctx, vendor_b.id, dec!(10.00)).await;
    let warehouse = Uuid::new_v4();
    common::seed_stock(&ctx, product_a.product_id, warehouse, 10).await;
    common::seed_stock(&ctx, product_b.product_id, warehouse, 10).await;

    let result = ctx
        .services
        .orders
        .place_order(checkout(
            warehouse,
            vec![
                CheckoutLine {
                    product_id: product_a.product_id,
                    variant_id: None,
                    quantity: 1,
                },
                CheckoutLine {
                    product_id: product_b.product_id,
                    variant_id: None,
                    quantity: 1,
                },
            ],
        ))
        .await;

    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}
