mod common;

use std::collections::HashMap;

use assert_matches::assert_matches;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use marketplace_core::entities::stock_audit::{AuditStatus, AuditType};
use marketplace_core::entities::stock_movement::{self, Entity as StockMovementEntity, MovementType};
use marketplace_core::entities::stock_transfer::TransferStatus;
use marketplace_core::errors::ServiceError;
use marketplace_core::services::inventory::ApplyMovementRequest;
use marketplace_core::services::transfers::{CreateTransferRequest, TransferLine};

#[tokio::test]
async fn completed_transfer_moves_stock_between_warehouses() {
    let ctx = common::setup().await;
    let vendor = common::seed_vendor(&ctx, Decimal::from(10), Decimal::ZERO).await;
    let product = common::seed_product(&ctx, vendor.id, Decimal::from(20)).await;
    let source_wh = Uuid::new_v4();
    let dest_wh = Uuid::new_v4();
    let source = common::seed_stock(&ctx, product.product_id, source_wh, 50).await;

    let (transfer, items) = ctx
        .services
        .transfers
        .create_transfer(CreateTransferRequest {
            from_warehouse_id: source_wh,
            to_warehouse_id: dest_wh,
            lines: vec![TransferLine {
                product_id: product.product_id,
                variant_id: None,
                quantity: 20,
            }],
            requested_by: None,
            notes: None,
        })
        .await
        .unwrap();
    assert_eq!(transfer.status, TransferStatus::Pending.as_str());
    assert_eq!(items.len(), 1);

    ctx.services.transfers.ship_transfer(transfer.id).await.unwrap();
    let completed = ctx
        .services
        .transfers
        .complete_transfer(transfer.id, &HashMap::new())
        .await
        .unwrap();
    assert_eq!(completed.status, TransferStatus::Completed.as_str());

    let source_after = common::fetch_stock(&ctx, source.id).await;
    assert_eq!(source_after.quantity, 30);

    // Destination record was created on first receipt.
    let dest = ctx
        .services
        .inventory
        .find_stock(product.product_id, None, dest_wh)
        .await
        .unwrap()
        .expect("destination stock record");
    assert_eq!(dest.quantity, 20);
    assert_eq!(dest.reserved, 0);

    // One transfer movement per side.
    let movements = StockMovementEntity::find()
        .filter(
            stock_movement::Column::MovementType.eq(MovementType::Transfer.as_str()),
        )
        .all(&*ctx.db)
        .await
        .unwrap();
    assert_eq!(movements.len(), 2);
    assert!(movements.iter().any(|m| m.quantity == -20));
    assert!(movements.iter().any(|m| m.quantity == 20));
    assert!(movements
        .iter()
        .all(|m| m.reference_number.as_deref() == Some(transfer.transfer_number.as_str())));
}

#[tokio::test]
async fn partial_completion_is_an_outcome_not_an_error() {
    let ctx = common::setup().await;
    let vendor = common::seed_vendor(&ctx, Decimal::from(10), Decimal::ZERO).await;
    let product = common::seed_product(&ctx, vendor.id, Decimal::from(20)).await;
    let source_wh = Uuid::new_v4();
    let dest_wh = Uuid::new_v4();
    let source = common::seed_stock(&ctx, product.product_id, source_wh, 50).await;

    let (transfer, items) = ctx
        .services
        .transfers
        .create_transfer(CreateTransferRequest {
            from_warehouse_id: source_wh,
            to_warehouse_id: dest_wh,
            lines: vec![TransferLine {
                product_id: product.product_id,
                variant_id: None,
                quantity: 20,
            }],
            requested_by: None,
            notes: None,
        })
        .await
        .unwrap();

    ctx.services.transfers.ship_transfer(transfer.id).await.unwrap();

    // Only 15 of the requested 20 arrived.
    let mut received = HashMap::new();
    received.insert(items[0].id, 15);
    ctx.services
        .transfers
        .complete_transfer(transfer.id, &received)
        .await
        .unwrap();

    let source_after = common::fetch_stock(&ctx, source.id).await;
    assert_eq!(source_after.quantity, 35);

    let dest = ctx
        .services
        .inventory
        .find_stock(product.product_id, None, dest_wh)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(dest.quantity, 15);

    let (_, items_after) = ctx
        .services
        .transfers
        .get_transfer(transfer.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(items_after[0].requested_quantity, 20);
    assert_eq!(items_after[0].transferred_quantity, 15);
}

#[tokio::test]
async fn transfer_state_machine_rejects_shortcuts() {
    let ctx = common::setup().await;
    let vendor = common::seed_vendor(&ctx, Decimal::from(10), Decimal::ZERO).await;
    let product = common::seed_product(&ctx, vendor.id, Decimal::from(20)).await;
    let source_wh = Uuid::new_v4();
    common::seed_stock(&ctx, product.product_id, source_wh, 50).await;

    let (transfer, _) = ctx
        .services
        .transfers
        .create_transfer(CreateTransferRequest {
            from_warehouse_id: source_wh,
            to_warehouse_id: Uuid::new_v4(),
            lines: vec![TransferLine {
                product_id: product.product_id,
                variant_id: None,
                quantity: 5,
            }],
            requested_by: None,
            notes: None,
        })
        .await
        .unwrap();

    // pending -> completed skips the shipment.
    let result = ctx
        .services
        .transfers
        .complete_transfer(transfer.id, &HashMap::new())
        .await;
    assert_matches!(result, Err(ServiceError::InvalidTransition(_)));

    // pending -> cancelled is allowed; nothing moved.
    let cancelled = ctx
        .services
        .transfers
        .cancel_transfer(transfer.id)
        .await
        .unwrap();
    assert_eq!(cancelled.status, TransferStatus::Cancelled.as_str());

    let result = ctx.services.transfers.ship_transfer(transfer.id).await;
    assert_matches!(result, Err(ServiceError::InvalidTransition(_)));
}

#[tokio::test]
async fn transfer_cannot_take_reserved_stock() {
    let ctx = common::setup().await;
    let vendor = common::seed_vendor(&ctx, Decimal::from(10), Decimal::ZERO).await;
    let product = common::seed_product(&ctx, vendor.id, Decimal::from(20)).await;
    let source_wh = Uuid::new_v4();
    let source = common::seed_stock(&ctx, product.product_id, source_wh, 10).await;

    // 8 of 10 units are held for an order.
    ctx.services
        .reservations
        .reserve(source.id, 8, Uuid::new_v4(), chrono::Duration::minutes(15))
        .await
        .unwrap();

    let (transfer, _) = ctx
        .services
        .transfers
        .create_transfer(CreateTransferRequest {
            from_warehouse_id: source_wh,
            to_warehouse_id: Uuid::new_v4(),
            lines: vec![TransferLine {
                product_id: product.product_id,
                variant_id: None,
                quantity: 5,
            }],
            requested_by: None,
            notes: None,
        })
        .await
        .unwrap();
    ctx.services.transfers.ship_transfer(transfer.id).await.unwrap();

    let result = ctx
        .services
        .transfers
        .complete_transfer(transfer.id, &HashMap::new())
        .await;
    assert_matches!(result, Err(ServiceError::InvalidDelta(_)));

    // The failed completion left the source untouched.
    let source_after = common::fetch_stock(&ctx, source.id).await;
    assert_eq!(source_after.quantity, 10);
    assert_eq!(source_after.reserved, 8);
}

#[tokio::test]
async fn audit_flags_discrepancies_without_correcting() {
    let ctx = common::setup().await;
    let vendor = common::seed_vendor(&ctx, Decimal::from(10), Decimal::ZERO).await;
    let product_a = common::seed_product(&ctx, vendor.id, Decimal::from(20)).await;
    let product_b = common::seed_product(&ctx, vendor.id, Decimal::from(20)).await;
    let warehouse = Uuid::new_v4();
    let stock_a = common::seed_stock(&ctx, product_a.product_id, warehouse, 40).await;
    let stock_b = common::seed_stock(&ctx, product_b.product_id, warehouse, 25).await;

    let audit = ctx
        .services
        .transfers
        .start_audit(warehouse, AuditType::CycleCount, None, None)
        .await
        .unwrap();
    assert_eq!(audit.status, AuditStatus::InProgress.as_str());

    // Shelf count matches for A, three units short for B.
    let item_a = ctx
        .services
        .transfers
        .record_count(audit.id, stock_a.id, 40, None)
        .await
        .unwrap();
    assert_eq!(item_a.difference(), 0);

    let item_b = ctx
        .services
        .transfers
        .record_count(audit.id, stock_b.id, 22, Some("damaged box".to_string()))
        .await
        .unwrap();
    assert_eq!(item_b.system_quantity, 25);
    assert_eq!(item_b.difference(), -3);

    ctx.services.transfers.complete_audit(audit.id).await.unwrap();

    let flagged = ctx.services.transfers.discrepancies(audit.id).await.unwrap();
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0].stock_record_id, stock_b.id);

    // Nothing auto-corrected.
    let stock_b_after = common::fetch_stock(&ctx, stock_b.id).await;
    assert_eq!(stock_b_after.quantity, 25);

    // Resolution is an explicit correction movement through the ledger.
    let movement = ctx
        .services
        .inventory
        .apply_movement(ApplyMovementRequest {
            stock_record_id: stock_b.id,
            movement_type: MovementType::CorrectionOut,
            delta: -3,
            reason: Some(format!("audit {}", audit.audit_number)),
            order_id: None,
            reference_number: Some(audit.audit_number.clone()),
            actor_id: None,
        })
        .await
        .unwrap();
    assert_eq!(movement.quantity_before, 25);
    assert_eq!(movement.quantity_after, 22);

    let stock_b_final = common::fetch_stock(&ctx, stock_b.id).await;
    assert_eq!(stock_b_final.quantity, 22);
}

#[tokio::test]
async fn audit_rejects_counts_for_other_warehouses() {
    let ctx = common::setup().await;
    let vendor = common::seed_vendor(&ctx, Decimal::from(10), Decimal::ZERO).await;
    let product = common::seed_product(&ctx, vendor.id, Decimal::from(20)).await;
    let audited_wh = Uuid::new_v4();
    let other_wh = Uuid::new_v4();
    let foreign_stock = common::seed_stock(&ctx, product.product_id, other_wh, 10).await;

    let audit = ctx
        .services
        .transfers
        .start_audit(audited_wh, AuditType::SpotCheck, None, None)
        .await
        .unwrap();

    let result = ctx
        .services
        .transfers
        .record_count(audit.id, foreign_stock.id, 10, None)
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn completed_audits_accept_no_more_counts() {
    let ctx = common::setup().await;
    let vendor = common::seed_vendor(&ctx, Decimal::from(10), Decimal::ZERO).await;
    let product = common::seed_product(&ctx, vendor.id, Decimal::from(20)).await;
    let warehouse = Uuid::new_v4();
    let stock = common::seed_stock(&ctx, product.product_id, warehouse, 10).await;

    let audit = ctx
        .services
        .transfers
        .start_audit(warehouse, AuditType::Full, None, None)
        .await
        .unwrap();
    ctx.services.transfers.complete_audit(audit.id).await.unwrap();

    let result = ctx
        .services
        .transfers
        .record_count(audit.id, stock.id, 10, None)
        .await;
    assert_matches!(result, Err(ServiceError::InvalidOperation(_)));
}

// Stock status is derived from the live quantities at query time, so it
// can never disagree with them.
#[tokio::test]
async fn stock_status_is_derived_not_stored() {
    let ctx = common::setup().await;
    let vendor = common::seed_vendor(&ctx, Decimal::from(10), Decimal::ZERO).await;
    let product = common::seed_product(&ctx, vendor.id, Decimal::from(20)).await;
    let warehouse = Uuid::new_v4();

    let stock = ctx
        .services
        .inventory
        .create_stock_record(marketplace_core::services::inventory::CreateStockRecordRequest {
            product_id: product.product_id,
            variant_id: None,
            warehouse_id: warehouse,
            quantity: 10,
            reorder_point: 3,
        })
        .await
        .unwrap();

    use marketplace_core::entities::stock_record::StockStatus;
    assert_eq!(
        ctx.services.inventory.stock_status(stock.id).await.unwrap(),
        StockStatus::InStock
    );
    assert_eq!(ctx.services.inventory.get_available(stock.id).await.unwrap(), 10);

    // Reserving 8 leaves 2 available, at or below the reorder point.
    ctx.services
        .reservations
        .reserve(stock.id, 8, Uuid::new_v4(), chrono::Duration::minutes(15))
        .await
        .unwrap();
    assert_eq!(
        ctx.services.inventory.stock_status(stock.id).await.unwrap(),
        StockStatus::LowStock
    );

    let low = ctx.services.inventory.low_stock(warehouse).await.unwrap();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0].id, stock.id);

    // Reserving the rest empties the pool.
    ctx.services
        .reservations
        .reserve(stock.id, 2, Uuid::new_v4(), chrono::Duration::minutes(15))
        .await
        .unwrap();
    assert_eq!(
        ctx.services.inventory.stock_status(stock.id).await.unwrap(),
        StockStatus::OutOfStock
    );

    let empty = ctx.services.inventory.out_of_stock(warehouse).await.unwrap();
    assert_eq!(empty.len(), 1);

    let history = ctx
        .services
        .inventory
        .movements(stock.id, 1, 20)
        .await
        .unwrap();
    // Reservations hold stock without moving it; no movement rows yet.
    assert_eq!(history.1, 0);
}

#[tokio::test]
async fn movement_guards_reject_invalid_deltas() {
    let ctx = common::setup().await;
    let vendor = common::seed_vendor(&ctx, Decimal::from(10), Decimal::ZERO).await;
    let product = common::seed_product(&ctx, vendor.id, Decimal::from(20)).await;
    let stock = common::seed_stock(&ctx, product.product_id, Uuid::new_v4(), 5).await;

    // Would drive quantity negative.
    let result = ctx
        .services
        .inventory
        .apply_movement(ApplyMovementRequest {
            stock_record_id: stock.id,
            movement_type: MovementType::Adjustment,
            delta: -6,
            reason: None,
            order_id: None,
            reference_number: None,
            actor_id: None,
        })
        .await;
    assert_matches!(result, Err(ServiceError::InvalidDelta(_)));

    // Unknown stock key is fatal for the call.
    let result = ctx
        .services
        .inventory
        .apply_movement(ApplyMovementRequest {
            stock_record_id: Uuid::new_v4(),
            movement_type: MovementType::In,
            delta: 5,
            reason: None,
            order_id: None,
            reference_number: None,
            actor_id: None,
        })
        .await;
    assert_matches!(result, Err(ServiceError::StockNotFound(_)));

    // Zero deltas are meaningless.
    let result = ctx
        .services
        .inventory
        .apply_movement(ApplyMovementRequest {
            stock_record_id: stock.id,
            movement_type: MovementType::Adjustment,
            delta: 0,
            reason: None,
            order_id: None,
            reference_number: None,
            actor_id: None,
        })
        .await;
    assert_matches!(result, Err(ServiceError::InvalidDelta(_)));
}
