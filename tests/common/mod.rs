#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use uuid::Uuid;

use marketplace_core::catalog::{CatalogProvider, ProductSnapshot, StaticCatalog};
use marketplace_core::config::AppConfig;
use marketplace_core::db::{establish_connection_with_config, run_migrations, DbConfig};
use marketplace_core::entities::{promo_code, stock_record, vendor};
use marketplace_core::events;
use marketplace_core::AppServices;

pub struct TestCtx {
    pub db: Arc<DatabaseConnection>,
    pub services: AppServices,
    pub catalog: Arc<StaticCatalog>,
    pub config: AppConfig,
}

/// Fresh in-memory database with the full schema and a wired service
/// graph. A single pooled connection keeps every session on the same
/// sqlite memory instance.
pub async fn setup() -> TestCtx {
    let db_cfg = DbConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
        ..Default::default()
    };
    let pool = establish_connection_with_config(&db_cfg)
        .await
        .expect("db connect");
    run_migrations(&pool).await.expect("migrations");

    let db = Arc::new(pool);
    let (event_sender, event_rx) = events::channel(256);
    tokio::spawn(events::process_events(event_rx));

    let catalog = Arc::new(StaticCatalog::new());
    let config = AppConfig::new(
        "sqlite::memory:".to_string(),
        "127.0.0.1".to_string(),
        0,
        "test".to_string(),
    );

    let catalog_provider: Arc<dyn CatalogProvider> = catalog.clone();
    let services = AppServices::build(db.clone(), event_sender, catalog_provider, &config);

    TestCtx {
        db,
        services,
        catalog,
        config,
    }
}

pub async fn seed_vendor(ctx: &TestCtx, rate: Decimal, fixed: Decimal) -> vendor::Model {
    let now = Utc::now();
    vendor::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set("Test Vendor".to_string()),
        commission_rate: Set(rate),
        commission_fixed: Set(fixed),
        wallet_balance: Set(Decimal::ZERO),
        pending_balance: Set(Decimal::ZERO),
        escrow_hold_days: Set(None),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(Some(now)),
    }
    .insert(&*ctx.db)
    .await
    .expect("seed vendor")
}

/// Registers a product in the in-memory catalog and returns its snapshot.
pub async fn seed_product(
    ctx: &TestCtx,
    vendor_id: Uuid,
    unit_price: Decimal,
) -> ProductSnapshot {
    let snapshot = ProductSnapshot {
        product_id: Uuid::new_v4(),
        variant_id: None,
        name: "Test Product".to_string(),
        sku: Some("SKU-TEST".to_string()),
        category_id: Some(Uuid::new_v4()),
        vendor_id,
        unit_price,
    };
    ctx.catalog.insert(snapshot.clone()).await;
    snapshot
}

pub async fn seed_stock(
    ctx: &TestCtx,
    product_id: Uuid,
    warehouse_id: Uuid,
    quantity: i32,
) -> stock_record::Model {
    ctx.services
        .inventory
        .create_stock_record(marketplace_core::services::inventory::CreateStockRecordRequest {
            product_id,
            variant_id: None,
            warehouse_id,
            quantity,
            reorder_point: 0,
        })
        .await
        .expect("seed stock")
}

/// Inserts an active promo code with sensible defaults; tweak the returned
/// builder fields through `mutate` before insertion.
pub async fn seed_promo_code<F>(ctx: &TestCtx, code: &str, mutate: F) -> promo_code::Model
where
    F: FnOnce(&mut promo_code::ActiveModel),
{
    let now = Utc::now();
    let mut model = promo_code::ActiveModel {
        id: Set(Uuid::new_v4()),
        vendor_id: Set(None),
        code: Set(code.to_string()),
        discount_type: Set("percentage".to_string()),
        discount_value: Set(Decimal::from(10)),
        max_discount_amount: Set(None),
        min_order_amount: Set(None),
        min_items_count: Set(None),
        applicable_categories: Set(None),
        applicable_products: Set(None),
        applicable_vendors: Set(None),
        applicable_segments: Set(None),
        usage_limit: Set(None),
        usage_limit_per_user: Set(Some(1)),
        current_usage_count: Set(0),
        can_stack_with_other_promos: Set(false),
        can_stack_with_sales: Set(true),
        start_date: Set(now - chrono::Duration::days(1)),
        end_date: Set(Some(now + chrono::Duration::days(30))),
        is_active: Set(true),
        priority: Set(0),
        created_at: Set(now),
        updated_at: Set(Some(now)),
    };
    mutate(&mut model);
    model.insert(&*ctx.db).await.expect("seed promo code")
}

pub fn fetch_stock(
    ctx: &TestCtx,
    stock_record_id: Uuid,
) -> impl std::future::Future<Output = stock_record::Model> + '_ {
    async move {
        ctx.services
            .inventory
            .get_stock(stock_record_id)
            .await
            .expect("fetch stock")
            .expect("stock exists")
    }
}
