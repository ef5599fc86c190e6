//! Marketplace transactional core.
//!
//! The crate owns the subsystems with real correctness invariants under
//! concurrency: the inventory reservation ledger, the order fulfillment
//! state machine, promotion pricing, and escrow/commission settlement.
//! Page rendering, search, notifications delivery and authentication live
//! elsewhere and reach this core only through the narrow boundaries in
//! `catalog`, `gateway` and `events`.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod catalog;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod migrator;
pub mod scheduler;
pub mod services;

use std::sync::Arc;

use axum::{routing::get, Json, Router};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};

use crate::catalog::CatalogProvider;
use crate::services::inventory::InventoryService;
use crate::services::orders::OrderService;
use crate::services::pricing::PricingService;
use crate::services::reservations::ReservationService;
use crate::services::settlement::SettlementService;
use crate::services::transfers::TransferService;

/// The wired service graph.
#[derive(Clone)]
pub struct AppServices {
    pub inventory: InventoryService,
    pub reservations: ReservationService,
    pub transfers: TransferService,
    pub pricing: PricingService,
    pub orders: Arc<OrderService>,
    pub settlement: SettlementService,
}

impl AppServices {
    pub fn build(
        db: Arc<DatabaseConnection>,
        event_sender: events::EventSender,
        catalog: Arc<dyn CatalogProvider>,
        cfg: &config::AppConfig,
    ) -> Self {
        let inventory = InventoryService::new(db.clone(), event_sender.clone());
        let reservations = ReservationService::new(db.clone(), event_sender.clone());
        let transfers = TransferService::new(db.clone(), event_sender.clone(), inventory.clone());
        let pricing = PricingService::new(db.clone());
        let orders = Arc::new(OrderService::new(
            db.clone(),
            event_sender.clone(),
            catalog,
            pricing.clone(),
            reservations.clone(),
            cfg.settlement.clone(),
            cfg.reservation_ttl(),
        ));
        let settlement = SettlementService::new(
            db,
            event_sender,
            orders.clone(),
            cfg.settlement.clone(),
        );

        Self {
            inventory,
            reservations,
            transfers,
            pricing,
            orders,
            settlement,
        }
    }
}

/// Shared application state for the operational HTTP surface.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: AppServices,
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Health-only router; the business operations are driven through the
/// service layer, not HTTP.
pub fn operational_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(state)
}
