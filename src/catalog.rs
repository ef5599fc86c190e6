use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::ServiceError;

/// Read-only product metadata the core needs at checkout. Snapshots are
/// copied onto order items so later catalog edits never alter history.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductSnapshot {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub name: String,
    pub sku: Option<String>,
    pub category_id: Option<Uuid>,
    pub vendor_id: Uuid,
    pub unit_price: Decimal,
}

/// Catalog lookup boundary. The real catalog service lives outside this
/// core; the core only ever treats it as a pure `product id -> snapshot`
/// function.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn product_snapshot(
        &self,
        product_id: Uuid,
        variant_id: Option<Uuid>,
    ) -> Result<ProductSnapshot, ServiceError>;
}

/// In-memory catalog for tests and embedded setups.
#[derive(Default, Clone)]
pub struct StaticCatalog {
    products: Arc<RwLock<HashMap<(Uuid, Option<Uuid>), ProductSnapshot>>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, snapshot: ProductSnapshot) {
        self.products
            .write()
            .await
            .insert((snapshot.product_id, snapshot.variant_id), snapshot);
    }
}

#[async_trait]
impl CatalogProvider for StaticCatalog {
    async fn product_snapshot(
        &self,
        product_id: Uuid,
        variant_id: Option<Uuid>,
    ) -> Result<ProductSnapshot, ServiceError> {
        self.products
            .read()
            .await
            .get(&(product_id, variant_id))
            .cloned()
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found in catalog", product_id))
            })
    }
}
