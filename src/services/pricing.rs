//! Promotion & Pricing Engine
//!
//! Resolves promo codes, flash sales and bulk-quantity tiers into final
//! line prices. The computation itself is pure: `compute_quote` works over
//! pre-loaded discount sources, making the stacking and eligibility rules
//! unit-testable without a database. Side effects (usage counters, usage
//! rows) happen only at order confirmation via `record_usage`, never during
//! a price preview, so abandoned carts cannot consume limited-use codes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::entities::bulk_discount::{self, Entity as BulkDiscountEntity};
use crate::entities::flash_sale::{self, Entity as FlashSaleEntity};
use crate::entities::flash_sale_product::{self, Entity as FlashSaleProductEntity};
use crate::entities::promo_code::{self, DiscountType, Entity as PromoCodeEntity};
use crate::entities::promo_code_usage::{self, Entity as PromoCodeUsageEntity};
use crate::errors::ServiceError;

/// One order line as the engine sees it: catalog snapshot plus quantity.
#[derive(Debug, Clone)]
pub struct PriceLine {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub vendor_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl PriceLine {
    fn gross(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Who is buying and when; drives eligibility windows and per-user limits.
#[derive(Debug, Clone)]
pub struct QuoteContext {
    pub user_id: Option<Uuid>,
    pub segment: Option<String>,
    pub now: DateTime<Utc>,
}

/// Discount sources pre-loaded for one quote.
#[derive(Debug, Clone, Default)]
pub struct DiscountSources {
    pub promo_codes: Vec<promo_code::Model>,
    /// Confirmed uses per promo code id for the quoting user.
    pub user_usage: HashMap<Uuid, u64>,
    pub flash_sales: Vec<(flash_sale::Model, Vec<flash_sale_product::Model>)>,
    pub bulk_discounts: Vec<bulk_discount::Model>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineQuote {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub discount_amount: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub lines: Vec<LineQuote>,
    /// Pre-discount sum of the lines.
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    /// Codes that contributed to the discount, in application order.
    pub applied_promo_codes: Vec<String>,
}

/// Pricing service: loads sources, delegates to the pure computation.
#[derive(Clone)]
pub struct PricingService {
    db: Arc<DatabaseConnection>,
}

impl PricingService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Quotes a cart. Pure preview: consumes nothing.
    #[instrument(skip(self, lines), fields(line_count = lines.len()))]
    pub async fn quote(
        &self,
        lines: &[PriceLine],
        user_id: Option<Uuid>,
        segment: Option<String>,
        codes: &[String],
    ) -> Result<Quote, ServiceError> {
        let ctx = QuoteContext {
            user_id,
            segment,
            now: Utc::now(),
        };
        let sources = self.load_sources(lines, user_id, codes, ctx.now).await?;
        Ok(compute_quote(lines, &sources, &ctx))
    }

    async fn load_sources(
        &self,
        lines: &[PriceLine],
        user_id: Option<Uuid>,
        codes: &[String],
        now: DateTime<Utc>,
    ) -> Result<DiscountSources, ServiceError> {
        let db = &*self.db;
        let mut sources = DiscountSources::default();

        if !codes.is_empty() {
            sources.promo_codes = PromoCodeEntity::find()
                .filter(promo_code::Column::Code.is_in(codes.to_vec()))
                .filter(promo_code::Column::IsActive.eq(true))
                .all(db)
                .await
                .map_err(ServiceError::db_error)?;

            if let Some(user) = user_id {
                for promo in &sources.promo_codes {
                    let used = PromoCodeUsageEntity::find()
                        .filter(promo_code_usage::Column::PromoCodeId.eq(promo.id))
                        .filter(promo_code_usage::Column::UserId.eq(user))
                        .count(db)
                        .await
                        .map_err(ServiceError::db_error)?;
                    sources.user_usage.insert(promo.id, used);
                }
            }
        }

        let product_ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();

        let sales = FlashSaleEntity::find()
            .filter(flash_sale::Column::IsActive.eq(true))
            .filter(flash_sale::Column::StartDate.lte(now))
            .filter(flash_sale::Column::EndDate.gte(now))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        for sale in sales {
            let products = FlashSaleProductEntity::find()
                .filter(flash_sale_product::Column::FlashSaleId.eq(sale.id))
                .filter(flash_sale_product::Column::ProductId.is_in(product_ids.clone()))
                .all(db)
                .await
                .map_err(ServiceError::db_error)?;
            if !products.is_empty() {
                sources.flash_sales.push((sale, products));
            }
        }

        sources.bulk_discounts = BulkDiscountEntity::find()
            .filter(bulk_discount::Column::IsActive.eq(true))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(sources)
    }

    /// Consumes one use of a promo code inside the order-confirmation
    /// transaction: atomic counter increment plus a usage row. The counter
    /// update is conditional on the global limit, so two concurrent
    /// confirmations cannot both take the last use.
    pub async fn record_usage<C: ConnectionTrait>(
        &self,
        conn: &C,
        promo: &promo_code::Model,
        user_id: Option<Uuid>,
        order_id: Uuid,
        discount_amount: Decimal,
        order_amount: Decimal,
    ) -> Result<(), ServiceError> {
        let mut update = PromoCodeEntity::update_many()
            .col_expr(
                promo_code::Column::CurrentUsageCount,
                Expr::col(promo_code::Column::CurrentUsageCount).add(1),
            )
            .col_expr(
                promo_code::Column::UpdatedAt,
                Expr::value(Some(Utc::now())),
            )
            .filter(promo_code::Column::Id.eq(promo.id));

        if let Some(limit) = promo.usage_limit {
            update = update.filter(promo_code::Column::CurrentUsageCount.lt(limit));
        }

        let result = update.exec(conn).await.map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::ValidationError(format!(
                "Promo code {} has reached its usage limit",
                promo.code
            )));
        }

        let usage = promo_code_usage::ActiveModel {
            id: Set(Uuid::new_v4()),
            promo_code_id: Set(promo.id),
            user_id: Set(user_id),
            order_id: Set(Some(order_id)),
            discount_amount: Set(discount_amount),
            order_amount: Set(order_amount),
            used_at: Set(Utc::now()),
        };
        usage.insert(conn).await.map_err(ServiceError::db_error)?;

        Ok(())
    }

    pub async fn find_code(
        &self,
        code: &str,
    ) -> Result<Option<promo_code::Model>, ServiceError> {
        PromoCodeEntity::find()
            .filter(promo_code::Column::Code.eq(code))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }
}

/// Resolves the final per-line prices. Pure over its inputs.
///
/// Application order: the best sale-type source per line (flash sale or
/// bulk tier, never both), then promo codes. A promo code joins the sale
/// discount only when `can_stack_with_sales`; otherwise the customer-better
/// side wins. A second promo code joins only when every selected code sets
/// `can_stack_with_other_promos`. Promo candidates are ordered by explicit
/// priority, ties broken by earlier creation, then id.
pub fn compute_quote(lines: &[PriceLine], sources: &DiscountSources, ctx: &QuoteContext) -> Quote {
    let subtotal: Decimal = lines.iter().map(|l| l.gross()).sum();
    let total_items: i32 = lines.iter().map(|l| l.quantity).sum();

    // Best sale-type discount per line.
    let sale_discounts: Vec<Decimal> = lines
        .iter()
        .map(|line| {
            let flash = flash_sale_discount(line, &sources.flash_sales, ctx);
            let bulk = bulk_tier_discount(line, &sources.bulk_discounts, ctx);
            flash.max(bulk).min(line.gross())
        })
        .collect();
    let total_sale_discount: Decimal = sale_discounts.iter().copied().sum();

    // Eligible promo codes in deterministic application order.
    let mut candidates: Vec<&promo_code::Model> = sources
        .promo_codes
        .iter()
        .filter(|promo| promo_eligible(promo, lines, subtotal, total_items, sources, ctx))
        .collect();
    candidates.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });

    let selected: Vec<&promo_code::Model> = match candidates.split_first() {
        None => Vec::new(),
        Some((first, rest)) => {
            let mut picked = vec![*first];
            if first.can_stack_with_other_promos {
                picked.extend(
                    rest.iter()
                        .filter(|p| p.can_stack_with_other_promos)
                        .copied(),
                );
            }
            picked
        }
    };

    // Decide whether sale discounts survive next to the promo codes.
    let stack_with_sales = selected.is_empty() || selected[0].can_stack_with_sales;

    let mut line_discounts = if stack_with_sales {
        sale_discounts.clone()
    } else {
        vec![Decimal::ZERO; lines.len()]
    };

    let mut applied_codes = Vec::new();
    let mut promo_total = Decimal::ZERO;
    for promo in &selected {
        let allocation = promo_discount_per_line(promo, lines, &line_discounts);
        let amount: Decimal = allocation.iter().copied().sum();
        if amount > Decimal::ZERO {
            for (slot, extra) in line_discounts.iter_mut().zip(allocation) {
                *slot += extra;
            }
            promo_total += amount;
            applied_codes.push(promo.code.clone());
        }
    }

    // Non-stackable promo that loses to the sale prices: fall back to the
    // sale discounts alone.
    if !stack_with_sales && promo_total < total_sale_discount {
        line_discounts = sale_discounts;
        applied_codes.clear();
    }

    let quoted_lines: Vec<LineQuote> = lines
        .iter()
        .zip(&line_discounts)
        .map(|(line, discount)| {
            let discount = (*discount).min(line.gross()).round_dp(2);
            LineQuote {
                product_id: line.product_id,
                variant_id: line.variant_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
                discount_amount: discount,
                line_total: line.gross() - discount,
            }
        })
        .collect();

    let discount_amount = quoted_lines.iter().map(|l| l.discount_amount).sum();

    Quote {
        lines: quoted_lines,
        subtotal,
        discount_amount,
        applied_promo_codes: applied_codes,
    }
}

fn within_window(start: DateTime<Utc>, end: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    start <= now && end.map(|e| now <= e).unwrap_or(true)
}

fn uuid_list(json: &Option<serde_json::Value>) -> Option<Vec<Uuid>> {
    json.as_ref()
        .map(|value| serde_json::from_value(value.clone()).unwrap_or_default())
}

fn string_list(json: &Option<serde_json::Value>) -> Option<Vec<String>> {
    json.as_ref()
        .map(|value| serde_json::from_value(value.clone()).unwrap_or_default())
}

fn segment_allowed(list: &Option<serde_json::Value>, segment: &Option<String>) -> bool {
    match string_list(list) {
        None => true,
        Some(allowed) => match segment {
            Some(seg) => allowed.iter().any(|s| s == seg),
            None => false,
        },
    }
}

fn discount_of(
    discount_type: Option<DiscountType>,
    value: Decimal,
    base: Decimal,
    quantity: i32,
    cap: Option<Decimal>,
) -> Decimal {
    let raw = match discount_type {
        Some(DiscountType::Percentage) => (base * value / Decimal::from(100)).round_dp(2),
        // Fixed discounts reduce the unit price.
        Some(DiscountType::Fixed) => value * Decimal::from(quantity),
        None => Decimal::ZERO,
    };
    let capped = match cap {
        Some(cap) => raw.min(cap),
        None => raw,
    };
    capped.min(base).max(Decimal::ZERO)
}

fn flash_sale_discount(
    line: &PriceLine,
    sales: &[(flash_sale::Model, Vec<flash_sale_product::Model>)],
    ctx: &QuoteContext,
) -> Decimal {
    sales
        .iter()
        .filter(|(sale, _)| {
            sale.is_active && within_window(sale.start_date, Some(sale.end_date), ctx.now)
        })
        .filter_map(|(sale, products)| {
            let membership = products.iter().find(|p| p.product_id == line.product_id)?;
            let value = membership.discount_value.unwrap_or(sale.discount_value);
            Some(discount_of(
                DiscountType::from_str(&sale.discount_type),
                value,
                line.gross(),
                line.quantity,
                sale.max_discount_amount,
            ))
        })
        .max()
        .unwrap_or(Decimal::ZERO)
}

fn bulk_tier_discount(
    line: &PriceLine,
    discounts: &[bulk_discount::Model],
    ctx: &QuoteContext,
) -> Decimal {
    discounts
        .iter()
        .filter(|d| d.is_active)
        .filter(|d| match (d.start_date, d.end_date) {
            (Some(start), end) => within_window(start, end, ctx.now),
            (None, Some(end)) => ctx.now <= end,
            (None, None) => true,
        })
        .filter(|d| segment_allowed(&d.applicable_segments, &ctx.segment))
        .filter(|d| {
            let product_match = d.product_id.map(|p| p == line.product_id);
            let category_match = d
                .category_id
                .map(|c| line.category_id.map(|lc| lc == c).unwrap_or(false));
            let vendor_match = d.vendor_id.map(|v| v == line.vendor_id);
            // The discount applies when every scope it names matches.
            [product_match, category_match, vendor_match]
                .into_iter()
                .flatten()
                .all(|m| m)
                && (product_match.is_some() || category_match.is_some() || vendor_match.is_some())
        })
        .filter_map(|d| {
            // Highest tier threshold not exceeding the ordered quantity.
            d.parsed_tiers()
                .into_iter()
                .filter(|tier| tier.min_quantity <= line.quantity)
                .max_by_key(|tier| tier.min_quantity)
                .map(|tier| {
                    discount_of(
                        DiscountType::from_str(&tier.discount_type),
                        tier.discount_value,
                        line.gross(),
                        line.quantity,
                        None,
                    )
                })
        })
        .max()
        .unwrap_or(Decimal::ZERO)
}

fn promo_eligible(
    promo: &promo_code::Model,
    lines: &[PriceLine],
    subtotal: Decimal,
    total_items: i32,
    sources: &DiscountSources,
    ctx: &QuoteContext,
) -> bool {
    if !promo.is_active || !within_window(promo.start_date, promo.end_date, ctx.now) {
        return false;
    }
    if let Some(min_amount) = promo.min_order_amount {
        if subtotal < min_amount {
            return false;
        }
    }
    if let Some(min_items) = promo.min_items_count {
        if total_items < min_items {
            return false;
        }
    }
    if let Some(limit) = promo.usage_limit {
        if promo.current_usage_count >= limit {
            return false;
        }
    }
    if let Some(per_user) = promo.usage_limit_per_user {
        let used = sources.user_usage.get(&promo.id).copied().unwrap_or(0);
        if used >= per_user as u64 {
            return false;
        }
    }
    if !segment_allowed(&promo.applicable_segments, &ctx.segment) {
        return false;
    }
    // The code must reach at least one line.
    lines.iter().any(|line| promo_covers_line(promo, line))
}

fn promo_covers_line(promo: &promo_code::Model, line: &PriceLine) -> bool {
    if let Some(products) = uuid_list(&promo.applicable_products) {
        if !products.contains(&line.product_id) {
            return false;
        }
    }
    if let Some(categories) = uuid_list(&promo.applicable_categories) {
        match line.category_id {
            Some(category) if categories.contains(&category) => {}
            _ => return false,
        }
    }
    if let Some(vendors) = uuid_list(&promo.applicable_vendors) {
        if !vendors.contains(&line.vendor_id) {
            return false;
        }
    }
    true
}

/// Splits a promo code's discount across the lines it covers, computed on
/// what is still payable after earlier discounts. Fixed amounts are
/// allocated proportionally, with the rounding remainder pinned to the last
/// covered line so the parts always sum to the whole.
fn promo_discount_per_line(
    promo: &promo_code::Model,
    lines: &[PriceLine],
    already_discounted: &[Decimal],
) -> Vec<Decimal> {
    let covered: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| promo_covers_line(promo, line))
        .map(|(i, _)| i)
        .collect();

    let mut allocation = vec![Decimal::ZERO; lines.len()];
    if covered.is_empty() {
        return allocation;
    }

    let remaining: Vec<Decimal> = covered
        .iter()
        .map(|&i| (lines[i].gross() - already_discounted[i]).max(Decimal::ZERO))
        .collect();
    let covered_total: Decimal = remaining.iter().copied().sum();
    if covered_total <= Decimal::ZERO {
        return allocation;
    }

    match DiscountType::from_str(&promo.discount_type) {
        Some(DiscountType::Percentage) => {
            let mut total =
                (covered_total * promo.discount_value / Decimal::from(100)).round_dp(2);
            if let Some(cap) = promo.max_discount_amount {
                total = total.min(cap);
            }
            distribute(&covered, &remaining, total, &mut allocation);
        }
        Some(DiscountType::Fixed) => {
            let mut total = promo.discount_value.min(covered_total);
            if let Some(cap) = promo.max_discount_amount {
                total = total.min(cap);
            }
            distribute(&covered, &remaining, total, &mut allocation);
        }
        None => {}
    }

    allocation
}

fn distribute(
    covered: &[usize],
    remaining: &[Decimal],
    total: Decimal,
    allocation: &mut [Decimal],
) {
    let covered_total: Decimal = remaining.iter().copied().sum();
    if covered_total <= Decimal::ZERO || total <= Decimal::ZERO {
        return;
    }

    let mut allocated = Decimal::ZERO;
    for (pos, &idx) in covered.iter().enumerate() {
        let share = if pos == covered.len() - 1 {
            (total - allocated).max(Decimal::ZERO)
        } else {
            (total * remaining[pos] / covered_total).round_dp(2)
        };
        let share = share.min(remaining[pos]);
        allocation[idx] = share;
        allocated += share;
    }
}
