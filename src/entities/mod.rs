//! Database entities for the marketplace transactional core.
//!
//! Statuses are stored as strings and converted through the enum
//! `as_str`/`from_str` pairs defined next to each entity. Derived values
//! (available stock, audit differences) are accessors on the models, never
//! writable columns.

pub mod bulk_discount;
pub mod category_commission;
pub mod flash_sale;
pub mod flash_sale_product;
pub mod order;
pub mod order_item;
pub mod order_status_history;
pub mod payment;
pub mod promo_code;
pub mod promo_code_usage;
pub mod stock_audit;
pub mod stock_audit_item;
pub mod stock_movement;
pub mod stock_record;
pub mod stock_reservation;
pub mod stock_transfer;
pub mod stock_transfer_item;
pub mod vendor;
pub mod vendor_transaction;
