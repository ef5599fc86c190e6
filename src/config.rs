use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_RESERVATION_TTL_MINUTES: i64 = 15;
const DEFAULT_ESCROW_HOLD_DAYS: i32 = 7;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Settlement and reservation tunables.
///
/// `platform_commission_rate` / `platform_commission_fixed` are the last
/// fallback of the commission resolution chain (category override, then
/// vendor default, then these).
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SettlementConfig {
    /// Platform default commission rate, percent of order subtotal (0-100).
    #[serde(default = "default_platform_commission_rate")]
    pub platform_commission_rate: Decimal,

    /// Platform default fixed commission per order.
    #[serde(default = "default_platform_commission_fixed")]
    pub platform_commission_fixed: Decimal,

    /// Days after delivery before captured escrow funds become releasable,
    /// unless the vendor carries its own override.
    #[serde(default = "default_escrow_hold_days")]
    pub escrow_hold_days: i32,

    /// Flat tax rate applied to order subtotals, percent.
    #[serde(default)]
    pub tax_rate: Decimal,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            platform_commission_rate: default_platform_commission_rate(),
            platform_commission_fixed: default_platform_commission_fixed(),
            escrow_hold_days: default_escrow_hold_days(),
            tax_rate: Decimal::ZERO,
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// Minutes an order's stock reservation is held before the expiry sweep
    /// returns it to the pool.
    #[serde(default = "default_reservation_ttl_minutes")]
    #[validate(range(min = 1, max = 1440))]
    pub reservation_ttl_minutes: i64,

    /// Interval between reservation-expiry sweep ticks.
    #[serde(default = "default_sweep_interval_secs")]
    pub reservation_sweep_interval_secs: u64,

    /// Interval between escrow-release sweep ticks.
    #[serde(default = "default_escrow_sweep_interval_secs")]
    pub escrow_sweep_interval_secs: u64,

    /// Settlement tunables
    #[serde(default)]
    pub settlement: SettlementConfig,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_reservation_ttl_minutes() -> i64 {
    DEFAULT_RESERVATION_TTL_MINUTES
}

fn default_sweep_interval_secs() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECS
}

fn default_escrow_sweep_interval_secs() -> u64 {
    // Escrow eligibility changes on a scale of days; no need to scan often.
    3600
}

fn default_platform_commission_rate() -> Decimal {
    Decimal::new(1500, 2) // 15.00%
}

fn default_platform_commission_fixed() -> Decimal {
    Decimal::ZERO
}

fn default_escrow_hold_days() -> i32 {
    DEFAULT_ESCROW_HOLD_DAYS
}

impl AppConfig {
    /// Constructs a configuration directly, bypassing file/env loading.
    /// Used by tests and embedded setups.
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            auto_migrate: true,
            reservation_ttl_minutes: default_reservation_ttl_minutes(),
            reservation_sweep_interval_secs: default_sweep_interval_secs(),
            escrow_sweep_interval_secs: default_escrow_sweep_interval_secs(),
            settlement: SettlementConfig::default(),
        }
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn reservation_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.reservation_ttl_minutes)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("marketplace_core={},tower_http=info", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let _ = fmt().with_env_filter(EnvFilter::new(filter_directive)).try_init();
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let builder = Config::builder()
        .set_default("database_url", "sqlite://marketplace.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false));

    let config = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = AppConfig::new(
            "sqlite::memory:".into(),
            "127.0.0.1".into(),
            8080,
            "test".into(),
        );
        assert_eq!(cfg.reservation_ttl_minutes, 15);
        assert_eq!(cfg.settlement.escrow_hold_days, 7);
        assert_eq!(
            cfg.settlement.platform_commission_rate,
            Decimal::new(1500, 2)
        );
        assert!(!cfg.is_production());
    }
}
