use crate::errors::ServiceError;
use futures::future::BoxFuture;
use rand::Rng;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Maximum attempts for transactional operations hitting serialization
/// conflicts before the failure is surfaced to the caller.
const MAX_RETRY_ATTEMPTS: u32 = 5;
const BASE_BACKOFF_MS: u64 = 20;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

/// Establishes a connection pool to the database
pub async fn establish_connection(database_url: &str) -> Result<DbPool, ServiceError> {
    let config = DbConfig {
        url: database_url.to_string(),
        ..Default::default()
    };

    establish_connection_with_config(&config).await
}

/// Establishes a connection pool to the database with custom configuration
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    debug!("Configuring database connection with: {:?}", config);

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    info!(
        "Connecting to database with max_connections={}",
        config.max_connections
    );

    let pool = Database::connect(opt).await.map_err(ServiceError::db_error)?;
    Ok(pool)
}

/// Applies all pending migrations.
pub async fn run_migrations(db: &DatabaseConnection) -> Result<(), ServiceError> {
    crate::migrator::Migrator::up(db, None)
        .await
        .map_err(ServiceError::db_error)?;
    info!("Database migrations applied");
    Ok(())
}

/// Runs a transactional operation, retrying on transient contention.
///
/// Serialization failures, deadlocks and lock timeouts are retried with
/// bounded exponential backoff and jitter; exhaustion surfaces as
/// `SerializationConflict` for the caller to map to a "try again" response.
/// Non-transient errors pass through on the first occurrence.
pub async fn with_retry<'a, T>(
    operation: &str,
    mut f: impl FnMut() -> BoxFuture<'a, Result<T, ServiceError>>,
) -> Result<T, ServiceError> {
    let mut attempt = 0u32;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => {
                attempt += 1;
                if attempt >= MAX_RETRY_ATTEMPTS {
                    warn!(
                        operation = operation,
                        attempts = attempt,
                        error = %err,
                        "transactional operation exhausted retries"
                    );
                    return Err(ServiceError::SerializationConflict(format!(
                        "{} failed after {} attempts",
                        operation, attempt
                    )));
                }
                let backoff = BASE_BACKOFF_MS * (1u64 << attempt.min(6));
                let jitter = rand::thread_rng().gen_range(0..=backoff / 2);
                debug!(
                    operation = operation,
                    attempt = attempt,
                    delay_ms = backoff + jitter,
                    "retrying after transient conflict"
                );
                tokio::time::sleep(Duration::from_millis(backoff + jitter)).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = with_retry("test_op", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if n < 2 {
                    Err(ServiceError::SerializationConflict("contention".into()))
                } else {
                    Ok(42)
                }
            })
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_transient_errors_pass_through() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry("test_op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Err(ServiceError::NotFound("missing".into())) })
        })
        .await;

        assert!(matches!(result, Err(ServiceError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhaustion_surfaces_as_conflict() {
        let result: Result<(), _> = with_retry("test_op", || {
            Box::pin(async { Err(ServiceError::SerializationConflict("busy".into())) })
        })
        .await;

        assert!(matches!(
            result,
            Err(ServiceError::SerializationConflict(_))
        ));
    }
}
