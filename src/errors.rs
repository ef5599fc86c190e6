use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};

/// Wire shape for user-visible failures. Raw database errors never reach
/// callers; they are logged and mapped to a stable code here.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable machine-readable error code (e.g. "insufficient_stock").
    pub code: String,
    /// Human-readable error description.
    pub message: String,
    /// ISO 8601 timestamp when the error occurred.
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::error::DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Stock record not found: {0}")]
    StockNotFound(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Invalid movement delta: {0}")]
    InvalidDelta(String),

    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("Refund exceeds captured amount: {0}")]
    RefundExceedsCaptured(String),

    #[error("Transaction conflict: {0}")]
    SerializationConflict(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    pub fn db_error(error: DbErr) -> Self {
        ServiceError::DatabaseError(error)
    }

    /// Stable error code surfaced to callers; the single source of truth
    /// alongside `status_code`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "database_error",
            Self::NotFound(_) => "not_found",
            Self::StockNotFound(_) => "stock_not_found",
            Self::InsufficientStock(_) => "insufficient_stock",
            Self::InvalidDelta(_) => "invalid_delta",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::RefundExceedsCaptured(_) => "refund_exceeds_captured",
            Self::SerializationConflict(_) => "try_again",
            Self::ValidationError(_) => "validation_error",
            Self::InvalidOperation(_) => "invalid_operation",
            Self::PaymentFailed(_) => "payment_failed",
            Self::EventError(_) => "event_error",
            Self::InternalError(_) => "internal_error",
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) | Self::StockNotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::InvalidDelta(_) | Self::InvalidOperation(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::InsufficientStock(_) | Self::RefundExceedsCaptured(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::InvalidTransition(_) => StatusCode::CONFLICT,
            Self::SerializationConflict(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::PaymentFailed(_) => StatusCode::BAD_GATEWAY,
            Self::DatabaseError(_) | Self::EventError(_) | Self::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Transient failures eligible for automatic retry with backoff.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::SerializationConflict(_) => true,
            Self::DatabaseError(err) => is_transient_db_err(err),
            _ => false,
        }
    }
}

/// Serialization failures, deadlocks and sqlite busy locks are contention,
/// not corruption; callers retry them with backoff.
pub fn is_transient_db_err(err: &DbErr) -> bool {
    let msg = err.to_string().to_ascii_lowercase();
    msg.contains("serialization")
        || msg.contains("deadlock")
        || msg.contains("could not serialize")
        || msg.contains("database is locked")
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Hide internals from the client while keeping the full error in the
        // operator log.
        let message = match &self {
            Self::DatabaseError(err) => {
                tracing::error!(error = %err, "database error surfaced to handler");
                "An internal error occurred".to_string()
            }
            Self::InternalError(msg) => {
                tracing::error!(error = %msg, "internal error surfaced to handler");
                "An internal error occurred".to_string()
            }
            Self::SerializationConflict(_) => {
                "The operation could not complete due to contention; please try again".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            code: self.code().to_string(),
            message,
            timestamp: Utc::now().to_rfc3339(),
        });

        (status, body).into_response()
    }
}
