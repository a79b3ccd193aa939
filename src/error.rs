//! Unified error handling for the billing engine
//!
//! Connection-level errors (transport, protocol, authentication) drive the
//! session reconnect policy; per-call errors are isolated at the handler and
//! never tear down the listening connection.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Main billing error type
#[derive(Error, Debug)]
pub enum BillingError {
    // ==================== Connection / protocol ====================
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Authentication rejected: {0}")]
    Authentication(String),

    // ==================== Settlement ====================
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: String, available: String },

    #[error("Duplicate reservation for call: {0}")]
    DuplicateReservation(String),

    #[error("No active reservation for call: {0}")]
    ReservationNotFound(String),

    #[error("Concurrent call limit exceeded: max {max} calls allowed")]
    ConcurrentLimitExceeded { max: i32 },

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account suspended: {0}")]
    AccountSuspended(String),

    #[error("Ledger write failed: {0}")]
    LedgerWrite(String),

    // ==================== Request / internal ====================
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Gateway request failed: {0}")]
    Gateway(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BillingError {
    /// Error code used in API responses and structured logs
    pub fn error_code(&self) -> &'static str {
        match self {
            BillingError::Connection(_) => "connection_error",
            BillingError::Protocol(_) => "protocol_error",
            BillingError::Authentication(_) => "authentication_error",
            BillingError::InsufficientBalance { .. } => "insufficient_balance",
            BillingError::DuplicateReservation(_) => "duplicate_reservation",
            BillingError::ReservationNotFound(_) => "reservation_not_found",
            BillingError::ConcurrentLimitExceeded { .. } => "concurrent_limit_exceeded",
            BillingError::AccountNotFound(_) => "account_not_found",
            BillingError::AccountSuspended(_) => "account_suspended",
            BillingError::LedgerWrite(_) => "ledger_write_failed",
            BillingError::InvalidInput(_) => "invalid_input",
            BillingError::Gateway(_) => "gateway_error",
            BillingError::Internal(_) => "internal_error",
        }
    }

    /// True for errors that must close the connection and re-enter the
    /// reconnect loop rather than being handled per call.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            BillingError::Connection(_)
                | BillingError::Protocol(_)
                | BillingError::Authentication(_)
        )
    }
}

impl ResponseError for BillingError {
    fn status_code(&self) -> StatusCode {
        match self {
            BillingError::InsufficientBalance { .. } => StatusCode::PAYMENT_REQUIRED,
            BillingError::AccountSuspended(_) => StatusCode::FORBIDDEN,
            BillingError::AccountNotFound(_) | BillingError::ReservationNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            BillingError::DuplicateReservation(_) => StatusCode::CONFLICT,
            BillingError::ConcurrentLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            BillingError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.error_code(),
            "message": self.to_string(),
        }))
    }
}
