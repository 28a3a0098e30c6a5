//! # Payment Error Types
//!
//! Typed error handling for the storefront payment engine.
//! All payment operations return `Result<T, PaymentError>`.

use thiserror::Error;

/// Core error type for all payment operations
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Configuration errors (missing credentials, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid request data (empty orders, missing delivery fields)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The payment gateway rejected the request
    #[error("Gateway error [{status}]: {message}")]
    Gateway { status: u16, message: String },

    /// Network/HTTP error communicating with the gateway or the store
    #[error("Network error: {0}")]
    Network(String),

    /// No order matches the external reference
    #[error("Order not found: {order_number}")]
    OrderNotFound { order_number: String },

    /// Payment carries no usable external reference
    #[error("Payment {payment_id} has no usable external reference")]
    MissingReference { payment_id: String },

    /// Order store read/write failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Webhook signature verification failed
    #[error("Webhook verification failed: {0}")]
    WebhookVerificationFailed(String),

    /// Webhook payload parsing error
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PaymentError {
    /// Returns true if retrying the same operation later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::Gateway { status, .. } => *status >= 500 || *status == 429,
            PaymentError::Network(_)
            | PaymentError::OrderNotFound { .. }
            | PaymentError::Persistence(_) => true,
            _ => false,
        }
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            PaymentError::Configuration(_) => 500,
            PaymentError::InvalidRequest(_) => 400,
            PaymentError::Gateway { .. } => 502,
            PaymentError::Network(_) => 503,
            PaymentError::OrderNotFound { .. } => 404,
            PaymentError::MissingReference { .. } => 404,
            PaymentError::Persistence(_) => 500,
            PaymentError::WebhookVerificationFailed(_) => 400,
            PaymentError::WebhookParse(_) => 400,
            PaymentError::Serialization(_) => 500,
            PaymentError::Internal(_) => 500,
        }
    }
}

/// Result type alias for payment operations
pub type PaymentResult<T> = Result<T, PaymentError>;
