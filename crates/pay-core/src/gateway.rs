//! # Payment Gateway Trait
//!
//! The seam between the storefront and a hosted-checkout payment gateway.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PaymentGateway (trait)                   │
//! │  ├── create_preference()                                    │
//! │  ├── fetch_payment_details()                                │
//! │  └── provider_name()                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                   ┌────────┴────────┐
//!                   │MercadoPagoGateway│
//!                   └─────────────────┘
//! ```

use crate::error::PaymentResult;
use crate::order::Order;
use crate::payment::{PaymentDetails, Preference};
use async_trait::async_trait;
use std::sync::Arc;

/// Core trait for payment gateway implementations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a checkout preference for an order.
    ///
    /// Implementations must validate the order before any network call and
    /// must set the gateway's external reference to the order number.
    async fn create_preference(&self, order: &Order, urls: &ReturnUrls)
        -> PaymentResult<Preference>;

    /// Fetch canonical payment facts by gateway payment id.
    ///
    /// Returns `None` on any failure so webhook callers can answer with a
    /// retryable status instead of erroring out.
    async fn fetch_payment_details(&self, payment_id: &str) -> Option<PaymentDetails>;

    /// Get the provider name (for logging)
    fn provider_name(&self) -> &'static str;

    /// Whether the gateway runs against test credentials
    fn is_sandbox(&self) -> bool {
        false
    }
}

/// Type alias for a shared payment gateway (dynamic dispatch)
pub type BoxedPaymentGateway = Arc<dyn PaymentGateway>;

/// Where the gateway sends the buyer back to, and where it posts notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnUrls {
    pub success_url: String,
    pub failure_url: String,
    pub pending_url: String,
    /// Webhook URL the gateway notifies (optional, may be set account-wide)
    pub notification_url: Option<String>,
}

impl ReturnUrls {
    /// Derive the three return pages from a storefront base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let base = base_url.trim_end_matches('/');
        Self {
            success_url: format!("{}/pago-exitoso", base),
            failure_url: format!("{}/pago-fallido", base),
            pending_url: format!("{}/pago-pendiente", base),
            notification_url: None,
        }
    }

    /// Builder: set the webhook notification URL
    pub fn with_notification_url(mut self, url: impl Into<String>) -> Self {
        self.notification_url = Some(url.into());
        self
    }
}

impl Default for ReturnUrls {
    fn default() -> Self {
        Self::new("http://localhost:5173")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_urls() {
        let urls = ReturnUrls::new("https://shop.example/Ecommerce/")
            .with_notification_url("https://api.example/webhook");

        assert_eq!(urls.success_url, "https://shop.example/Ecommerce/pago-exitoso");
        assert_eq!(urls.failure_url, "https://shop.example/Ecommerce/pago-fallido");
        assert_eq!(urls.pending_url, "https://shop.example/Ecommerce/pago-pendiente");
        assert_eq!(urls.notification_url.as_deref(), Some("https://api.example/webhook"));
    }
}
