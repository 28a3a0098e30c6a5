//! # pay-mercadopago
//!
//! MercadoPago Checkout Pro gateway for the storefront payment engine.
//!
//! - **MercadoPagoGateway** creates checkout preferences and fetches payments
//!   for reconciliation
//! - **SignatureVerifier** checks the `x-signature` header of webhook deliveries
//! - **Notification** parses webhook bodies
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pay_mercadopago::MercadoPagoGateway;
//! use pay_core::{PaymentGateway, ReturnUrls};
//!
//! let gateway = MercadoPagoGateway::from_env()?;
//! let preference = gateway
//!     .create_preference(&order, &ReturnUrls::new("https://shop.example"))
//!     .await?;
//!
//! // Redirect the buyer to preference.checkout_url(gateway.is_sandbox())
//! ```
//!
//! ## Webhook Handling
//!
//! ```rust,ignore
//! let notification = Notification::parse(&body)?;
//! verifier.verify(signature, request_id, notification.data_id().as_deref())?;
//!
//! if notification.is_payment() {
//!     let details = gateway.fetch_payment_details(&notification.payment_id()?).await;
//!     // hand details to the Reconciler
//! }
//! ```

pub mod config;
pub mod gateway;
pub mod notification;
pub mod signature;

// Re-exports
pub use config::MercadoPagoConfig;
pub use gateway::MercadoPagoGateway;
pub use notification::{Notification, NotificationData};
pub use signature::{manifest, SignatureError, SignatureVerifier};
