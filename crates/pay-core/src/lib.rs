//! # pay-core
//!
//! Core types and traits for the storefront payment engine.
//!
//! This crate provides:
//! - `Order`, `OrderStatus`, `PaymentStatus` and the monotonic payment update rules
//! - `PaymentGateway` trait for hosted-checkout providers
//! - `OrderStore` trait plus an in-memory store
//! - `Reconciler`, the only writer of gateway payment facts
//! - Checkout request/response types shared by server and client
//! - `PaymentError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use pay_core::{Reconciler, InMemoryOrderStore, PaymentDetails};
//!
//! let store = Arc::new(InMemoryOrderStore::new());
//! let reconciler = Reconciler::new(store.clone());
//!
//! // In the webhook, after fetching the payment from the gateway
//! let details = gateway.fetch_payment_details("pay_1").await?;
//! let result = reconciler.reconcile(&details).await?;
//! ```

pub mod checkout;
pub mod error;
pub mod gateway;
pub mod money;
pub mod order;
pub mod payment;
pub mod reconcile;
pub mod store;

// Re-exports for convenience
pub use checkout::{
    CheckoutItem, CheckoutRequest, CheckoutResponse, OrderStatusView, ReconcileRequest,
    StorefrontSettings, MAX_QUANTITY, MAX_UNIT_PRICE,
};
pub use error::{PaymentError, PaymentResult};
pub use gateway::{BoxedPaymentGateway, PaymentGateway, ReturnUrls};
pub use money::{Currency, Price};
pub use order::{
    Buyer, DeliveryAddress, LineItem, Order, OrderNumber, OrderStatus, PaymentStatus,
    PaymentUpdate, Transition,
};
pub use payment::{PaymentDetails, Preference};
pub use reconcile::{Reconciler, Reconciliation, RetryPolicy};
pub use store::{AppliedUpdate, BoxedOrderStore, InMemoryOrderStore, OrderStore};
