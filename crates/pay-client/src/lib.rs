//! # pay-client
//!
//! Storefront side of a MercadoPago payment:
//! - `PaymentFlow` creates the checkout, redirects and renders return pages
//! - `PaymentMarkers` remember the pending order and whether the cart was cleared
//! - `OrderMonitor` polls an order until its payment settles
//! - `PopupBridge` reports a popup checkout back to the opener window
//!
//! Payment status is never written from here. Return pages read the order
//! and, at most, ask the server to reconcile a payment id.

pub mod api;
pub mod cart;
pub mod channel;
pub mod flow;
pub mod markers;
pub mod monitor;
pub mod storage;

pub use api::{BoxedStorefrontApi, HttpStorefrontApi, StorefrontApi};
pub use cart::Cart;
pub use channel::{
    window_channel, OutcomeStatus, PaymentOutcome, PopupBridge, WindowListener, WindowMessage,
    WindowPort,
};
pub use flow::{pending_message, FlowState, PaymentFlow, Redirect, ReturnPage, ReturnParams, ReturnView};
pub use markers::PaymentMarkers;
pub use monitor::{MonitorConfig, MonitorHandle, MonitorOutcome, OrderMonitor};
pub use storage::{LocalStore, MemoryLocalStore};
