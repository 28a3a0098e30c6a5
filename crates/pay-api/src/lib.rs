//! # pay-api
//!
//! HTTP API layer for the Entre Patitas payment engine.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - The MercadoPago webhook endpoint
//! - Checkout and order endpoints for the storefront
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | POST | `/webhook` | MercadoPago notification |
//! | POST | `/api/v1/checkout` | Create order + preference |
//! | GET | `/api/v1/orders/{n}` | Order payment state |
//! | POST | `/api/v1/orders/{n}/reconcile` | Reconcile from a payment id |

pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{AppConfig, AppState};
