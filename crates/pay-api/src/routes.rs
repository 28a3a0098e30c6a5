//! # Routes
//!
//! Axum router configuration for the payment API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

const ALLOWED_HEADERS: &str =
    "authorization, x-client-info, apikey, content-type, x-signature, x-request-id";

/// Create the main application router
///
/// Routes:
/// - GET  /health - Health check
/// - POST /webhook - MercadoPago notifications
/// - OPTIONS /webhook - Preflight, answers `ok`
/// - POST /api/v1/checkout - Create order and checkout preference
/// - GET  /api/v1/orders/{order_number} - Order payment state
/// - POST /api/v1/orders/{order_number}/reconcile - Reconcile from a payment id
///
/// Any other method on `/webhook` gets a 405.
pub fn create_router(state: AppState) -> Router {
    // The storefront calls in from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            HeaderName::from_static("x-signature"),
            HeaderName::from_static("x-request-id"),
        ]);

    let api_routes = Router::new()
        .route("/checkout", post(handlers::create_checkout))
        .route("/orders/{order_number}", get(handlers::get_order))
        .route(
            "/orders/{order_number}/reconcile",
            post(handlers::reconcile_order),
        );

    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .nest("/api/v1", api_routes)
        .layer(cors);

    // Kept out of the CorsLayer, which would answer OPTIONS itself
    let webhook = Router::new()
        .route(
            "/webhook",
            post(handlers::payment_webhook)
                .options(handlers::webhook_preflight)
                .fallback(handlers::method_not_allowed),
        )
        .layer(middleware::map_response(webhook_cors_headers));

    app.merge(webhook)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn webhook_cors_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    response
}
