//! # Request Handlers
//!
//! Axum request handlers for the payment API: the MercadoPago webhook, the
//! server-side checkout leg and the order read/reconcile endpoints used by
//! the storefront return pages.

use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use pay_core::{
    CheckoutRequest, CheckoutResponse, OrderNumber, OrderStatusView, PaymentError,
    PaymentStatus, ReconcileRequest, Transition,
};
use pay_mercadopago::Notification;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn, Span};
use uuid::Uuid;

// =============================================================================
// Response Types
// =============================================================================

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(code: StatusCode, message: impl Into<String>, request_id: &str) -> ApiError {
    (
        code,
        Json(ErrorResponse::new(message, code.as_u16()).with_request_id(request_id)),
    )
}

fn payment_error_to_response(err: PaymentError, request_id: &str) -> ApiError {
    let code = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    api_error(code, err.to_string(), request_id)
}

/// Inbound `x-request-id`, or a fresh one
fn request_id(headers: &HeaderMap) -> String {
    header_str(headers, "x-request-id")
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
}

fn parse_order_number(raw: &str, request_id: &str) -> Result<OrderNumber, ApiError> {
    raw.parse().map_err(|_| {
        api_error(
            StatusCode::BAD_REQUEST,
            format!("Invalid order number: {}", raw),
            request_id,
        )
    })
}

/// Webhook acknowledgement
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    /// `processed` or `ignored`
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_number: Option<OrderNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Transition>,
}

impl WebhookAck {
    fn ignored() -> Self {
        Self {
            status: "ignored",
            order_number: None,
            payment_status: None,
            outcome: None,
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "patitas-pay",
        "version": env!("CARGO_PKG_VERSION"),
        "gateway": state.gateway.provider_name(),
        "sandbox": state.gateway.is_sandbox(),
    }))
}

/// CORS preflight for `/webhook`
pub async fn webhook_preflight() -> &'static str {
    "ok"
}

/// Any other method on `/webhook`
pub async fn method_not_allowed(headers: HeaderMap) -> ApiError {
    let request_id = request_id(&headers);
    warn!(%request_id, "Webhook called with unsupported method");
    api_error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed", &request_id)
}

/// Handle a MercadoPago webhook delivery.
///
/// The body only says which payment changed; the payment itself is fetched
/// from the gateway and handed to the reconciler. Every branch answers with
/// an explicit status.
#[instrument(skip_all, fields(request_id = tracing::field::Empty))]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = request_id(&headers);
    Span::current().record("request_id", request_id.as_str());

    match process_webhook(&state, &headers, &body, &request_id).await {
        Ok(ack) => (StatusCode::OK, Json(ack)).into_response(),
        Err(rejection) => rejection.into_response(),
    }
}

async fn process_webhook(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
    request_id: &str,
) -> Result<WebhookAck, ApiError> {
    let notification = Notification::parse(body).map_err(|e| {
        warn!("Rejecting webhook: {}", e);
        payment_error_to_response(e, request_id)
    })?;

    if !notification.has_data() {
        warn!("Rejecting webhook without data");
        return Err(payment_error_to_response(
            PaymentError::WebhookParse("Missing data".to_string()),
            request_id,
        ));
    }
    let data_id = notification.data_id();

    match &state.verifier {
        Some(verifier) => verifier
            .verify(
                header_str(headers, "x-signature"),
                header_str(headers, "x-request-id"),
                data_id.as_deref(),
            )
            .map_err(|e| {
                warn!("Webhook signature rejected: {}", e);
                payment_error_to_response(e.into(), request_id)
            })?,
        None => debug!("No webhook secret configured, signature not checked"),
    }

    if !notification.is_payment() {
        info!(kind = ?notification.kind, "Ignoring non-payment notification");
        return Ok(WebhookAck::ignored());
    }

    let data_id = notification.payment_id().map_err(|e| {
        warn!("Rejecting payment webhook: {}", e);
        payment_error_to_response(e, request_id)
    })?;

    info!(payment_id = %data_id, action = ?notification.action, "Payment notification received");

    let details = state
        .gateway
        .fetch_payment_details(&data_id)
        .await
        .ok_or_else(|| {
            warn!(payment_id = %data_id, "Payment not found at gateway");
            api_error(
                StatusCode::NOT_FOUND,
                format!("Payment {} not found", data_id),
                request_id,
            )
        })?;

    let reconciled = state.reconciler.reconcile(&details).await.map_err(|e| {
        match &e {
            PaymentError::OrderNotFound { .. } | PaymentError::MissingReference { .. } => {
                warn!(payment_id = %data_id, "Payment could not be matched: {}", e)
            }
            _ => error!(payment_id = %data_id, "Reconcile failed: {}", e),
        }
        payment_error_to_response(e, request_id)
    })?;

    info!(
        order_number = %reconciled.order.order_number,
        payment_status = %reconciled.order.payment_status,
        outcome = ?reconciled.outcome,
        "Webhook processed"
    );

    Ok(WebhookAck {
        status: "processed",
        order_number: Some(reconciled.order.order_number),
        payment_status: Some(reconciled.order.payment_status),
        outcome: Some(reconciled.outcome),
    })
}

/// Create an order and its checkout preference
#[instrument(skip_all, fields(items = request.items.len()))]
pub async fn create_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let request_id = request_id(&headers);

    let order = request
        .into_order(&state.settings)
        .map_err(|e| payment_error_to_response(e, &request_id))?;

    let order = state.store.insert(order).await.map_err(|e| {
        error!("Failed to store order: {}", e);
        payment_error_to_response(e, &request_id)
    })?;

    info!(
        "Creating checkout: order={}, {} items, total={}",
        order.order_number,
        order.item_count(),
        order.total().display()
    );

    let preference = state
        .gateway
        .create_preference(&order, &state.urls)
        .await
        .map_err(|e| {
            error!(order_number = %order.order_number, "Failed to create preference: {}", e);
            payment_error_to_response(e, &request_id)
        })?;

    state
        .store
        .attach_preference(order.order_number, &preference.preference_id)
        .await
        .map_err(|e| {
            error!("Failed to attach preference: {}", e);
            payment_error_to_response(e, &request_id)
        })?;

    info!(
        order_number = %order.order_number,
        preference_id = %preference.preference_id,
        "Created checkout preference"
    );

    Ok(Json(CheckoutResponse::from_preference(
        &preference,
        state.gateway.is_sandbox(),
    )))
}

/// Current payment state of an order
#[instrument(skip(state, headers))]
pub async fn get_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(order_number): Path<String>,
) -> Result<Json<OrderStatusView>, ApiError> {
    let request_id = request_id(&headers);
    let order_number = parse_order_number(&order_number, &request_id)?;

    let order = state
        .store
        .find(order_number)
        .await
        .map_err(|e| payment_error_to_response(e, &request_id))?
        .ok_or_else(|| {
            api_error(
                StatusCode::NOT_FOUND,
                format!("Order not found: {}", order_number),
                &request_id,
            )
        })?;

    Ok(Json(OrderStatusView::from(&order)))
}

/// Reconcile an order from a payment id reported on a return page
#[instrument(skip(state, headers, request), fields(payment_id = %request.payment_id))]
pub async fn reconcile_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(order_number): Path<String>,
    Json(request): Json<ReconcileRequest>,
) -> Result<Json<OrderStatusView>, ApiError> {
    let request_id = request_id(&headers);
    let order_number = parse_order_number(&order_number, &request_id)?;

    let details = state
        .gateway
        .fetch_payment_details(&request.payment_id)
        .await
        .ok_or_else(|| {
            api_error(
                StatusCode::NOT_FOUND,
                format!("Payment {} not found", request.payment_id),
                &request_id,
            )
        })?;

    if details.order_number() != Some(order_number) {
        warn!(
            reference = ?details.external_reference,
            "Payment does not belong to order {}", order_number
        );
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!(
                "Payment {} does not belong to order {}",
                request.payment_id, order_number
            ),
            &request_id,
        ));
    }

    let reconciled = state
        .reconciler
        .reconcile(&details)
        .await
        .map_err(|e| payment_error_to_response(e, &request_id))?;

    Ok(Json(OrderStatusView::from(&reconciled.order)))
}
