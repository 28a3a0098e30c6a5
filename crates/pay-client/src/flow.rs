//! # Payment Flow
//!
//! Drives the buyer through checkout and back:
//!
//! ```text
//!   Idle ──start_checkout──▶ PreferenceCreated ──▶ Redirected
//!                                                      │
//!                              handle_return(page) ◀───┘
//!                                      │
//!                                      ▼
//!                        Returned(Success | Failure | Pending)
//! ```
//!
//! Return pages never write payment status. They read the order, and when the
//! gateway's query string reports a payment the server has not seen yet they
//! ask the server to reconcile it.

use crate::api::BoxedStorefrontApi;
use crate::cart::Cart;
use crate::markers::PaymentMarkers;
use pay_core::{
    CheckoutRequest, OrderNumber, OrderStatusView, PaymentError, PaymentResult, PaymentStatus,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{info, instrument, warn};

/// Which return page the gateway sent the buyer to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnPage {
    Success,
    Failure,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    PreferenceCreated { order_number: OrderNumber },
    Redirected { order_number: OrderNumber },
    Returned { order_number: OrderNumber, page: ReturnPage },
}

/// Query parameters the gateway appends to return URLs
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReturnParams {
    #[serde(default)]
    pub external_reference: Option<String>,
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub payment_type: Option<String>,
}

impl ReturnParams {
    /// Parse a raw query string (with or without the leading `?`)
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        let query = query.trim_start_matches('?');
        let Ok(url) = reqwest::Url::parse(&format!("http://return.local/?{}", query)) else {
            return params;
        };

        for (key, value) in url.query_pairs() {
            let value = Some(value.into_owned()).filter(|v| !v.is_empty() && v != "null");
            match key.as_ref() {
                "external_reference" => params.external_reference = value,
                "payment_id" => params.payment_id = value,
                "status" => params.status = value,
                "payment_type" => params.payment_type = value,
                _ => {}
            }
        }
        params
    }

    pub fn order_number(&self) -> Option<OrderNumber> {
        self.external_reference.as_deref()?.parse().ok()
    }
}

/// Where to send the buyer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub order_number: OrderNumber,
    pub preference_id: String,
    pub url: String,
}

/// What a return page shows
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnView {
    pub page: ReturnPage,
    pub order: OrderStatusView,
    /// True when this visit emptied the cart
    pub cart_cleared: bool,
    pub message: String,
}

/// Message for the pending page, by payment type
pub fn pending_message(payment_type: Option<&str>) -> &'static str {
    match payment_type {
        Some("ticket") => {
            "Tu pago en efectivo está pendiente. Tenés 3 días para abonarlo en el punto de pago elegido."
        }
        Some("bank_transfer") => {
            "Tu transferencia está siendo procesada. Puede demorar hasta 1 día hábil."
        }
        Some("account_money") => "Tu pago con dinero en cuenta está siendo verificado.",
        _ => "Tu pago está siendo procesado.",
    }
}

pub struct PaymentFlow {
    api: BoxedStorefrontApi,
    markers: PaymentMarkers,
    cart: Arc<dyn Cart>,
    state: Mutex<FlowState>,
}

impl PaymentFlow {
    pub fn new(api: BoxedStorefrontApi, markers: PaymentMarkers, cart: Arc<dyn Cart>) -> Self {
        Self {
            api,
            markers,
            cart,
            state: Mutex::new(FlowState::Idle),
        }
    }

    pub fn state(&self) -> FlowState {
        self.lock_state().clone()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, FlowState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: FlowState) {
        *self.lock_state() = state;
    }

    /// Create the order server-side and prepare the redirect.
    ///
    /// On failure the flow is back to `Idle` with no pending marker.
    #[instrument(skip_all, fields(items = request.items.len()))]
    pub async fn start_checkout(&self, request: &CheckoutRequest) -> PaymentResult<Redirect> {
        let created = match self.api.create_checkout(request).await {
            Ok(created) => created,
            Err(e) => {
                warn!("Checkout failed: {}", e);
                self.set_state(FlowState::Idle);
                return Err(e);
            }
        };

        let order_number = created.order_number;
        self.set_state(FlowState::PreferenceCreated { order_number });

        self.markers.set_pending(order_number);
        self.set_state(FlowState::Redirected { order_number });
        info!(%order_number, preference_id = %created.preference_id, "Redirecting to gateway");

        Ok(Redirect {
            order_number,
            preference_id: created.preference_id,
            url: created.checkout_url,
        })
    }

    /// Render a return page.
    ///
    /// Errors leave the cart and markers untouched.
    #[instrument(skip(self, params), fields(reference = ?params.external_reference))]
    pub async fn handle_return(
        &self,
        page: ReturnPage,
        params: &ReturnParams,
    ) -> PaymentResult<ReturnView> {
        let order_number = params.order_number().ok_or_else(|| {
            PaymentError::InvalidRequest("Missing or invalid external_reference".to_string())
        })?;

        let mut order = self.api.order_status(order_number).await?.ok_or_else(|| {
            PaymentError::OrderNotFound {
                order_number: order_number.to_string(),
            }
        })?;

        let mut cart_cleared = false;
        let message = match page {
            ReturnPage::Success => {
                let reported_approved = params.status.as_deref() == Some("approved");
                if order.payment_status != PaymentStatus::Approved && reported_approved {
                    if let Some(payment_id) = &params.payment_id {
                        order = self.reconcile_or_keep(order, payment_id).await;
                    }
                }

                if order.payment_status == PaymentStatus::Approved {
                    if self.markers.mark_cart_cleared(order_number) {
                        self.cart.clear();
                        cart_cleared = true;
                        info!(%order_number, "Cart cleared after approved payment");
                    }
                    format!("¡Pago aprobado! Tu pedido #{} fue confirmado.", order_number)
                } else {
                    "Estamos confirmando tu pago. Te avisaremos cuando se acredite.".to_string()
                }
            }
            ReturnPage::Failure => {
                if let Some(payment_id) = &params.payment_id {
                    order = self.reconcile_or_keep(order, payment_id).await;
                }
                "El pago no pudo completarse. Podés intentarlo nuevamente.".to_string()
            }
            ReturnPage::Pending => pending_message(params.payment_type.as_deref()).to_string(),
        };

        self.markers.clear_pending();
        self.set_state(FlowState::Returned { order_number, page });

        Ok(ReturnView {
            page,
            order,
            cart_cleared,
            message,
        })
    }

    /// The server's reconciled view, or `current` if the request fails
    async fn reconcile_or_keep(&self, current: OrderStatusView, payment_id: &str) -> OrderStatusView {
        match self
            .api
            .request_reconcile(current.order_number, payment_id)
            .await
        {
            Ok(view) => view,
            Err(e) => {
                warn!(payment_id, "Reconcile request failed: {}", e);
                current
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::StorefrontApi;
    use crate::storage::MemoryLocalStore;
    use async_trait::async_trait;
    use pay_core::{CheckoutResponse, Currency, OrderStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingCart(AtomicUsize);

    impl Cart for CountingCart {
        fn clear(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Server double holding one order
    struct FakeApi {
        order: Mutex<Option<OrderStatusView>>,
        gateway_status: Option<PaymentStatus>,
        fail_checkout: bool,
        reconciles: AtomicUsize,
    }

    impl FakeApi {
        fn with_order(payment_status: PaymentStatus) -> Self {
            Self {
                order: Mutex::new(Some(view(payment_status))),
                gateway_status: None,
                fail_checkout: false,
                reconciles: AtomicUsize::new(0),
            }
        }
    }

    fn view(payment_status: PaymentStatus) -> OrderStatusView {
        OrderStatusView {
            order_number: OrderNumber::new(5001),
            status: payment_status.order_status(),
            payment_status,
            payment_id: None,
            payment_gateway_status: None,
            total: 3300.0,
            currency: Currency::ARS,
        }
    }

    #[async_trait]
    impl StorefrontApi for FakeApi {
        async fn create_checkout(&self, _: &CheckoutRequest) -> PaymentResult<CheckoutResponse> {
            if self.fail_checkout {
                return Err(PaymentError::Gateway {
                    status: 502,
                    message: "invalid unit_price".into(),
                });
            }
            Ok(CheckoutResponse {
                order_number: OrderNumber::new(5001),
                preference_id: "pref_abc".into(),
                checkout_url: "https://sandbox.mercadopago.com.ar/checkout?pref_id=pref_abc".into(),
                expires_at: None,
            })
        }

        async fn order_status(&self, n: OrderNumber) -> PaymentResult<Option<OrderStatusView>> {
            Ok(self
                .order
                .lock()
                .unwrap()
                .clone()
                .filter(|o| o.order_number == n))
        }

        async fn request_reconcile(
            &self,
            n: OrderNumber,
            payment_id: &str,
        ) -> PaymentResult<OrderStatusView> {
            self.reconciles.fetch_add(1, Ordering::SeqCst);
            let status = self.gateway_status.ok_or_else(|| PaymentError::OrderNotFound {
                order_number: n.to_string(),
            })?;
            let mut order = self.order.lock().unwrap();
            let mut updated = view(status);
            updated.payment_id = Some(payment_id.to_string());
            *order = Some(updated.clone());
            Ok(updated)
        }
    }

    struct Fixture {
        flow: PaymentFlow,
        api: Arc<FakeApi>,
        cart: Arc<CountingCart>,
        markers: PaymentMarkers,
    }

    fn fixture(api: FakeApi) -> Fixture {
        let api = Arc::new(api);
        let cart = Arc::new(CountingCart::default());
        let markers = PaymentMarkers::new(Arc::new(MemoryLocalStore::new()));
        Fixture {
            flow: PaymentFlow::new(api.clone(), markers.clone(), cart.clone()),
            api,
            cart,
            markers,
        }
    }

    fn request() -> CheckoutRequest {
        serde_json::from_value(serde_json::json!({
            "items": [{ "product_id": "p1", "name": "Collar", "unit_price": 2500.0 }],
            "delivery": {
                "province": "Buenos Aires", "city": "La Plata", "postal_code": "1900",
                "street_address": "Calle 7 123", "phone": "2215550000"
            }
        }))
        .unwrap()
    }

    fn params(query: &str) -> ReturnParams {
        ReturnParams::from_query(query)
    }

    #[tokio::test]
    async fn test_start_checkout_sets_pending_marker() {
        let f = fixture(FakeApi::with_order(PaymentStatus::Pending));

        let redirect = f.flow.start_checkout(&request()).await.unwrap();

        assert_eq!(redirect.order_number, OrderNumber::new(5001));
        assert!(redirect.url.contains("pref_abc"));
        assert_eq!(f.markers.pending(), Some(OrderNumber::new(5001)));
        assert_eq!(
            f.flow.state(),
            FlowState::Redirected {
                order_number: OrderNumber::new(5001)
            }
        );
    }

    #[tokio::test]
    async fn test_failed_checkout_returns_to_idle() {
        let mut api = FakeApi::with_order(PaymentStatus::Pending);
        api.fail_checkout = true;
        let f = fixture(api);

        let err = f.flow.start_checkout(&request()).await.unwrap_err();

        assert!(err.to_string().contains("invalid unit_price"));
        assert_eq!(f.flow.state(), FlowState::Idle);
        assert!(!f.markers.has_pending());
    }

    #[tokio::test]
    async fn test_success_page_clears_cart_once() {
        let f = fixture(FakeApi::with_order(PaymentStatus::Approved));
        f.markers.set_pending(OrderNumber::new(5001));
        let query = "?external_reference=5001&payment_id=pay_1&status=approved";

        let first = f.flow.handle_return(ReturnPage::Success, &params(query)).await.unwrap();
        let second = f.flow.handle_return(ReturnPage::Success, &params(query)).await.unwrap();

        assert!(first.cart_cleared);
        assert!(!second.cart_cleared);
        assert_eq!(f.cart.0.load(Ordering::SeqCst), 1);
        assert!(!f.markers.has_pending());
        assert_eq!(f.api.reconciles.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success_page_asks_server_to_reconcile() {
        let mut api = FakeApi::with_order(PaymentStatus::Processing);
        api.gateway_status = Some(PaymentStatus::Approved);
        let f = fixture(api);

        let view = f
            .flow
            .handle_return(
                ReturnPage::Success,
                &params("external_reference=5001&payment_id=pay_1&status=approved"),
            )
            .await
            .unwrap();

        assert_eq!(view.order.payment_status, PaymentStatus::Approved);
        assert_eq!(view.order.status, OrderStatus::Confirmed);
        assert!(view.cart_cleared);
        assert_eq!(f.api.reconciles.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_page_without_confirmation_keeps_cart() {
        let f = fixture(FakeApi::with_order(PaymentStatus::Processing));

        let view = f
            .flow
            .handle_return(ReturnPage::Success, &params("external_reference=5001"))
            .await
            .unwrap();

        assert!(!view.cart_cleared);
        assert_eq!(f.cart.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_page() {
        let mut api = FakeApi::with_order(PaymentStatus::Processing);
        api.gateway_status = Some(PaymentStatus::Rejected);
        let f = fixture(api);
        f.markers.set_pending(OrderNumber::new(5001));

        let view = f
            .flow
            .handle_return(
                ReturnPage::Failure,
                &params("external_reference=5001&payment_id=pay_1&status=rejected"),
            )
            .await
            .unwrap();

        assert_eq!(view.order.payment_status, PaymentStatus::Rejected);
        assert!(!f.markers.has_pending());
        assert_eq!(f.cart.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_pending_page_messages() {
        let f = fixture(FakeApi::with_order(PaymentStatus::Processing));
        f.markers.set_pending(OrderNumber::new(5001));

        let view = f
            .flow
            .handle_return(
                ReturnPage::Pending,
                &params("external_reference=5001&payment_type=ticket"),
            )
            .await
            .unwrap();

        assert!(view.message.contains("3 días"));
        assert!(!f.markers.has_pending());
        assert_eq!(f.cart.0.load(Ordering::SeqCst), 0);

        assert!(pending_message(Some("bank_transfer")).contains("1 día hábil"));
        assert!(pending_message(Some("account_money")).contains("verificado"));
        assert_eq!(pending_message(None), "Tu pago está siendo procesado.");
    }

    #[tokio::test]
    async fn test_bad_reference_touches_nothing() {
        let f = fixture(FakeApi::with_order(PaymentStatus::Approved));
        f.markers.set_pending(OrderNumber::new(5001));

        let err = f
            .flow
            .handle_return(ReturnPage::Success, &params("status=approved"))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidRequest(_)));

        let err = f
            .flow
            .handle_return(ReturnPage::Success, &params("external_reference=9999"))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::OrderNotFound { .. }));

        assert!(f.markers.has_pending());
        assert_eq!(f.cart.0.load(Ordering::SeqCst), 0);
        assert_eq!(f.flow.state(), FlowState::Idle);
    }

    #[test]
    fn test_params_from_query() {
        let p = params("?external_reference=5001&payment_id=123&status=approved&payment_type=credit_card&x=1");
        assert_eq!(p.order_number(), Some(OrderNumber::new(5001)));
        assert_eq!(p.payment_id.as_deref(), Some("123"));
        assert_eq!(p.payment_type.as_deref(), Some("credit_card"));

        let empty = params("external_reference=null&payment_id=");
        assert_eq!(empty, ReturnParams::default());
    }
}
