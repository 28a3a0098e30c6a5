#![allow(dead_code)]

use async_trait::async_trait;
use axum_test::TestServer;
use chrono::{Duration, Utc};
use pay_api::{create_router, AppConfig, AppState};
use pay_core::{
    AppliedUpdate, BoxedOrderStore, Currency, InMemoryOrderStore, LineItem, Order, OrderNumber,
    OrderStore, PaymentDetails, PaymentError, PaymentGateway, PaymentResult, PaymentUpdate,
    Preference, Price, Reconciler, ReturnUrls, RetryPolicy,
};
use pay_mercadopago::SignatureVerifier;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Gateway double: canned payments, counted calls
#[derive(Default)]
pub struct FakeGateway {
    payments: Mutex<HashMap<String, PaymentDetails>>,
    reject_with: Option<String>,
    fetches: AtomicUsize,
    preferences: AtomicUsize,
    last_reference: Mutex<Option<String>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(message: &str) -> Self {
        Self {
            reject_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn with_payment(self, id: &str, status: &str, reference: &str) -> Self {
        self.payments.lock().unwrap().insert(
            id.to_string(),
            PaymentDetails::new(id, status, Some(reference.to_string())),
        );
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn preferences(&self) -> usize {
        self.preferences.load(Ordering::SeqCst)
    }

    pub fn last_reference(&self) -> Option<String> {
        self.last_reference.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_preference(
        &self,
        order: &Order,
        _urls: &ReturnUrls,
    ) -> PaymentResult<Preference> {
        self.preferences.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.reject_with {
            return Err(PaymentError::Gateway {
                status: 400,
                message: message.clone(),
            });
        }
        *self.last_reference.lock().unwrap() = Some(order.order_number.external_reference());

        let now = Utc::now();
        Ok(Preference {
            preference_id: "pref_abc".to_string(),
            order_number: order.order_number,
            live_checkout_url: "https://www.mercadopago.com.ar/checkout/v1/redirect?pref_id=pref_abc"
                .to_string(),
            sandbox_checkout_url: Some(
                "https://sandbox.mercadopago.com.ar/checkout/v1/redirect?pref_id=pref_abc"
                    .to_string(),
            ),
            expires_at: Some(now + Duration::minutes(30)),
            created_at: now,
        })
    }

    async fn fetch_payment_details(&self, payment_id: &str) -> Option<PaymentDetails> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.payments.lock().unwrap().get(payment_id).cloned()
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }

    fn is_sandbox(&self) -> bool {
        true
    }
}

/// Store double whose every call fails like an unreachable database
pub struct FailingStore;

impl FailingStore {
    fn error() -> PaymentError {
        PaymentError::Persistence("connection refused".to_string())
    }
}

#[async_trait]
impl OrderStore for FailingStore {
    async fn insert(&self, _order: Order) -> PaymentResult<Order> {
        Err(Self::error())
    }

    async fn find(&self, _order_number: OrderNumber) -> PaymentResult<Option<Order>> {
        Err(Self::error())
    }

    async fn attach_preference(
        &self,
        _order_number: OrderNumber,
        _preference_id: &str,
    ) -> PaymentResult<Option<Order>> {
        Err(Self::error())
    }

    async fn apply_payment_update(
        &self,
        _order_number: OrderNumber,
        _update: &PaymentUpdate,
    ) -> PaymentResult<Option<AppliedUpdate>> {
        Err(Self::error())
    }
}

pub struct Harness {
    pub server: TestServer,
    pub store: InMemoryOrderStore,
    pub gateway: Arc<FakeGateway>,
}

pub fn harness(gateway: FakeGateway, verifier: Option<SignatureVerifier>) -> Harness {
    let store = InMemoryOrderStore::new();
    let gateway = Arc::new(gateway);

    let state = AppState::with_parts(
        gateway.clone(),
        Arc::new(store.clone()),
        verifier,
        AppConfig::default(),
    )
    .with_reconciler(Reconciler::new(Arc::new(store.clone())).with_retry(RetryPolicy::none()));

    Harness {
        server: TestServer::new(create_router(state)).unwrap(),
        store,
        gateway,
    }
}

/// Order #number with preference `pref_abc` attached
pub async fn seed_order(store: &InMemoryOrderStore, number: i64) -> Order {
    let order = Order::new(OrderNumber::new(number), Currency::ARS)
        .with_item(LineItem::new("p1", "Collar", Price::new(2500.0, Currency::ARS), 1))
        .with_shipping(Price::new(800.0, Currency::ARS));
    store.insert(order).await.unwrap();
    store
        .attach_preference(OrderNumber::new(number), "pref_abc")
        .await
        .unwrap()
        .unwrap()
}

/// Server over an arbitrary store, for failure paths
pub fn server_with_store(gateway: Arc<FakeGateway>, store: BoxedOrderStore) -> TestServer {
    let state = AppState::with_parts(gateway, store.clone(), None, AppConfig::default())
        .with_reconciler(Reconciler::new(store).with_retry(RetryPolicy::none()));
    TestServer::new(create_router(state)).unwrap()
}
