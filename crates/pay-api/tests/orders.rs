mod common;

use axum::http::StatusCode;
use common::{harness, seed_order, FakeGateway};
use pay_core::{OrderNumber, OrderStore, PaymentStatus};
use serde_json::{json, Value};

fn checkout_body() -> Value {
    json!({
        "items": [
            { "product_id": "p1", "name": "Collar", "unit_price": 1250.0, "quantity": 2 }
        ],
        "delivery": {
            "province": "Buenos Aires",
            "city": "La Plata",
            "postal_code": "1900",
            "street_address": "Calle 7 123",
            "phone": "2215550000"
        },
        "customer_id": "user-1"
    })
}

#[tokio::test]
async fn checkout_creates_order_and_preference() {
    let h = harness(FakeGateway::new(), None);

    let response = h.server.post("/api/v1/checkout").json(&checkout_body()).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["preference_id"], "pref_abc");
    assert!(body["checkout_url"].as_str().unwrap().contains("sandbox"));

    let order_number = OrderNumber::new(body["order_number"].as_i64().unwrap());
    assert_eq!(
        h.gateway.last_reference().as_deref(),
        Some(order_number.to_string().as_str())
    );

    let order = h.store.find(order_number).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Processing);
    assert_eq!(order.payment_preference_id.as_deref(), Some("pref_abc"));
    assert_eq!(order.total().as_decimal(), 3300.0);
}

#[tokio::test]
async fn checkout_validates_before_calling_gateway() {
    let h = harness(FakeGateway::new(), None);

    let mut body = checkout_body();
    body["delivery"]["phone"] = json!("");
    let response = h.server.post("/api/v1/checkout").json(&body).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let mut body = checkout_body();
    body["items"] = json!([]);
    let response = h.server.post("/api/v1/checkout").json(&body).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    assert_eq!(h.gateway.preferences(), 0);
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn checkout_rejects_out_of_range_amounts() {
    let h = harness(FakeGateway::new(), None);

    let mut body = checkout_body();
    body["items"][0]["unit_price"] = json!(1e300);
    let response = h.server.post("/api/v1/checkout").json(&body).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let mut body = checkout_body();
    body["items"][0]["quantity"] = json!(1_000_000);
    let response = h.server.post("/api/v1/checkout").json(&body).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    assert_eq!(h.gateway.preferences(), 0);
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn gateway_rejection_surfaces_message_and_leaves_order_pending() {
    let h = harness(FakeGateway::rejecting("invalid unit_price"), None);

    let response = h.server.post("/api/v1/checkout").json(&checkout_body()).await;

    assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("invalid unit_price"));

    assert_eq!(h.store.len().await, 1);
    assert_eq!(h.store.write_count(), 1);
}

#[tokio::test]
async fn order_lookup() {
    let h = harness(FakeGateway::new(), None);
    seed_order(&h.store, 5001).await;

    let response = h.server.get("/api/v1/orders/5001").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["payment_status"], "processing");
    assert_eq!(body["status"], "pending");
    assert_eq!(body["total"], 3300.0);

    let response = h.server.get("/api/v1/orders/9999").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let response = h.server.get("/api/v1/orders/abc").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reconcile_from_return_page() {
    let h = harness(
        FakeGateway::new()
            .with_payment("pay_1", "approved", "5001")
            .with_payment("pay_9", "approved", "7000"),
        None,
    );
    seed_order(&h.store, 5001).await;

    let response = h
        .server
        .post("/api/v1/orders/5001/reconcile")
        .json(&json!({ "payment_id": "pay_9" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = h
        .server
        .post("/api/v1/orders/5001/reconcile")
        .json(&json!({ "payment_id": "nope" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let response = h
        .server
        .post("/api/v1/orders/5001/reconcile")
        .json(&json!({ "payment_id": "pay_1" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["payment_status"], "approved");
    assert_eq!(body["status"], "confirmed");
    assert_eq!(body["payment_id"], "pay_1");
}
