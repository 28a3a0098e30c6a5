//! # Storefront API Client
//!
//! The client's view of `pay-api`. Payment status is only ever read here;
//! writes happen server-side through the reconciler.

use async_trait::async_trait;
use pay_core::{
    CheckoutRequest, CheckoutResponse, OrderNumber, OrderStatusView, PaymentError,
    PaymentResult, ReconcileRequest,
};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

#[async_trait]
pub trait StorefrontApi: Send + Sync {
    /// Create the order and its gateway preference
    async fn create_checkout(&self, request: &CheckoutRequest) -> PaymentResult<CheckoutResponse>;

    /// Current payment state; `None` when the order does not exist
    async fn order_status(&self, order_number: OrderNumber)
        -> PaymentResult<Option<OrderStatusView>>;

    /// Ask the server to fetch `payment_id` from the gateway and reconcile
    async fn request_reconcile(
        &self,
        order_number: OrderNumber,
        payment_id: &str,
    ) -> PaymentResult<OrderStatusView>;
}

pub type BoxedStorefrontApi = Arc<dyn StorefrontApi>;

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: String,
}

/// [`StorefrontApi`] over HTTP
pub struct HttpStorefrontApi {
    base_url: String,
    client: Client,
}

impl HttpStorefrontApi {
    pub fn new(base_url: impl Into<String>) -> PaymentResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| PaymentError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    /// Body of a successful response, or the error it carries. A 404 names
    /// `order_number` when the request was about a specific order.
    async fn decode<T: DeserializeOwned>(
        response: Response,
        order_number: Option<OrderNumber>,
    ) -> PaymentResult<T> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PaymentError::Network(e.to_string()))?;

        if status.is_success() {
            return serde_json::from_str(&text).map_err(|e| {
                PaymentError::Serialization(format!("Unexpected API response: {}", e))
            });
        }

        let message = serde_json::from_str::<ApiErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or(text);

        Err(match (status, order_number) {
            (StatusCode::BAD_REQUEST, _) => PaymentError::InvalidRequest(message),
            (StatusCode::NOT_FOUND, Some(order_number)) => {
                debug!("{}", message);
                PaymentError::OrderNotFound {
                    order_number: order_number.to_string(),
                }
            }
            _ => PaymentError::Gateway {
                status: status.as_u16(),
                message,
            },
        })
    }
}

#[async_trait]
impl StorefrontApi for HttpStorefrontApi {
    #[instrument(skip(self, request))]
    async fn create_checkout(&self, request: &CheckoutRequest) -> PaymentResult<CheckoutResponse> {
        let response = self
            .client
            .post(self.url("/checkout"))
            .json(request)
            .send()
            .await
            .map_err(|e| PaymentError::Network(e.to_string()))?;

        Self::decode(response, None).await
    }

    #[instrument(skip(self))]
    async fn order_status(
        &self,
        order_number: OrderNumber,
    ) -> PaymentResult<Option<OrderStatusView>> {
        let response = self
            .client
            .get(self.url(&format!("/orders/{}", order_number)))
            .send()
            .await
            .map_err(|e| PaymentError::Network(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("order not found");
            return Ok(None);
        }

        Self::decode(response, Some(order_number)).await.map(Some)
    }

    #[instrument(skip(self))]
    async fn request_reconcile(
        &self,
        order_number: OrderNumber,
        payment_id: &str,
    ) -> PaymentResult<OrderStatusView> {
        let response = self
            .client
            .post(self.url(&format!("/orders/{}/reconcile", order_number)))
            .json(&ReconcileRequest {
                payment_id: payment_id.to_string(),
            })
            .send()
            .await
            .map_err(|e| PaymentError::Network(e.to_string()))?;

        Self::decode(response, Some(order_number)).await
    }
}
