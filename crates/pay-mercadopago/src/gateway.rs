//! # MercadoPago Checkout Preferences
//!
//! Implementation of the `PaymentGateway` trait against the MercadoPago
//! Checkout Pro API: preferences for the redirect checkout, and payment
//! lookups for webhook reconciliation.

use crate::config::MercadoPagoConfig;
use crate::notification::id_from_value;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use pay_core::{
    Order, PaymentDetails, PaymentError, PaymentGateway, PaymentResult, Preference, ReturnUrls,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

const PLACEHOLDER_NAME: &str = "Cliente";
const PLACEHOLDER_SURNAME: &str = "Test";
const PLACEHOLDER_EMAIL: &str = "cliente.test@example.com";
const SHIPPING_ITEM_ID: &str = "envio";
const ITEM_CATEGORY: &str = "pets";

/// MercadoPago Checkout Pro gateway
pub struct MercadoPagoGateway {
    config: MercadoPagoConfig,
    client: Client,
}

impl MercadoPagoGateway {
    /// Create a new gateway client
    pub fn new(config: MercadoPagoConfig) -> PaymentResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> PaymentResult<Self> {
        Self::new(MercadoPagoConfig::from_env()?)
    }

    pub fn config(&self) -> &MercadoPagoConfig {
        &self.config
    }

    fn validate(order: &Order) -> PaymentResult<()> {
        if order.is_empty() {
            return Err(PaymentError::InvalidRequest(
                "Order has no line items".to_string(),
            ));
        }
        if let Some(item) = order.line_items.iter().find(|i| i.quantity == 0) {
            return Err(PaymentError::InvalidRequest(format!(
                "Line item {} has zero quantity",
                item.product_id
            )));
        }
        Ok(())
    }

    /// Build the preference body for an order
    fn build_preference(
        &self,
        order: &Order,
        urls: &ReturnUrls,
        now: DateTime<Utc>,
    ) -> PreferenceRequest {
        let currency_id = order.currency.code().to_string();

        let mut items: Vec<PreferenceItem> = order
            .line_items
            .iter()
            .map(|item| PreferenceItem {
                id: item.product_id.clone(),
                title: item.name.clone(),
                description: item
                    .description
                    .clone()
                    .unwrap_or_else(|| format!("Accesorio para mascotas - {}", item.name)),
                picture_url: item.image_url.clone(),
                category_id: Some(ITEM_CATEGORY.to_string()),
                quantity: item.quantity,
                currency_id: currency_id.clone(),
                unit_price: item.unit_price.as_decimal(),
            })
            .collect();

        if order.shipping_cost.amount > 0 {
            items.push(PreferenceItem {
                id: SHIPPING_ITEM_ID.to_string(),
                title: "Costo de envío".to_string(),
                description: "Envío a domicilio".to_string(),
                picture_url: None,
                category_id: None,
                quantity: 1,
                currency_id: currency_id.clone(),
                unit_price: order.shipping_cost.as_decimal(),
            });
        }

        let buyer = &order.buyer;
        let payer = PreferencePayer {
            name: buyer
                .name
                .clone()
                .unwrap_or_else(|| PLACEHOLDER_NAME.to_string()),
            surname: buyer
                .surname
                .clone()
                .unwrap_or_else(|| PLACEHOLDER_SURNAME.to_string()),
            email: buyer
                .email
                .clone()
                .unwrap_or_else(|| PLACEHOLDER_EMAIL.to_string()),
            phone: PayerPhone {
                area_code: String::new(),
                number: order.delivery.phone.clone(),
            },
            address: PayerAddress {
                street_name: order.delivery.street_address.clone(),
                street_number: String::new(),
                zip_code: order.delivery.postal_code.clone(),
            },
        };

        let expires_at = now + self.config.preference_ttl;

        PreferenceRequest {
            items,
            payer,
            payment_methods: PaymentMethods {
                excluded_payment_types: Vec::new(),
                excluded_payment_methods: Vec::new(),
                installments: self.config.max_installments,
                default_installments: self.config.default_installments,
            },
            back_urls: BackUrls {
                success: urls.success_url.clone(),
                failure: urls.failure_url.clone(),
                pending: urls.pending_url.clone(),
            },
            auto_return: "approved",
            binary_mode: false,
            external_reference: order.order_number.external_reference(),
            notification_url: urls.notification_url.clone(),
            expires: true,
            expiration_date_from: now.to_rfc3339_opts(SecondsFormat::Millis, false),
            expiration_date_to: expires_at.to_rfc3339_opts(SecondsFormat::Millis, false),
            metadata: PreferenceMetadata {
                order_number: order.order_number.value(),
                customer_id: order.customer_id.clone(),
                store: self.config.store_name.clone(),
            },
        }
    }
}

#[async_trait]
impl PaymentGateway for MercadoPagoGateway {
    #[instrument(skip(self, order, urls), fields(order_number = %order.order_number))]
    async fn create_preference(
        &self,
        order: &Order,
        urls: &ReturnUrls,
    ) -> PaymentResult<Preference> {
        Self::validate(order)?;
        let auth = self.config.auth_header()?;

        let now = Utc::now();
        let body = self.build_preference(order, urls, now);
        let expires_at = now + self.config.preference_ttl;

        debug!(
            "Creating MercadoPago preference: {} items, total={}",
            body.items.len(),
            order.total().display()
        );

        let url = format!("{}/checkout/preferences", self.config.api_base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", auth)
            .json(&body)
            .send()
            .await
            .map_err(|e| PaymentError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PaymentError::Network(e.to_string()))?;

        if !status.is_success() {
            error!("MercadoPago API error: status={}, body={}", status, text);

            let message = serde_json::from_str::<MpErrorResponse>(&text)
                .ok()
                .and_then(|e| e.message.or(e.error))
                .unwrap_or_else(|| "Unknown error".to_string());

            return Err(PaymentError::Gateway {
                status: status.as_u16(),
                message,
            });
        }

        let created: PreferenceResponse = serde_json::from_str(&text).map_err(|e| {
            PaymentError::Serialization(format!("Failed to parse preference response: {}", e))
        })?;

        info!(
            "Created MercadoPago preference: id={}, external_reference={}",
            created.id, body.external_reference
        );

        Ok(Preference {
            preference_id: created.id,
            order_number: order.order_number,
            live_checkout_url: created.init_point,
            sandbox_checkout_url: created.sandbox_init_point,
            expires_at: Some(expires_at),
            created_at: now,
        })
    }

    #[instrument(skip(self))]
    async fn fetch_payment_details(&self, payment_id: &str) -> Option<PaymentDetails> {
        if !is_payment_id(payment_id) {
            warn!("Refusing to look up malformed payment id");
            return None;
        }

        let auth = match self.config.auth_header() {
            Ok(auth) => auth,
            Err(e) => {
                error!("Cannot fetch payment: {}", e);
                return None;
            }
        };

        let url = format!("{}/v1/payments/{}", self.config.api_base_url, payment_id);

        let response = match self.client.get(&url).header("Authorization", auth).send().await {
            Ok(response) => response,
            Err(e) => {
                error!("MercadoPago payment lookup failed: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            warn!("MercadoPago payment lookup returned {}", response.status());
            return None;
        }

        let payment: MpPayment = match response.json().await {
            Ok(payment) => payment,
            Err(e) => {
                error!("Failed to parse MercadoPago payment: {}", e);
                return None;
            }
        };

        let details = payment.into_details()?;
        debug!(
            "Fetched payment: status={}, external_reference={:?}",
            details.status, details.external_reference
        );
        Some(details)
    }

    fn provider_name(&self) -> &'static str {
        "mercadopago"
    }

    fn is_sandbox(&self) -> bool {
        self.config.is_test_mode()
    }
}

/// Payment ids are interpolated into the lookup path
fn is_payment_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 64 && id.bytes().all(|b| b.is_ascii_alphanumeric())
}

// =============================================================================
// MercadoPago API Types
// =============================================================================

#[derive(Debug, Serialize)]
struct PreferenceRequest {
    items: Vec<PreferenceItem>,
    payer: PreferencePayer,
    payment_methods: PaymentMethods,
    back_urls: BackUrls,
    auto_return: &'static str,
    binary_mode: bool,
    external_reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    notification_url: Option<String>,
    expires: bool,
    expiration_date_from: String,
    expiration_date_to: String,
    metadata: PreferenceMetadata,
}

#[derive(Debug, Serialize)]
struct PreferenceItem {
    id: String,
    title: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    picture_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category_id: Option<String>,
    quantity: u32,
    currency_id: String,
    unit_price: f64,
}

#[derive(Debug, Serialize)]
struct PreferencePayer {
    name: String,
    surname: String,
    email: String,
    phone: PayerPhone,
    address: PayerAddress,
}

#[derive(Debug, Serialize)]
struct PayerPhone {
    area_code: String,
    number: String,
}

#[derive(Debug, Serialize)]
struct PayerAddress {
    street_name: String,
    street_number: String,
    zip_code: String,
}

#[derive(Debug, Serialize)]
struct PaymentMethods {
    excluded_payment_types: Vec<String>,
    excluded_payment_methods: Vec<String>,
    installments: u32,
    default_installments: u32,
}

#[derive(Debug, Serialize)]
struct BackUrls {
    success: String,
    failure: String,
    pending: String,
}

#[derive(Debug, Serialize)]
struct PreferenceMetadata {
    order_number: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    customer_id: Option<String>,
    store: String,
}

#[derive(Debug, Deserialize)]
struct PreferenceResponse {
    id: String,
    init_point: String,
    #[serde(default)]
    sandbox_init_point: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MpErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MpPayment {
    id: serde_json::Value,
    status: String,
    #[serde(default)]
    status_detail: Option<String>,
    #[serde(default)]
    external_reference: Option<String>,
    #[serde(default)]
    transaction_amount: Option<f64>,
    #[serde(default)]
    payment_method_id: Option<String>,
    #[serde(default)]
    date_approved: Option<DateTime<Utc>>,
    #[serde(default)]
    date_created: Option<DateTime<Utc>>,
    #[serde(default)]
    payer: Option<MpPayer>,
}

#[derive(Debug, Deserialize)]
struct MpPayer {
    #[serde(default)]
    email: Option<String>,
}

impl MpPayment {
    fn into_details(self) -> Option<PaymentDetails> {
        let Some(id) = id_from_value(&self.id) else {
            warn!("MercadoPago payment without usable id: {}", self.id);
            return None;
        };
        Some(PaymentDetails {
            id,
            status: self.status,
            status_detail: self.status_detail,
            external_reference: self.external_reference,
            transaction_amount: self.transaction_amount,
            payment_method_id: self.payment_method_id,
            date_approved: self.date_approved,
            date_created: self.date_created,
            payer_email: self.payer.and_then(|p| p.email),
        })
    }
}
