//! # Checkout API Types
//!
//! Request/response bodies shared by the HTTP API and the client flow
//! controller, plus the storefront settings that shape new orders.

use crate::error::{PaymentError, PaymentResult};
use crate::money::{Currency, Price};
use crate::order::{
    Buyer, DeliveryAddress, LineItem, Order, OrderNumber, OrderStatus, PaymentStatus,
};
use crate::payment::Preference;
use serde::{Deserialize, Serialize};

/// Storefront-wide settings, loaded from `config/storefront.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorefrontSettings {
    /// Store name sent to the gateway as metadata
    pub store_name: String,
    pub currency: Currency,
    /// Flat shipping cost, as a decimal amount
    pub shipping_cost: f64,
    /// Minutes a preference stays redeemable
    pub preference_ttl_minutes: i64,
    pub max_installments: u32,
    pub default_installments: u32,
}

impl Default for StorefrontSettings {
    fn default() -> Self {
        Self {
            store_name: "Entre Patitas".to_string(),
            currency: Currency::ARS,
            shipping_cost: 800.0,
            preference_ttl_minutes: 30,
            max_installments: 12,
            default_installments: 1,
        }
    }
}

impl StorefrontSettings {
    /// Load settings from a TOML string (missing keys keep their defaults)
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    pub fn shipping(&self) -> Price {
        Price::new(self.shipping_cost, self.currency)
    }
}

/// Largest unit price accepted at checkout, as a decimal amount
pub const MAX_UNIT_PRICE: f64 = 100_000_000.0;
/// Largest quantity accepted per line
pub const MAX_QUANTITY: u32 = 1_000;

/// Item in a checkout request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutItem {
    pub product_id: String,
    pub name: String,
    /// Unit price as a decimal amount
    pub unit_price: f64,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

fn default_quantity() -> u32 {
    1
}

/// Body of `POST /api/v1/checkout`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub items: Vec<CheckoutItem>,
    pub delivery: DeliveryAddress,
    #[serde(default)]
    pub buyer: Buyer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
}

impl CheckoutRequest {
    /// Validate the request and build a fresh pending order
    pub fn into_order(self, settings: &StorefrontSettings) -> PaymentResult<Order> {
        if self.items.is_empty() {
            return Err(PaymentError::InvalidRequest(
                "Checkout has no items".to_string(),
            ));
        }

        let missing = self.delivery.missing_fields();
        if !missing.is_empty() {
            return Err(PaymentError::InvalidRequest(format!(
                "Missing delivery fields: {}",
                missing.join(", ")
            )));
        }

        let mut order = Order::new(OrderNumber::generate(), settings.currency)
            .with_shipping(settings.shipping())
            .with_delivery(self.delivery)
            .with_buyer(self.buyer);
        order.customer_id = self.customer_id;

        for item in self.items {
            if item.quantity == 0 || item.quantity > MAX_QUANTITY {
                return Err(PaymentError::InvalidRequest(format!(
                    "Quantity for {} must be between 1 and {}",
                    item.product_id, MAX_QUANTITY
                )));
            }
            if !(item.unit_price > 0.0 && item.unit_price <= MAX_UNIT_PRICE) {
                return Err(PaymentError::InvalidRequest(format!(
                    "Invalid price for {}",
                    item.product_id
                )));
            }
            let mut line = LineItem::new(
                item.product_id,
                item.name,
                Price::new(item.unit_price, settings.currency),
                item.quantity,
            );
            line.image_url = item.image_url;
            order.add_item(line);
        }

        if order.checked_total().is_none() {
            return Err(PaymentError::InvalidRequest(
                "Order total is out of range".to_string(),
            ));
        }

        Ok(order)
    }
}

/// Response of `POST /api/v1/checkout`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub order_number: OrderNumber,
    pub preference_id: String,
    /// Where to send the buyer (sandbox or live, decided server-side)
    pub checkout_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

impl CheckoutResponse {
    pub fn from_preference(preference: &Preference, sandbox: bool) -> Self {
        Self {
            order_number: preference.order_number,
            preference_id: preference.preference_id.clone(),
            checkout_url: preference.checkout_url(sandbox).to_string(),
            expires_at: preference.expires_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Read-only view of an order's payment state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusView {
    pub order_number: OrderNumber,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_gateway_status: Option<String>,
    /// Total as a decimal amount
    pub total: f64,
    pub currency: Currency,
}

impl From<&Order> for OrderStatusView {
    fn from(order: &Order) -> Self {
        Self {
            order_number: order.order_number,
            status: order.status.clone(),
            payment_status: order.payment_status,
            payment_id: order.payment_id.clone(),
            payment_gateway_status: order.payment_gateway_status.clone(),
            total: order.total().as_decimal(),
            currency: order.currency,
        }
    }
}

/// Body of `POST /api/v1/orders/{order_number}/reconcile`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileRequest {
    pub payment_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delivery() -> DeliveryAddress {
        DeliveryAddress {
            province: "Buenos Aires".into(),
            city: "La Plata".into(),
            postal_code: "1900".into(),
            street_address: "Calle 7 123".into(),
            phone: "221 555 0000".into(),
            ..Default::default()
        }
    }

    fn item(quantity: u32) -> CheckoutItem {
        CheckoutItem {
            product_id: "p1".into(),
            name: "Cama para perro".into(),
            unit_price: 15000.0,
            quantity,
            image_url: None,
        }
    }

    #[test]
    fn test_into_order() {
        let request = CheckoutRequest {
            items: vec![item(2)],
            delivery: delivery(),
            buyer: Buyer::default(),
            customer_id: Some("user-1".into()),
        };

        let order = request.into_order(&StorefrontSettings::default()).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.total().as_decimal(), 30800.0);
        assert_eq!(order.customer_id.as_deref(), Some("user-1"));
    }

    #[test]
    fn test_rejects_empty_and_incomplete_requests() {
        let settings = StorefrontSettings::default();

        let empty = CheckoutRequest {
            items: vec![],
            delivery: delivery(),
            buyer: Buyer::default(),
            customer_id: None,
        };
        assert!(matches!(
            empty.into_order(&settings),
            Err(PaymentError::InvalidRequest(_))
        ));

        let no_phone = CheckoutRequest {
            items: vec![item(1)],
            delivery: DeliveryAddress {
                phone: String::new(),
                ..delivery()
            },
            buyer: Buyer::default(),
            customer_id: None,
        };
        let err = no_phone.into_order(&settings).unwrap_err();
        assert!(err.to_string().contains("phone"));

        let zero = CheckoutRequest {
            items: vec![item(0)],
            delivery: delivery(),
            buyer: Buyer::default(),
            customer_id: None,
        };
        assert!(zero.into_order(&settings).is_err());
    }

    #[test]
    fn test_rejects_out_of_range_amounts() {
        let settings = StorefrontSettings::default();
        let request = |items: Vec<CheckoutItem>| CheckoutRequest {
            items,
            delivery: delivery(),
            buyer: Buyer::default(),
            customer_id: None,
        };

        let huge_price = CheckoutItem {
            unit_price: 1e300,
            ..item(2)
        };
        let infinite = CheckoutItem {
            unit_price: f64::INFINITY,
            ..item(1)
        };
        for bad in [huge_price, infinite, item(MAX_QUANTITY + 1)] {
            assert!(matches!(
                request(vec![bad]).into_order(&settings),
                Err(PaymentError::InvalidRequest(_))
            ));
        }

        let at_limit = CheckoutItem {
            unit_price: MAX_UNIT_PRICE,
            ..item(MAX_QUANTITY)
        };
        let order = request(vec![at_limit]).into_order(&settings).unwrap();
        assert_eq!(order.checked_total(), Some(order.total()));
    }

    #[test]
    fn test_settings_from_toml() {
        let settings = StorefrontSettings::from_toml(
            r#"
            store_name = "Entre Patitas OK"
            shipping_cost = 1200.0
            "#,
        )
        .unwrap();

        assert_eq!(settings.store_name, "Entre Patitas OK");
        assert_eq!(settings.shipping().as_decimal(), 1200.0);
        assert_eq!(settings.currency, Currency::ARS);
        assert_eq!(settings.preference_ttl_minutes, 30);
    }
}
