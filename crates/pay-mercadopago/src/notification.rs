//! # Webhook Notifications
//!
//! Body of a MercadoPago webhook delivery. Only `payment` notifications are
//! acted on; the notification itself carries no payment state, just the id
//! to fetch.

use pay_core::{PaymentError, PaymentResult};
use serde::Deserialize;
use serde_json::Value;

/// Webhook delivery body
#[derive(Debug, Clone, Deserialize)]
pub struct Notification {
    #[serde(default)]
    pub id: Option<Value>,

    /// Event type (`payment`, `merchant_order`, ...). IPN deliveries call it `topic`.
    #[serde(default, rename = "type", alias = "topic")]
    pub kind: Option<String>,

    #[serde(default)]
    pub action: Option<String>,

    #[serde(default)]
    pub live_mode: Option<bool>,

    #[serde(default)]
    pub data: Option<NotificationData>,
}

/// `data` object; non-payment events may leave `id` out or null
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationData {
    #[serde(default)]
    pub id: Option<Value>,
}

impl Notification {
    /// Parse a raw webhook body
    pub fn parse(payload: &[u8]) -> PaymentResult<Self> {
        serde_json::from_slice(payload).map_err(|e| {
            PaymentError::WebhookParse(format!("Failed to parse webhook body: {}", e))
        })
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    pub fn is_payment(&self) -> bool {
        self.kind.as_deref() == Some("payment")
    }

    /// The referenced resource id, as a string
    pub fn data_id(&self) -> Option<String> {
        self.data
            .as_ref()
            .and_then(|d| d.id.as_ref())
            .and_then(id_from_value)
    }

    /// Payment id to fetch; `WebhookParse` when a payment event lacks one
    pub fn payment_id(&self) -> PaymentResult<String> {
        self.data_id().ok_or_else(|| {
            PaymentError::WebhookParse("Payment notification without data.id".to_string())
        })
    }
}

/// MercadoPago sends ids either as JSON strings or numbers
pub(crate) fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
