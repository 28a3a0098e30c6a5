//! # Gateway Payment Types
//!
//! Normalized payment facts fetched from the gateway and the checkout
//! preference it hands back for an order.

use crate::order::{OrderNumber, PaymentStatus, PaymentUpdate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical payment facts, as reported by the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentDetails {
    /// Gateway payment id
    pub id: String,

    /// Raw gateway status (`approved`, `in_process`, ...)
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_detail: Option<String>,

    /// Our order number, as the string we sent when creating the preference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_reference: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_amount: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_approved: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer_email: Option<String>,
}

impl PaymentDetails {
    /// Minimal details with only id, status and reference
    pub fn new(
        id: impl Into<String>,
        status: impl Into<String>,
        external_reference: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            status: status.into(),
            status_detail: None,
            external_reference,
            transaction_amount: None,
            payment_method_id: None,
            date_approved: None,
            date_created: None,
            payer_email: None,
        }
    }

    /// Order number this payment belongs to, if the reference parses
    pub fn order_number(&self) -> Option<OrderNumber> {
        self.external_reference
            .as_deref()
            .and_then(|reference| reference.parse().ok())
    }

    pub fn payment_status(&self) -> PaymentStatus {
        PaymentStatus::from_gateway(&self.status)
    }

    /// The update the reconciler writes for these facts
    pub fn to_update(&self) -> PaymentUpdate {
        let payment_status = self.payment_status();
        PaymentUpdate {
            payment_id: self.id.clone(),
            gateway_status: self.status.clone(),
            payment_status,
            order_status: payment_status.order_status(),
            payment_method: self.payment_method_id.clone(),
            transaction_amount: self.transaction_amount,
            approved_at: self.date_approved,
            created_at: self.date_created,
        }
    }
}

/// A gateway checkout session created for an order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preference {
    /// Gateway preference id
    pub preference_id: String,

    /// Order the preference was created for
    pub order_number: OrderNumber,

    /// Live checkout URL (`init_point`)
    pub live_checkout_url: String,

    /// Sandbox checkout URL (`sandbox_init_point`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox_checkout_url: Option<String>,

    /// After this instant the preference is no longer redeemable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl Preference {
    /// The URL to redirect the buyer to
    pub fn checkout_url(&self, sandbox: bool) -> &str {
        match (sandbox, self.sandbox_checkout_url.as_deref()) {
            (true, Some(url)) => url,
            _ => &self.live_checkout_url,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|exp| exp <= Utc::now()).unwrap_or(false)
    }
}
