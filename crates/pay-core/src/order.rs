//! # Order Types
//!
//! Orders, their two status axes and the payment updates applied to them.
//!
//! `status` tracks fulfillment, `payment_status` tracks the gateway side. The
//! only code allowed to move `payment_status` into a terminal state is
//! [`Order::apply_payment_update`], which the reconciler drives.

use crate::money::{Currency, Price};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique order identifier, also the gateway's external reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(i64);

impl OrderNumber {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Time-derived order number (milliseconds since the epoch)
    pub fn generate() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// The string sent to the gateway as `external_reference`
    pub fn external_reference(&self) -> String {
        self.0.to_string()
    }
}

impl From<i64> for OrderNumber {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OrderNumber {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self)
    }
}

/// Overall fulfillment status.
///
/// `Pending`, `Confirmed` and `Cancelled` follow the payment. Later states are
/// set by the back office and are never overwritten by payment updates.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
    Shipped,
    Completed,
    /// Any other value written by the back office, kept verbatim
    #[serde(untagged)]
    Other(String),
}

impl OrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Completed => "completed",
            OrderStatus::Other(raw) => raw,
        }
    }

    /// True for states owned by fulfillment rather than by the payment
    pub fn is_fulfillment(&self) -> bool {
        matches!(
            self,
            OrderStatus::Shipped | OrderStatus::Completed | OrderStatus::Other(_)
        )
    }
}

/// Payment-specific status, independent from [`OrderStatus`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Processing,
    Approved,
    Rejected,
    Cancelled,
    Refunded,
}

impl PaymentStatus {
    /// Map a raw gateway status onto our payment status.
    ///
    /// Total: unknown values map to `Pending`.
    pub fn from_gateway(status: &str) -> Self {
        match status {
            "approved" => PaymentStatus::Approved,
            "rejected" => PaymentStatus::Rejected,
            "cancelled" => PaymentStatus::Cancelled,
            "refunded" => PaymentStatus::Refunded,
            "pending" | "in_process" => PaymentStatus::Pending,
            _ => PaymentStatus::Pending,
        }
    }

    /// Terminal states admit no further gateway-driven transition for the same payment
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Approved
                | PaymentStatus::Rejected
                | PaymentStatus::Cancelled
                | PaymentStatus::Refunded
        )
    }

    /// Fulfillment status implied by this payment status
    pub fn order_status(&self) -> OrderStatus {
        match self {
            PaymentStatus::Approved => OrderStatus::Confirmed,
            PaymentStatus::Cancelled => OrderStatus::Cancelled,
            _ => OrderStatus::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Approved => "approved",
            PaymentStatus::Rejected => "rejected",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A line item in an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Product ID
    pub product_id: String,

    /// Product name (denormalized for display)
    pub name: String,

    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Unit price
    pub unit_price: Price,

    /// Quantity
    pub quantity: u32,

    /// Optional image URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl LineItem {
    pub fn new(
        product_id: impl Into<String>,
        name: impl Into<String>,
        unit_price: Price,
        quantity: u32,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            name: name.into(),
            description: None,
            unit_price,
            quantity,
            image_url: None,
        }
    }

    /// Builder: set image URL
    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Calculate the total price for this line item
    pub fn total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }
}

/// Where the order is shipped
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub province: String,
    pub city: String,
    pub postal_code: String,
    pub street_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apartment: Option<String>,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl DeliveryAddress {
    /// Names of required fields that are blank
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("province", &self.province),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
            ("street_address", &self.street_address),
            ("phone", &self.phone),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

/// Buyer contact info (all optional, the gateway gets placeholders)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buyer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Gateway-reported facts to apply onto an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentUpdate {
    pub payment_id: String,
    /// Raw gateway status, mirrored for audit
    pub gateway_status: String,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub payment_method: Option<String>,
    pub transaction_amount: Option<f64>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

/// What applying a [`PaymentUpdate`] did to an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Fields were written
    Applied,
    /// Order already carried exactly these facts
    Unchanged,
    /// Refused: would regress a terminal status, or comes from a superseded attempt
    Stale,
}

/// An order placed through the storefront
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_number: OrderNumber,

    /// Storefront user id (owned by the auth provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,

    pub status: OrderStatus,
    pub payment_status: PaymentStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_preference_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_gateway_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_created_at: Option<DateTime<Utc>>,

    pub line_items: Vec<LineItem>,
    pub currency: Currency,
    pub shipping_cost: Price,
    pub discounts: Price,
    #[serde(default)]
    pub delivery: DeliveryAddress,
    #[serde(default)]
    pub buyer: Buyer,

    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Create an empty pending order
    pub fn new(order_number: OrderNumber, currency: Currency) -> Self {
        Self {
            order_number,
            customer_id: None,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_preference_id: None,
            payment_id: None,
            payment_gateway_status: None,
            payment_method: None,
            transaction_amount: None,
            payment_approved_at: None,
            payment_created_at: None,
            line_items: Vec::new(),
            currency,
            shipping_cost: Price::zero(currency),
            discounts: Price::zero(currency),
            delivery: DeliveryAddress::default(),
            buyer: Buyer::default(),
            created_at: Utc::now(),
        }
    }

    pub fn add_item(&mut self, item: LineItem) {
        self.line_items.push(item);
    }

    pub fn with_item(mut self, item: LineItem) -> Self {
        self.add_item(item);
        self
    }

    pub fn with_shipping(mut self, cost: Price) -> Self {
        self.shipping_cost = cost;
        self
    }

    pub fn with_delivery(mut self, delivery: DeliveryAddress) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn with_buyer(mut self, buyer: Buyer) -> Self {
        self.buyer = buyer;
        self
    }

    pub fn with_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    /// Sum of line items
    pub fn subtotal(&self) -> Price {
        self.line_items
            .iter()
            .fold(Price::zero(self.currency), |acc, item| acc.plus(item.total()))
    }

    /// Subtotal plus shipping minus discounts
    pub fn total(&self) -> Price {
        self.subtotal().plus(self.shipping_cost).minus(self.discounts)
    }

    /// [`Order::total`], or `None` if any step overflows
    pub fn checked_total(&self) -> Option<Price> {
        self.line_items
            .iter()
            .try_fold(Price::zero(self.currency), |acc, item| {
                acc.checked_plus(item.unit_price.checked_times(item.quantity)?)
            })?
            .checked_plus(self.shipping_cost)?
            .checked_minus(self.discounts)
    }

    pub fn is_empty(&self) -> bool {
        self.line_items.is_empty()
    }

    pub fn item_count(&self) -> u32 {
        self.line_items
            .iter()
            .fold(0u32, |acc, i| acc.saturating_add(i.quantity))
    }

    /// Record a freshly created gateway preference.
    ///
    /// Returns false (and leaves the order alone) once the payment is terminal.
    pub fn attach_preference(&mut self, preference_id: impl Into<String>) -> bool {
        if self.payment_status.is_terminal() {
            return false;
        }
        self.payment_preference_id = Some(preference_id.into());
        self.payment_status = PaymentStatus::Processing;
        true
    }

    /// Apply gateway facts, enforcing monotonic finality.
    ///
    /// For the current payment a terminal status never goes back to a
    /// non-terminal one. Another payment id is a new attempt unless it is
    /// older than the current one, or the order is already settled and the
    /// other attempt did not approve.
    pub fn apply_payment_update(&mut self, update: &PaymentUpdate) -> Transition {
        let same_payment = self.payment_id.as_deref() == Some(update.payment_id.as_str());
        if same_payment {
            if self.payment_status.is_terminal() && !update.payment_status.is_terminal() {
                return Transition::Stale;
            }
        } else if self.payment_id.is_some() && self.is_superseding(update) {
            return Transition::Stale;
        }

        if self.carries(update) {
            return Transition::Unchanged;
        }

        self.payment_id = Some(update.payment_id.clone());
        self.payment_gateway_status = Some(update.gateway_status.clone());
        self.payment_status = update.payment_status;
        self.status = self.next_status(update);
        self.payment_method = update.payment_method.clone();
        self.transaction_amount = update.transaction_amount;
        self.payment_approved_at = update.approved_at;
        self.payment_created_at = update.created_at;
        Transition::Applied
    }

    /// True when the current payment supersedes the other attempt in `update`
    fn is_superseding(&self, update: &PaymentUpdate) -> bool {
        let settled = matches!(
            self.payment_status,
            PaymentStatus::Approved | PaymentStatus::Refunded
        );
        if settled && update.payment_status != PaymentStatus::Approved {
            return true;
        }
        matches!(
            (update.created_at, self.payment_created_at),
            (Some(other), Some(current)) if other < current
        )
    }

    fn next_status(&self, update: &PaymentUpdate) -> OrderStatus {
        if self.status.is_fulfillment() {
            self.status.clone()
        } else {
            update.order_status.clone()
        }
    }

    fn carries(&self, update: &PaymentUpdate) -> bool {
        self.payment_id.as_deref() == Some(update.payment_id.as_str())
            && self.payment_gateway_status.as_deref() == Some(update.gateway_status.as_str())
            && self.payment_status == update.payment_status
            && self.status == self.next_status(update)
            && self.payment_method == update.payment_method
            && self.transaction_amount == update.transaction_amount
            && self.payment_approved_at == update.approved_at
            && self.payment_created_at == update.created_at
    }
}
