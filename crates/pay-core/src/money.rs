//! # Money Types
//!
//! Currency and price types. Amounts are stored in the smallest currency unit
//! and converted to decimals only at the gateway and store boundaries.

use serde::{Deserialize, Serialize};

/// Supported currencies (ISO 4217)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    ARS,
    BRL,
    CLP,
    MXN,
    UYU,
    USD,
}

impl Currency {
    /// Returns the ISO 4217 currency code as the gateway expects it
    pub fn code(&self) -> &'static str {
        match self {
            Currency::ARS => "ARS",
            Currency::BRL => "BRL",
            Currency::CLP => "CLP",
            Currency::MXN => "MXN",
            Currency::UYU => "UYU",
            Currency::USD => "USD",
        }
    }

    /// Returns the number of decimal places for this currency
    /// (CLP has 0 decimals, the others have 2)
    pub fn decimal_places(&self) -> u8 {
        match self {
            Currency::CLP => 0,
            _ => 2,
        }
    }

    /// Convert a decimal amount to the smallest currency unit
    pub fn to_smallest_unit(&self, amount: f64) -> i64 {
        let multiplier = 10_f64.powi(self.decimal_places() as i32);
        (amount * multiplier).round() as i64
    }

    /// Convert from smallest unit back to decimal
    pub fn from_smallest_unit(&self, amount: i64) -> f64 {
        let divisor = 10_f64.powi(self.decimal_places() as i32);
        amount as f64 / divisor
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::ARS
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Price with amount in smallest currency unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in smallest currency unit (centavos for ARS)
    pub amount: i64,
    /// Currency
    pub currency: Currency,
}

impl Price {
    /// Create a new price from decimal amount
    pub fn new(amount: f64, currency: Currency) -> Self {
        Self {
            amount: currency.to_smallest_unit(amount),
            currency,
        }
    }

    /// Create a price from smallest unit
    pub fn from_cents(amount: i64, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Zero in the given currency
    pub fn zero(currency: Currency) -> Self {
        Self::from_cents(0, currency)
    }

    /// Get the decimal amount
    pub fn as_decimal(&self) -> f64 {
        self.currency.from_smallest_unit(self.amount)
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    /// Multiply by a quantity (saturating)
    pub fn times(&self, quantity: u32) -> Self {
        Self::from_cents(self.amount.saturating_mul(i64::from(quantity)), self.currency)
    }

    /// Add another amount, same currency assumed (saturating)
    pub fn plus(&self, other: Price) -> Self {
        Self::from_cents(self.amount.saturating_add(other.amount), self.currency)
    }

    /// Subtract another amount, same currency assumed (saturating)
    pub fn minus(&self, other: Price) -> Self {
        Self::from_cents(self.amount.saturating_sub(other.amount), self.currency)
    }

    pub fn checked_times(&self, quantity: u32) -> Option<Self> {
        let amount = self.amount.checked_mul(i64::from(quantity))?;
        Some(Self::from_cents(amount, self.currency))
    }

    pub fn checked_plus(&self, other: Price) -> Option<Self> {
        let amount = self.amount.checked_add(other.amount)?;
        Some(Self::from_cents(amount, self.currency))
    }

    pub fn checked_minus(&self, other: Price) -> Option<Self> {
        let amount = self.amount.checked_sub(other.amount)?;
        Some(Self::from_cents(amount, self.currency))
    }

    /// Format for display (e.g., "$1250.00")
    pub fn display(&self) -> String {
        let symbol = match self.currency {
            Currency::BRL => "R$",
            Currency::UYU => "$U",
            Currency::USD => "US$",
            _ => "$",
        };
        if self.currency.decimal_places() == 0 {
            format!("{}{}", symbol, self.amount)
        } else {
            format!("{}{:.2}", symbol, self.as_decimal())
        }
    }
}
