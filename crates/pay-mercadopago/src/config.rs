//! # MercadoPago Configuration
//!
//! Configuration management for the MercadoPago integration.
//! Secrets are loaded from environment variables.

use pay_core::{PaymentError, PaymentResult, StorefrontSettings};
use std::env;
use std::time::Duration;

const DEFAULT_API_BASE_URL: &str = "https://api.mercadopago.com";

/// MercadoPago API configuration
#[derive(Debug, Clone)]
pub struct MercadoPagoConfig {
    /// Access token (TEST-... or APP_USR-...).
    ///
    /// Optional at load time: preference creation fails with a configuration
    /// error when it is missing, webhooks fail soft.
    pub access_token: Option<String>,

    /// Secret used to sign webhook notifications
    pub webhook_secret: Option<String>,

    /// API base URL (for testing/mocking)
    pub api_base_url: String,

    /// Per-request timeout
    pub timeout: Duration,

    /// How long a preference stays redeemable
    pub preference_ttl: chrono::Duration,

    pub max_installments: u32,
    pub default_installments: u32,

    /// Sent as preference metadata
    pub store_name: String,

    /// Accepted clock skew for signed notifications, in seconds
    pub signature_tolerance_secs: i64,
}

impl MercadoPagoConfig {
    /// Load configuration from environment variables.
    ///
    /// Read env vars:
    /// - `MP_ACCESS_TOKEN` (optional, see [`Self::access_token`])
    /// - `MP_WEBHOOK_SECRET` (optional)
    /// - `MP_API_BASE_URL` (optional)
    pub fn from_env() -> PaymentResult<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let access_token = non_empty_var("MP_ACCESS_TOKEN");
        if let Some(ref token) = access_token {
            validate_token(token)?;
        }

        let mut config = Self::with_token(access_token);
        config.webhook_secret = non_empty_var("MP_WEBHOOK_SECRET");
        if let Some(url) = non_empty_var("MP_API_BASE_URL") {
            config.api_base_url = url;
        }
        Ok(config)
    }

    /// Create config with an explicit token (for testing)
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_token(Some(access_token.into()))
    }

    fn with_token(access_token: Option<String>) -> Self {
        let defaults = StorefrontSettings::default();
        Self {
            access_token,
            webhook_secret: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            preference_ttl: chrono::Duration::minutes(defaults.preference_ttl_minutes),
            max_installments: defaults.max_installments,
            default_installments: defaults.default_installments,
            store_name: defaults.store_name,
            signature_tolerance_secs: 300,
        }
    }

    /// Check if using test credentials
    pub fn is_test_mode(&self) -> bool {
        self.access_token
            .as_deref()
            .map(|t| t.starts_with("TEST-"))
            .unwrap_or(false)
    }

    /// Get authorization header value
    pub fn auth_header(&self) -> PaymentResult<String> {
        self.access_token
            .as_ref()
            .map(|token| format!("Bearer {}", token))
            .ok_or_else(|| PaymentError::Configuration("MP_ACCESS_TOKEN not set".to_string()))
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Builder: set the webhook signing secret
    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(secret.into());
        self
    }

    /// Builder: copy checkout knobs from the storefront settings
    pub fn with_settings(mut self, settings: &StorefrontSettings) -> Self {
        self.preference_ttl = chrono::Duration::minutes(settings.preference_ttl_minutes);
        self.max_installments = settings.max_installments;
        self.default_installments = settings.default_installments;
        self.store_name = settings.store_name.clone();
        self
    }

    /// Builder: set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn validate_token(token: &str) -> PaymentResult<()> {
    if token.starts_with("TEST-") || token.starts_with("APP_USR-") {
        Ok(())
    } else {
        Err(PaymentError::Configuration(
            "MP_ACCESS_TOKEN must start with TEST- or APP_USR-".to_string(),
        ))
    }
}
