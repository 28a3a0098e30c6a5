//! # Application State
//!
//! Shared state for the Axum application.
//! Holds the payment gateway, the order store, the reconciler and configuration.

use anyhow::Context;
use pay_core::{
    BoxedOrderStore, BoxedPaymentGateway, InMemoryOrderStore, Reconciler, ReturnUrls,
    StorefrontSettings,
};
use pay_mercadopago::{MercadoPagoConfig, MercadoPagoGateway, SignatureVerifier};
use pay_supabase::{SupabaseConfig, SupabaseOrderStore};
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Public URL of this server (webhook notifications are sent here)
    pub base_url: String,
    /// Storefront URL hosting the return pages
    pub frontend_url: String,
    /// Environment (development, staging, production)
    pub environment: String,
    pub notification_url: Option<String>,
    pub success_url: Option<String>,
    pub failure_url: Option<String>,
    pub pending_url: Option<String>,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            base_url: env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            notification_url: non_empty_var("MP_NOTIFICATION_URL"),
            success_url: non_empty_var("MP_SUCCESS_URL"),
            failure_url: non_empty_var("MP_FAILURE_URL"),
            pending_url: non_empty_var("MP_PENDING_URL"),
        }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid socket address {}:{}", self.host, self.port))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Return pages and notification endpoint handed to the gateway
    pub fn return_urls(&self) -> ReturnUrls {
        let mut urls = ReturnUrls::new(&self.frontend_url);
        if let Some(url) = &self.success_url {
            urls.success_url = url.clone();
        }
        if let Some(url) = &self.failure_url {
            urls.failure_url = url.clone();
        }
        if let Some(url) = &self.pending_url {
            urls.pending_url = url.clone();
        }

        let notification = self.notification_url.clone().unwrap_or_else(|| {
            format!("{}/webhook", self.base_url.trim_end_matches('/'))
        });
        urls.with_notification_url(notification)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            base_url: "http://localhost:8080".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            environment: "development".to_string(),
            notification_url: None,
            success_url: None,
            failure_url: None,
            pending_url: None,
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub gateway: BoxedPaymentGateway,
    pub store: BoxedOrderStore,
    pub reconciler: Reconciler,
    /// Present when a webhook secret is configured
    pub verifier: Option<SignatureVerifier>,
    pub settings: StorefrontSettings,
    pub urls: ReturnUrls,
    pub config: AppConfig,
}

impl AppState {
    /// Build the production state from the environment
    pub fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env();
        let settings = load_storefront_settings()?;

        let mp_config = MercadoPagoConfig::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to load MercadoPago config: {}", e))?
            .with_settings(&settings);

        if mp_config.access_token.is_none() {
            warn!("MP_ACCESS_TOKEN not set, checkout and payment lookups will fail");
        }

        let verifier = match &mp_config.webhook_secret {
            Some(secret) => Some(
                SignatureVerifier::new(secret.clone())
                    .with_tolerance(mp_config.signature_tolerance_secs),
            ),
            None if config.is_production() => {
                anyhow::bail!("MP_WEBHOOK_SECRET must be set in production")
            }
            None => {
                warn!("MP_WEBHOOK_SECRET not set, webhook signatures will not be verified");
                None
            }
        };

        let gateway = MercadoPagoGateway::new(mp_config)
            .map_err(|e| anyhow::anyhow!("Failed to initialize MercadoPago: {}", e))?;

        let store: BoxedOrderStore = match SupabaseConfig::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to load Supabase config: {}", e))?
        {
            Some(supabase) => {
                info!("Using Supabase order store at {}", supabase.url);
                Arc::new(
                    SupabaseOrderStore::new(supabase)
                        .map_err(|e| anyhow::anyhow!("Failed to initialize Supabase: {}", e))?
                        .with_currency(settings.currency),
                )
            }
            None => {
                warn!("Supabase not configured, orders are kept in memory");
                Arc::new(InMemoryOrderStore::new())
            }
        };

        Ok(Self::with_parts(Arc::new(gateway), store, verifier, config).with_settings(settings))
    }

    /// Assemble state from explicit parts (tests, embedding)
    pub fn with_parts(
        gateway: BoxedPaymentGateway,
        store: BoxedOrderStore,
        verifier: Option<SignatureVerifier>,
        config: AppConfig,
    ) -> Self {
        let urls = config.return_urls();
        Self {
            gateway,
            reconciler: Reconciler::new(store.clone()),
            store,
            verifier,
            settings: StorefrontSettings::default(),
            urls,
            config,
        }
    }

    /// Builder: replace storefront settings
    pub fn with_settings(mut self, settings: StorefrontSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Builder: replace the reconciler (e.g. a different retry policy)
    pub fn with_reconciler(mut self, reconciler: Reconciler) -> Self {
        self.reconciler = reconciler;
        self
    }
}

/// Load storefront settings from config file
fn load_storefront_settings() -> anyhow::Result<StorefrontSettings> {
    let config_paths = [
        "config/storefront.toml",
        "../config/storefront.toml",
        "../../config/storefront.toml",
    ];

    for path in config_paths {
        if let Ok(content) = std::fs::read_to_string(path) {
            let settings = StorefrontSettings::from_toml(&content)
                .with_context(|| format!("Failed to parse {}", path))?;
            info!("Loaded storefront settings from {}", path);
            return Ok(settings);
        }
    }

    warn!("No storefront settings found, using defaults");
    Ok(StorefrontSettings::default())
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_addr() {
        let config = AppConfig {
            host: "0.0.0.0".to_string(),
            port: 3000,
            ..Default::default()
        };

        let addr = config.socket_addr().unwrap();
        assert_eq!(addr.to_string(), "0.0.0.0:3000");

        let bad = AppConfig {
            host: "not a host".to_string(),
            ..Default::default()
        };
        assert!(bad.socket_addr().is_err());
    }

    #[test]
    fn test_return_urls() {
        let config = AppConfig {
            base_url: "https://api.entrepatitas.com.ar/".to_string(),
            frontend_url: "https://entrepatitas.com.ar".to_string(),
            pending_url: Some("https://entrepatitas.com.ar/espera".to_string()),
            ..Default::default()
        };

        let urls = config.return_urls();
        assert_eq!(urls.success_url, "https://entrepatitas.com.ar/pago-exitoso");
        assert_eq!(urls.pending_url, "https://entrepatitas.com.ar/espera");
        assert_eq!(
            urls.notification_url.as_deref(),
            Some("https://api.entrepatitas.com.ar/webhook")
        );
    }

    #[test]
    fn test_production_flag() {
        let config = AppConfig {
            environment: "production".to_string(),
            ..Default::default()
        };
        assert!(config.is_production());
        assert!(!AppConfig::default().is_production());
    }
}
