//! # Supabase Configuration

use pay_core::{PaymentError, PaymentResult};
use std::env;
use std::time::Duration;

/// PostgREST connection settings
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,

    /// Service role key. Bypasses row level security, server-side only.
    pub service_key: String,

    /// Orders table
    pub table: String,

    pub timeout: Duration,
}

impl SupabaseConfig {
    pub fn new(url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            table: "pedidos".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Load from `SUPABASE_URL` and `SUPABASE_SERVICE_ROLE_KEY`.
    ///
    /// Returns `Ok(None)` when neither is set, so callers can fall back to
    /// another store. Setting only one of them is a configuration error.
    pub fn from_env() -> PaymentResult<Option<Self>> {
        dotenvy::dotenv().ok();

        let url = non_empty_var("SUPABASE_URL");
        let key = non_empty_var("SUPABASE_SERVICE_ROLE_KEY");

        match (url, key) {
            (Some(url), Some(key)) => Ok(Some(Self::new(url, key))),
            (None, None) => Ok(None),
            (Some(_), None) => Err(PaymentError::Configuration(
                "SUPABASE_SERVICE_ROLE_KEY not set".to_string(),
            )),
            (None, Some(_)) => Err(PaymentError::Configuration(
                "SUPABASE_URL not set".to_string(),
            )),
        }
    }

    /// Builder: use another table
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.url, self.table)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
