//! # patitas-pay
//!
//! Payment server for the Entre Patitas storefront.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export MP_ACCESS_TOKEN=TEST-...
//! export MP_WEBHOOK_SECRET=...
//! export SUPABASE_URL=https://xyz.supabase.co
//! export SUPABASE_SERVICE_ROLE_KEY=...
//!
//! # Run the server
//! patitas-pay
//! ```

use pay_api::{routes, state::AppState};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let state = AppState::new()?;

    let addr = state.config.socket_addr()?;
    let is_prod = state.config.is_production();

    info!("Environment: {}", state.config.environment);
    info!(
        "Payment gateway: {} (sandbox: {})",
        state.gateway.provider_name(),
        state.gateway.is_sandbox()
    );
    info!(
        "Webhook signatures: {}",
        if state.verifier.is_some() { "verified" } else { "not verified" }
    );

    let app = routes::create_router(state);

    info!("Payment server starting on http://{}", addr);

    if !is_prod {
        info!("Checkout: POST http://{}/api/v1/checkout", addr);
        info!("Webhook: POST http://{}/webhook", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// `LOG_FORMAT=json` switches to structured output
fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}
