//! # labkit
//!
//! Marketplace backend for partner-sold lab test kits.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export STRIPE_SECRET_KEY=sk_test_...
//! export STRIPE_PUBLISHABLE_KEY=pk_test_...
//! export STRIPE_WEBHOOK_SECRET=whsec_...
//! export AUTH_JWT_SECRET=...
//! export DATABASE_URL=postgres://...   # omit for the seeded in-memory store
//!
//! # Run the server
//! labkit
//! ```

use kit_api::{routes, state::AppState};
use kit_stripe::print_webhook_setup_instructions;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    print_banner();

    let state = AppState::from_env().await?;

    let addr = state.config.socket_addr()?;
    let is_prod = state.config.is_production();

    info!("Environment: {}", state.config.environment);
    info!(
        "Storage: {}",
        if state.config.database_url.is_some() {
            "postgres"
        } else {
            "memory"
        }
    );
    info!("Payment provider: {}", state.gateway.provider_name());

    if !is_prod {
        print_webhook_setup_instructions(&format!("{}/webhook/stripe", state.config.base_url));
    }

    let app = routes::create_router(state);

    info!("labkit starting on http://{}", addr);
    if !is_prod {
        info!("Health: http://{}/health", addr);
        info!("Storefront: GET http://{}/api/v1/products", addr);
        info!("Webhook: POST http://{}/webhook/stripe", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// `LOG_FORMAT=json` switches to structured JSON lines
fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
}

fn print_banner() {
    println!(
        r#"
  labkit marketplace
  ━━━━━━━━━━━━━━━━━━━━━━━
  Lab test kits from partner labs
  Version: {}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
