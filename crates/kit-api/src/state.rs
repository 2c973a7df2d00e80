//! # Application State
//!
//! Shared state for the Axum application.
//! Holds the store, the payment gateway, the JWT verifier, and configuration.

use crate::auth::JwtVerifier;
use anyhow::Context;
use kit_core::{BoxedPaymentGateway, Currency, ShippingPolicy};
use kit_store::{MemoryStore, PgStore, SeedData, SharedStore};
use kit_stripe::StripePaymentGateway;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

const DEV_JWT_SECRET: &str = "labkit-development-secret";

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Public base URL
    pub base_url: String,
    /// Environment (development, staging, production)
    pub environment: String,
    /// PostgreSQL URL; the in-memory store is used when absent
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    /// Seed file for the in-memory store
    pub seed_file: String,
    /// HS256 secret shared with the auth provider
    pub jwt_secret: String,
    pub jwt_audience: String,
    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,
    pub max_body_bytes: usize,
    /// Currency every listing is priced in
    pub currency: Currency,
    pub shipping: ShippingPolicy,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let environment = env_or("ENVIRONMENT", "development");
        let jwt_secret = match std::env::var("AUTH_JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ if environment == "production" => {
                anyhow::bail!("AUTH_JWT_SECRET is required in production")
            }
            _ => {
                warn!("AUTH_JWT_SECRET not set, using the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };
        let currency = Currency::parse(&env_or("CURRENCY", "usd"))?;

        Ok(Self {
            host: env_or("HOST", "127.0.0.1"),
            port: env_parse("PORT").unwrap_or(8080),
            base_url: env_or("BASE_URL", "http://localhost:8080"),
            environment,
            database_url: std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            database_max_connections: env_parse("DATABASE_MAX_CONNECTIONS").unwrap_or(10),
            seed_file: env_or("SEED_FILE", "config/seed.toml"),
            jwt_secret,
            jwt_audience: env_or("AUTH_JWT_AUDIENCE", "authenticated"),
            cors_origins: env_or("CORS_ORIGINS", "*")
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            max_body_bytes: env_parse("MAX_BODY_BYTES").unwrap_or(1024 * 1024),
            currency,
            shipping: ShippingPolicy {
                flat_fee: env_parse("SHIPPING_FLAT_FEE_CENTS").unwrap_or(0),
                free_over: env_parse("SHIPPING_FREE_OVER_CENTS"),
            },
        })
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
}

impl Default for AppConfig {
    /// Local development settings without reading the environment
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            base_url: "http://localhost:8080".to_string(),
            environment: "development".to_string(),
            database_url: None,
            database_max_connections: 10,
            seed_file: "config/seed.toml".to_string(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_audience: "authenticated".to_string(),
            cors_origins: vec!["*".to_string()],
            max_body_bytes: 1024 * 1024,
            currency: Currency::USD,
            shipping: ShippingPolicy::free(),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub gateway: BoxedPaymentGateway,
    pub auth: Arc<JwtVerifier>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(config: AppConfig, store: SharedStore, gateway: BoxedPaymentGateway) -> Self {
        let auth = JwtVerifier::new(&config.jwt_secret, &config.jwt_audience);
        Self {
            store,
            gateway,
            auth: Arc::new(auth),
            config: Arc::new(config),
        }
    }

    /// Build state from the environment: store, Stripe gateway, and config
    pub async fn from_env() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        let store = open_store(&config).await?;
        let gateway = StripePaymentGateway::from_env().context("Failed to initialize Stripe")?;

        Ok(Self::new(config, store, Arc::new(gateway)))
    }
}

/// PostgreSQL when `DATABASE_URL` is set, otherwise a seeded in-memory store
async fn open_store(config: &AppConfig) -> anyhow::Result<SharedStore> {
    if let Some(ref url) = config.database_url {
        let store = PgStore::connect(url, config.database_max_connections).await?;
        store.migrate().await?;
        return Ok(Arc::new(store));
    }

    if config.is_production() {
        anyhow::bail!("DATABASE_URL is required in production");
    }

    warn!("DATABASE_URL not set, using the in-memory store");
    let store = MemoryStore::new();
    match SeedData::from_file(&config.seed_file) {
        Ok(seed) => {
            seed.apply(&store).await?;
        }
        Err(e) => warn!("No seed data loaded: {}", e),
    }
    info!("In-memory store ready");
    Ok(Arc::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.port, 8080);
        assert!(!config.is_production());
        assert_eq!(config.cors_origins, vec!["*"]);
        assert_eq!(
            config.socket_addr().unwrap(),
            "127.0.0.1:8080".parse().unwrap()
        );
    }

    #[test]
    fn test_invalid_socket_addr() {
        let config = AppConfig {
            host: "not a host".into(),
            ..AppConfig::default()
        };
        assert!(config.socket_addr().is_err());
    }
}
