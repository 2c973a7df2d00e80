//! # Stripe Configuration
//!
//! Configuration management for Stripe integration.
//! All secrets are loaded from environment variables.

use kit_core::MarketError;
use std::env;

const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";
const DEFAULT_API_VERSION: &str = "2024-12-18.acacia";

/// Webhook timestamps older (or newer) than this are rejected
pub const DEFAULT_WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Stripe API configuration
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Secret API key (sk_test_... or sk_live_...)
    pub secret_key: String,

    /// Publishable key (pk_test_... or pk_live_...)
    pub publishable_key: String,

    /// Webhook signing secret (whsec_...)
    pub webhook_secret: String,

    /// API base URL (for testing/mocking)
    pub api_base_url: String,

    /// API version
    pub api_version: String,

    /// Accepted clock skew for webhook signatures, in seconds
    pub webhook_tolerance_secs: i64,

    /// Prefix for the card statement descriptor (max 22 chars total)
    pub statement_descriptor_suffix: Option<String>,
}

impl StripeConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `STRIPE_SECRET_KEY`
    /// - `STRIPE_PUBLISHABLE_KEY`
    /// - `STRIPE_WEBHOOK_SECRET`
    ///
    /// Optional: `STRIPE_API_BASE_URL`, `STRIPE_WEBHOOK_TOLERANCE_SECS`,
    /// `STRIPE_STATEMENT_DESCRIPTOR_SUFFIX`.
    pub fn from_env() -> Result<Self, MarketError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let secret_key = required("STRIPE_SECRET_KEY")?;
        let publishable_key = required("STRIPE_PUBLISHABLE_KEY")?;
        let webhook_secret = required("STRIPE_WEBHOOK_SECRET")?;

        let mut config = Self::new(secret_key, publishable_key, webhook_secret);
        config.validate()?;

        if let Ok(url) = env::var("STRIPE_API_BASE_URL") {
            config.api_base_url = url;
        }
        if let Some(tolerance) = env::var("STRIPE_WEBHOOK_TOLERANCE_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.webhook_tolerance_secs = tolerance;
        }
        config.statement_descriptor_suffix = env::var("STRIPE_STATEMENT_DESCRIPTOR_SUFFIX")
            .ok()
            .filter(|s| !s.trim().is_empty());

        Ok(config)
    }

    /// Create config with explicit values (for testing)
    pub fn new(
        secret_key: impl Into<String>,
        publishable_key: impl Into<String>,
        webhook_secret: impl Into<String>,
    ) -> Self {
        Self {
            secret_key: secret_key.into(),
            publishable_key: publishable_key.into(),
            webhook_secret: webhook_secret.into(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            webhook_tolerance_secs: DEFAULT_WEBHOOK_TOLERANCE_SECS,
            statement_descriptor_suffix: None,
        }
    }

    /// Check key prefixes
    pub fn validate(&self) -> Result<(), MarketError> {
        if !self.secret_key.starts_with("sk_test_") && !self.secret_key.starts_with("sk_live_") {
            return Err(MarketError::Configuration(
                "STRIPE_SECRET_KEY must start with sk_test_ or sk_live_".to_string(),
            ));
        }

        if !self.publishable_key.starts_with("pk_test_")
            && !self.publishable_key.starts_with("pk_live_")
        {
            return Err(MarketError::Configuration(
                "STRIPE_PUBLISHABLE_KEY must start with pk_test_ or pk_live_".to_string(),
            ));
        }

        if !self.webhook_secret.starts_with("whsec_") {
            return Err(MarketError::Configuration(
                "STRIPE_WEBHOOK_SECRET must start with whsec_".to_string(),
            ));
        }

        if self.is_test_mode() != self.publishable_key.starts_with("pk_test_") {
            return Err(MarketError::Configuration(
                "Stripe secret and publishable keys must both be test or both be live".to_string(),
            ));
        }

        Ok(())
    }

    /// Check if using test keys
    pub fn is_test_mode(&self) -> bool {
        self.secret_key.starts_with("sk_test_")
    }

    /// Check if using live keys
    pub fn is_live_mode(&self) -> bool {
        self.secret_key.starts_with("sk_live_")
    }

    /// Get authorization header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.secret_key)
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Builder: set webhook tolerance
    pub fn with_webhook_tolerance(mut self, secs: i64) -> Self {
        self.webhook_tolerance_secs = secs;
        self
    }
}

fn required(name: &str) -> Result<String, MarketError> {
    env::var(name).map_err(|_| MarketError::Configuration(format!("{name} not set")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_modes() {
        let config = StripeConfig::new("sk_test_abc123", "pk_test_xyz789", "whsec_secret");
        assert!(config.is_test_mode());
        assert!(!config.is_live_mode());
        assert!(config.validate().is_ok());

        let config = StripeConfig::new("sk_live_abc123", "pk_live_xyz789", "whsec_secret");
        assert!(config.is_live_mode());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_keys() {
        assert!(StripeConfig::new("rk_abc", "pk_test_x", "whsec_s").validate().is_err());
        assert!(StripeConfig::new("sk_test_a", "pk_test_x", "secret").validate().is_err());
        assert!(StripeConfig::new("sk_test_a", "pk_live_x", "whsec_s").validate().is_err());
    }

    #[test]
    fn test_auth_header() {
        let config = StripeConfig::new("sk_test_abc123", "pk_test_xyz789", "whsec_secret");
        assert_eq!(config.auth_header(), "Bearer sk_test_abc123");
        assert_eq!(config.webhook_tolerance_secs, DEFAULT_WEBHOOK_TOLERANCE_SECS);
    }
}
