use std::time::Duration;

use shuttle_runtime::SecretStore;

pub const DEFAULT_SDK_URL: &str = "https://sdk.cashfree.com/js/v3/cashfree.js";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Couldn't find secret {0}")]
    Missing(&'static str),
    #[error("Secret {key} is not a valid number: {value}")]
    NotANumber { key: &'static str, value: String },
}

/// Everything the portal reads from the secret store, resolved once at startup.
#[derive(Clone, Debug)]
pub struct PortalConfig {
    pub backend_url: String,
    pub session_jwt_secret: String,
    pub cashfree_api_base: String,
    pub cashfree_sdk_url: String,
    pub webhook_secret: Option<String>,
    pub currency: String,
    pub view_cache_ttl: Duration,
    pub reconcile_retention: Duration,
}

impl PortalConfig {
    pub fn from_secrets(secrets: &SecretStore) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| secrets.get(key))
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|val| !val.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };
        let seconds = |key: &'static str, default: u64| match lookup(key) {
            None => Ok(Duration::from_secs(default)),
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::NotANumber { key, value }),
        };

        Ok(Self {
            backend_url: required("BACKEND_API_URL")?
                .trim_end_matches('/')
                .to_string(),
            session_jwt_secret: required("SESSION_JWT_SECRET")?,
            cashfree_api_base: lookup("CASHFREE_API_BASE").unwrap_or_default(),
            cashfree_sdk_url: lookup("CASHFREE_SDK_URL")
                .unwrap_or_else(|| DEFAULT_SDK_URL.to_string()),
            webhook_secret: lookup("CASHFREE_WEBHOOK_SECRET").filter(|s| !s.is_empty()),
            currency: lookup("PAYMENT_CURRENCY").unwrap_or_else(|| "INR".to_string()),
            view_cache_ttl: seconds("VIEW_CACHE_TTL_SECS", 60)?,
            reconcile_retention: seconds("RECONCILE_RETENTION_SECS", 86_400)?,
        })
    }
}
