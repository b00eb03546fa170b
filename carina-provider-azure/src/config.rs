//! Provider configuration
//!
//! Settings come from the environment and may be overridden by the
//! attributes of a `provider azure { ... }` block.

use std::collections::HashMap;

use carina_core::resource::Value;
use thiserror::Error;

use crate::utils::normalize_region;

/// Default Azure Resource Manager endpoint
pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";

/// Default region used when neither the environment nor the block sets one
pub const DEFAULT_REGION: &str = "eastus";

/// Errors building the provider configuration
#[derive(Debug, Error, PartialEq)]
pub enum AzureConfigError {
    #[error("Missing required setting: {0}")]
    Missing(String),

    #[error("Invalid setting '{key}': {message}")]
    Invalid { key: String, message: String },
}

/// Azure provider configuration
#[derive(Clone, PartialEq)]
pub struct AzureConfig {
    pub subscription_id: String,
    /// Region in programmatic form (e.g., "eastus")
    pub region: String,
    /// Bearer token for the management API
    pub access_token: String,
    /// Resource Manager base URL
    pub endpoint: String,
}

// The token stays out of logs.
impl std::fmt::Debug for AzureConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureConfig")
            .field("subscription_id", &self.subscription_id)
            .field("region", &self.region)
            .field("access_token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl AzureConfig {
    /// Create AzureConfig from environment variables
    pub fn from_env() -> Result<Self, AzureConfigError> {
        Self::from_sources(|key| std::env::var(key).ok(), &HashMap::new())
    }

    /// Create AzureConfig from a provider block, falling back to the environment
    pub fn from_attributes(attributes: &HashMap<String, Value>) -> Result<Self, AzureConfigError> {
        Self::from_sources(|key| std::env::var(key).ok(), attributes)
    }

    fn from_sources(
        env: impl Fn(&str) -> Option<String>,
        attributes: &HashMap<String, Value>,
    ) -> Result<Self, AzureConfigError> {
        let setting = |attr: &str, var: &str| -> Result<Option<String>, AzureConfigError> {
            match attributes.get(attr) {
                Some(Value::String(s)) => Ok(Some(s.clone())),
                Some(_) => Err(AzureConfigError::Invalid {
                    key: attr.to_string(),
                    message: "expected a string".to_string(),
                }),
                None => Ok(env(var).filter(|v| !v.is_empty())),
            }
        };

        let subscription_id = setting("subscription_id", "AZURE_SUBSCRIPTION_ID")?
            .ok_or_else(|| AzureConfigError::Missing("AZURE_SUBSCRIPTION_ID".to_string()))?;
        let region = setting("region", "AZURE_REGION")?
            .map(|r| normalize_region(&r))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let endpoint = setting("endpoint", "AZURE_RESOURCE_MANAGER_ENDPOINT")?
            .map(|e| e.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        // Tokens are never read from configuration files.
        let access_token = env("AZURE_ACCESS_TOKEN")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AzureConfigError::Missing("AZURE_ACCESS_TOKEN".to_string()))?;

        Ok(Self {
            subscription_id,
            region,
            access_token,
            endpoint,
        })
    }
}
