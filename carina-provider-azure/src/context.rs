//! Provider context handed to every adapter and finder operation

use std::sync::Arc;

use crate::client::{ArmClient, ManagementApi};
use crate::config::AzureConfig;
use crate::utils::ArmResourceId;

/// Shared handles an operation needs: the management client, the
/// subscription it is bound to, and the region new objects are placed in
#[derive(Clone)]
pub struct ProviderContext {
    pub client: Arc<dyn ManagementApi>,
    /// Subscription every client call is scoped to
    pub subscription_id: String,
    /// Region in programmatic form (e.g., "eastus")
    pub region: String,
}

impl ProviderContext {
    pub fn new(
        client: Arc<dyn ManagementApi>,
        subscription_id: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            client,
            subscription_id: subscription_id.into(),
            region: region.into(),
        }
    }

    /// Context backed by the Resource Manager REST API
    pub fn from_config(config: &AzureConfig) -> Self {
        Self::new(
            Arc::new(ArmClient::new(config)),
            config.subscription_id.clone(),
            config.region.clone(),
        )
    }

    /// Whether the client can reach the object an ARM id names
    pub fn owns(&self, arm_id: &ArmResourceId) -> bool {
        arm_id.subscription_id.eq_ignore_ascii_case(&self.subscription_id)
    }
}

impl std::fmt::Debug for ProviderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderContext")
            .field("subscription_id", &self.subscription_id)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}
