//! Carina Azure Provider
//!
//! Azure Resource Manager provider implementation.
//!
//! ## Module Structure
//!
//! - `client` - `ManagementApi` trait, wire models and the REST client
//! - `config` - Provider configuration from the environment and provider blocks
//! - `context` - Client handle and region passed into every operation
//! - `cosmosdb` - Cosmos DB database account adapter, finder and region reconciler
//! - `resource_group` - Resource group adapter and finder
//! - `resources` - Resource type definitions
//! - `provider` - AzureProvider implementation
//! - `utils` - Helper functions for region names and ARM ids

pub mod client;
pub mod config;
pub mod context;
pub mod cosmosdb;
pub mod provider;
pub mod resource_group;
pub mod resources;
pub mod utils;

#[cfg(test)]
mod testing;

// Re-export main types
pub use config::{AzureConfig, AzureConfigError};
pub use context::ProviderContext;
pub use provider::AzureProvider;
pub use utils::normalize_region;

use carina_core::provider::{BoxFuture, Provider, ProviderResult, ResourceType};
use carina_core::resource::{Resource, ResourceId, State};

use resources::resource_types;

// =============================================================================
// Provider Trait Implementation
// =============================================================================

impl Provider for AzureProvider {
    fn name(&self) -> &'static str {
        "azure"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        resource_types()
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.map(|s| s.to_string());
        Box::pin(async move { self.read_resource(&id, identifier.as_deref()).await })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.create_resource(&resource).await })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move { self.update_resource(&id, &identifier, &from, &to).await })
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move { self.delete_resource(&id, &identifier).await })
    }
}
