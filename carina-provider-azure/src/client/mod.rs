//! Azure Resource Manager client
//!
//! `ManagementApi` is the seam between resource adapters and the REST API:
//! `ArmClient` talks to Resource Manager over HTTPS, tests substitute an
//! in-memory implementation.

mod arm;
pub mod models;

use std::collections::HashMap;

use async_trait::async_trait;
use carina_core::provider::ProviderResult;

pub use arm::ArmClient;
use models::{
    DatabaseAccount, DatabaseAccountUpdate, FailoverPolicy, ResourceGroup,
};

/// API version for `Microsoft.DocumentDB`
pub const COSMOSDB_API_VERSION: &str = "2021-04-15";

/// API version for `Microsoft.Resources`
pub const RESOURCES_API_VERSION: &str = "2021-04-01";

/// Typed management operations used by the adapters
///
/// Reads return `Ok(None)` for a missing object. Mutations on a missing
/// object fail with a not-found `ProviderError`.
#[async_trait]
pub trait ManagementApi: Send + Sync {
    async fn get_database_account(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ProviderResult<Option<DatabaseAccount>>;

    /// Every account in the subscription
    async fn list_database_accounts(&self) -> ProviderResult<Vec<DatabaseAccount>>;

    async fn list_database_accounts_by_resource_group(
        &self,
        resource_group: &str,
    ) -> ProviderResult<Vec<DatabaseAccount>>;

    /// PUT the full account definition and wait for provisioning
    async fn create_or_update_database_account(
        &self,
        resource_group: &str,
        name: &str,
        account: &DatabaseAccount,
    ) -> ProviderResult<DatabaseAccount>;

    /// PATCH the given properties and wait for provisioning
    async fn update_database_account(
        &self,
        resource_group: &str,
        name: &str,
        update: &DatabaseAccountUpdate,
    ) -> ProviderResult<DatabaseAccount>;

    /// Reassign failover priorities; must cover every region of the account
    async fn failover_priority_change(
        &self,
        resource_group: &str,
        name: &str,
        policies: &[FailoverPolicy],
    ) -> ProviderResult<()>;

    async fn delete_database_account(&self, resource_group: &str, name: &str)
    -> ProviderResult<()>;

    async fn get_resource_group(&self, name: &str) -> ProviderResult<Option<ResourceGroup>>;

    async fn list_resource_groups(&self) -> ProviderResult<Vec<ResourceGroup>>;

    async fn create_or_update_resource_group(
        &self,
        name: &str,
        group: &ResourceGroup,
    ) -> ProviderResult<ResourceGroup>;

    /// Replace the tags of a group
    async fn update_resource_group_tags(
        &self,
        name: &str,
        tags: &HashMap<String, String>,
    ) -> ProviderResult<ResourceGroup>;

    async fn delete_resource_group(&self, name: &str) -> ProviderResult<()>;
}
