//! In-memory `ManagementApi` for tests
//!
//! Objects live in maps keyed case-insensitively, every call is recorded,
//! and the service rules the adapters depend on are enforced: a location
//! update cannot move the write region, and a failover priority change must
//! name exactly the regions already on the account.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use carina_core::provider::{ProviderError, ProviderResult};

use crate::client::ManagementApi;
use crate::client::models::{
    DatabaseAccount, DatabaseAccountUpdate, FailoverPolicy, Location, ResourceGroup,
    ResourceGroupProperties,
};
use crate::context::ProviderContext;

const SUBSCRIPTION: &str = "sub";
const REGION: &str = "eastus";

#[derive(Default)]
struct Store {
    accounts: HashMap<(String, String), (String, DatabaseAccount)>,
    groups: HashMap<String, ResourceGroup>,
    calls: Vec<String>,
    fail_next: Vec<String>,
}

#[derive(Clone, Default)]
pub struct FakeManagementApi {
    store: Arc<Mutex<Store>>,
}

fn key(resource_group: &str, name: &str) -> (String, String) {
    (resource_group.to_lowercase(), name.to_lowercase())
}

fn account_id(resource_group: &str, name: &str) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.DocumentDB/databaseAccounts/{}",
        SUBSCRIPTION, resource_group, name
    )
}

fn group_id(name: &str) -> String {
    format!("/subscriptions/{}/resourceGroups/{}", SUBSCRIPTION, name)
}

fn region_names(locations: &[Location]) -> BTreeSet<String> {
    locations.iter().map(|l| l.location_name.clone()).collect()
}

fn write_region(locations: &[Location]) -> Option<String> {
    locations
        .iter()
        .find(|l| l.failover_priority == 0)
        .map(|l| l.location_name.clone())
}

impl FakeManagementApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context backed by this fake: subscription "sub", new objects in "eastus"
    pub fn context(&self) -> ProviderContext {
        ProviderContext::new(Arc::new(self.clone()), SUBSCRIPTION, REGION)
    }

    /// Calls recorded since creation or the last `clear_calls`
    pub fn calls(&self) -> Vec<String> {
        self.store.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.store.lock().unwrap().calls.clear();
    }

    /// Make the next call of the named operation fail with a fault
    pub fn fail_next(&self, operation: &str) {
        self.store
            .lock()
            .unwrap()
            .fail_next
            .push(operation.to_string());
    }

    /// Seed an account as if it had been created out of band
    pub fn insert_account(&self, resource_group: &str, mut account: DatabaseAccount) {
        let name = account.name.clone().unwrap_or_default();
        account.id.get_or_insert_with(|| account_id(resource_group, &name));
        self.store.lock().unwrap().accounts.insert(
            key(resource_group, &name),
            (resource_group.to_string(), account),
        );
    }

    pub fn account(&self, resource_group: &str, name: &str) -> Option<DatabaseAccount> {
        self.store
            .lock()
            .unwrap()
            .accounts
            .get(&key(resource_group, name))
            .map(|(_, a)| a.clone())
    }

    pub fn group(&self, name: &str) -> Option<ResourceGroup> {
        self.store
            .lock()
            .unwrap()
            .groups
            .get(&name.to_lowercase())
            .cloned()
    }

    /// Record a call and consume an injected failure for it
    fn record(&self, operation: &str, detail: String) -> ProviderResult<()> {
        let mut store = self.store.lock().unwrap();
        store.calls.push(format!("{} {}", operation, detail));
        if let Some(pos) = store.fail_next.iter().position(|op| op == operation) {
            store.fail_next.remove(pos);
            return Err(ProviderError::new(format!("{} failed (injected)", operation)));
        }
        Ok(())
    }
}

#[async_trait]
impl ManagementApi for FakeManagementApi {
    async fn get_database_account(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ProviderResult<Option<DatabaseAccount>> {
        self.record(
            "get_database_account",
            format!("{}/{}", resource_group, name),
        )?;
        Ok(self.account(resource_group, name))
    }

    async fn list_database_accounts(&self) -> ProviderResult<Vec<DatabaseAccount>> {
        self.record("list_database_accounts", String::new())?;
        let store = self.store.lock().unwrap();
        Ok(store.accounts.values().map(|(_, a)| a.clone()).collect())
    }

    async fn list_database_accounts_by_resource_group(
        &self,
        resource_group: &str,
    ) -> ProviderResult<Vec<DatabaseAccount>> {
        self.record(
            "list_database_accounts_by_resource_group",
            resource_group.to_string(),
        )?;
        let store = self.store.lock().unwrap();
        Ok(store
            .accounts
            .values()
            .filter(|(group, _)| group.eq_ignore_ascii_case(resource_group))
            .map(|(_, a)| a.clone())
            .collect())
    }

    async fn create_or_update_database_account(
        &self,
        resource_group: &str,
        name: &str,
        account: &DatabaseAccount,
    ) -> ProviderResult<DatabaseAccount> {
        self.record(
            "create_or_update_database_account",
            format!("{}/{}", resource_group, name),
        )?;
        let mut stored = account.clone();
        stored.id = Some(account_id(resource_group, name));
        stored.name = Some(name.to_string());
        stored.properties.provisioning_state = Some("Succeeded".to_string());
        stored.properties.document_endpoint =
            Some(format!("https://{}.documents.azure.com:443/", name));
        self.store.lock().unwrap().accounts.insert(
            key(resource_group, name),
            (resource_group.to_string(), stored.clone()),
        );
        Ok(stored)
    }

    async fn update_database_account(
        &self,
        resource_group: &str,
        name: &str,
        update: &DatabaseAccountUpdate,
    ) -> ProviderResult<DatabaseAccount> {
        let detail = match &update.properties.locations {
            Some(locations) => format!(
                "{}/{} locations={}",
                resource_group,
                name,
                locations
                    .iter()
                    .map(|l| l.location_name.as_str())
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            None => format!("{}/{} properties", resource_group, name),
        };
        self.record("update_database_account", detail)?;

        let mut store = self.store.lock().unwrap();
        let (_, account) = store
            .accounts
            .get_mut(&key(resource_group, name))
            .ok_or_else(|| ProviderError::not_found(format!("Account {} not found", name)))?;

        let props = &update.properties;
        if let Some(locations) = &props.locations {
            if write_region(locations) != write_region(&account.properties.locations) {
                return Err(ProviderError::new(
                    "The write region can only be changed by a failover priority change",
                ));
            }
            account.properties.locations = locations.clone();
        }
        if let Some(policy) = &props.consistency_policy {
            account.properties.consistency_policy = Some(policy.clone());
        }
        if let Some(rules) = &props.ip_rules {
            account.properties.ip_rules = rules.clone();
        }
        if let Some(enabled) = props.is_virtual_network_filter_enabled {
            account.properties.is_virtual_network_filter_enabled = enabled;
        }
        if let Some(rules) = &props.virtual_network_rules {
            account.properties.virtual_network_rules = rules.clone();
        }
        if let Some(enabled) = props.enable_automatic_failover {
            account.properties.enable_automatic_failover = enabled;
        }
        if let Some(tags) = &update.tags {
            account.tags = tags.clone();
        }
        Ok(account.clone())
    }

    async fn failover_priority_change(
        &self,
        resource_group: &str,
        name: &str,
        policies: &[FailoverPolicy],
    ) -> ProviderResult<()> {
        let order: Vec<&str> = policies.iter().map(|p| p.location_name.as_str()).collect();
        self.record(
            "failover_priority_change",
            format!("{}/{} {}", resource_group, name, order.join(",")),
        )?;

        let mut store = self.store.lock().unwrap();
        let (_, account) = store
            .accounts
            .get_mut(&key(resource_group, name))
            .ok_or_else(|| ProviderError::not_found(format!("Account {} not found", name)))?;

        let requested: BTreeSet<String> = order.iter().map(|s| s.to_string()).collect();
        if requested.len() != policies.len()
            || requested != region_names(&account.properties.locations)
        {
            return Err(ProviderError::new(format!(
                "Failover policies {:?} must name every region of the account exactly once",
                order
            )));
        }

        account.properties.locations = policies
            .iter()
            .map(|p| Location::new(p.location_name.clone(), p.failover_priority))
            .collect();
        Ok(())
    }

    async fn delete_database_account(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ProviderResult<()> {
        self.record(
            "delete_database_account",
            format!("{}/{}", resource_group, name),
        )?;
        self.store
            .lock()
            .unwrap()
            .accounts
            .remove(&key(resource_group, name))
            .map(|_| ())
            .ok_or_else(|| ProviderError::not_found(format!("Account {} not found", name)))
    }

    async fn get_resource_group(&self, name: &str) -> ProviderResult<Option<ResourceGroup>> {
        self.record("get_resource_group", name.to_string())?;
        Ok(self.group(name))
    }

    async fn list_resource_groups(&self) -> ProviderResult<Vec<ResourceGroup>> {
        self.record("list_resource_groups", String::new())?;
        Ok(self.store.lock().unwrap().groups.values().cloned().collect())
    }

    async fn create_or_update_resource_group(
        &self,
        name: &str,
        group: &ResourceGroup,
    ) -> ProviderResult<ResourceGroup> {
        self.record("create_or_update_resource_group", name.to_string())?;
        let mut stored = group.clone();
        stored.id = Some(group_id(name));
        stored.name = Some(name.to_string());
        stored.properties = Some(ResourceGroupProperties {
            provisioning_state: Some("Succeeded".to_string()),
        });
        self.store
            .lock()
            .unwrap()
            .groups
            .insert(name.to_lowercase(), stored.clone());
        Ok(stored)
    }

    async fn update_resource_group_tags(
        &self,
        name: &str,
        tags: &HashMap<String, String>,
    ) -> ProviderResult<ResourceGroup> {
        self.record("update_resource_group_tags", name.to_string())?;
        let mut store = self.store.lock().unwrap();
        let group = store
            .groups
            .get_mut(&name.to_lowercase())
            .ok_or_else(|| ProviderError::not_found(format!("Resource group {} not found", name)))?;
        group.tags = tags.clone();
        Ok(group.clone())
    }

    async fn delete_resource_group(&self, name: &str) -> ProviderResult<()> {
        self.record("delete_resource_group", name.to_string())?;
        self.store
            .lock()
            .unwrap()
            .groups
            .remove(&name.to_lowercase())
            .map(|_| ())
            .ok_or_else(|| ProviderError::not_found(format!("Resource group {} not found", name)))
    }
}
