//! Cosmos DB database account adapter

use std::collections::HashMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use carina_core::adapter::{FieldModel, ResourceAdapter, fields};
use carina_core::provider::{ProviderError, ProviderResult};
use carina_core::resource::Value;
use carina_core::schema::{
    AttributeSchema, AttributeType, ConfigurationError, Mutability, ResourceSchema, types,
};
use regex::Regex;

use super::kind::{ConsistencyLevel, DatabaseAccountKind};
use super::regions::reconcile_regions;
use crate::client::models::{
    ConsistencyPolicy, DatabaseAccount, DatabaseAccountProperties, DatabaseAccountUpdate,
    DatabaseAccountUpdateProperties, FailoverPolicy, IpAddressOrRange, Location,
    VirtualNetworkRule,
};
use crate::context::ProviderContext;
use crate::utils::{ArmResourceId, normalize_region};

pub const RESOURCE_TYPE: &str = "cosmosdb.database_account";

/// ARM resource type of a database account
pub const ARM_TYPE: &str = "Microsoft.DocumentDB/databaseAccounts";

static ACCOUNT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9-]{1,42}[a-z0-9]$").expect("account name pattern is valid")
});

/// Account names are 3-44 lowercase letters, digits, or hyphens, and may not
/// start or end with a hyphen
pub fn validate_account_name(value: &Value) -> Result<(), String> {
    match value {
        Value::String(name) if ACCOUNT_NAME.is_match(name) => Ok(()),
        Value::String(name) => Err(format!(
            "'{}' must be 3-44 characters of lowercase letters, digits, or '-', \
             and must not start or end with '-'",
            name
        )),
        _ => Err("Expected string".to_string()),
    }
}

fn account_name_type() -> AttributeType {
    AttributeType::Custom {
        name: "CosmosDbAccountName".to_string(),
        base: Box::new(AttributeType::String),
        validate: validate_account_name,
    }
}

/// A declared Cosmos DB database account
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CosmosDbAccountResource {
    pub name: String,
    pub resource_group: String,
    pub kind: Option<DatabaseAccountKind>,
    pub consistency_level: Option<ConsistencyLevel>,
    /// Seconds; bounded staleness only
    pub max_interval: Option<i64>,
    /// Operations; bounded staleness only
    pub max_staleness_prefix: Option<i64>,
    pub ip_range_filter: Vec<String>,
    /// Subnet resource ids
    pub virtual_network_rules: Vec<String>,
    pub write_region: Option<String>,
    /// In failover order
    pub read_regions: Vec<String>,
    pub enable_automatic_failover: bool,
    pub tags: HashMap<String, String>,

    // Outputs
    pub id: Option<String>,
    pub document_endpoint: Option<String>,
    pub provisioning_state: Option<String>,
}

impl CosmosDbAccountResource {
    /// Adapter addressing an existing account by its ARM id
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        let arm_id = ArmResourceId::parse(identifier)?;
        if !arm_id.is_type(ARM_TYPE) {
            return None;
        }
        Some(Self {
            name: arm_id.name().to_string(),
            resource_group: arm_id.resource_group.clone(),
            id: Some(identifier.to_string()),
            ..Default::default()
        })
    }

    /// Record of an account returned by the provider
    pub fn from_account(account: DatabaseAccount) -> Self {
        let mut record = Self::default();
        record.hydrate(account);
        record
    }

    /// `(resource group, name)` of the provider object, preferring the ARM id
    ///
    /// `None` when nothing addresses an object the context can reach: an id
    /// in another subscription, or an empty compound key.
    fn lookup_key(&self, ctx: &ProviderContext) -> Option<(String, String)> {
        let (resource_group, name) = match self.id.as_deref().and_then(ArmResourceId::parse) {
            Some(arm_id) if arm_id.is_type(ARM_TYPE) => {
                if !ctx.owns(&arm_id) {
                    log::warn!(
                        "{} is in subscription {}, not {}",
                        self.display_name(),
                        arm_id.subscription_id,
                        ctx.subscription_id
                    );
                    return None;
                }
                (arm_id.resource_group.clone(), arm_id.name().to_string())
            }
            _ => (self.resource_group.clone(), self.name.clone()),
        };
        if resource_group.is_empty() || name.is_empty() {
            return None;
        }
        Some((resource_group, name))
    }

    /// Check everything create and update need, before any provider call
    ///
    /// Returns the consistency policy and the write region.
    fn validate(&self) -> Result<(ConsistencyPolicy, String), ConfigurationError> {
        validate_account_name(&Value::String(self.name.clone()))
            .map_err(|message| ConfigurationError::invalid("name", message))?;
        if self.resource_group.is_empty() {
            return Err(ConfigurationError::missing("resource_group", &[]));
        }

        let level = self
            .consistency_level
            .ok_or_else(|| ConfigurationError::missing("consistency_level", &ConsistencyLevel::NAMES))?;
        let policy = level.policy(self.max_staleness_prefix, self.max_interval)?;

        let write = self
            .write_region
            .clone()
            .ok_or_else(|| ConfigurationError::missing("write_region", &[]))?;
        if self.read_regions.contains(&write) {
            return Err(ConfigurationError::invalid(
                "read_regions",
                format!("'{}' is already the write region", write),
            ));
        }

        Ok((policy, write))
    }

    fn ip_rules(&self) -> Vec<IpAddressOrRange> {
        self.ip_range_filter
            .iter()
            .map(|ip| IpAddressOrRange {
                ip_address_or_range: ip.clone(),
            })
            .collect()
    }

    fn network_rules(&self) -> Vec<VirtualNetworkRule> {
        self.virtual_network_rules
            .iter()
            .map(|subnet| VirtualNetworkRule {
                id: subnet.clone(),
                ignore_missing_v_net_service_endpoint: false,
            })
            .collect()
    }

    /// Overwrite every field from a provider object
    fn hydrate(&mut self, account: DatabaseAccount) {
        self.kind = DatabaseAccountKind::from_account(&account);

        let DatabaseAccount {
            id,
            name,
            tags,
            properties,
            ..
        } = account;

        if let Some(arm_id) = id.as_deref().and_then(ArmResourceId::parse) {
            self.resource_group = arm_id.resource_group;
        }
        if let Some(name) = name {
            self.name = name;
        }

        let policy = properties.consistency_policy;
        self.consistency_level = policy.as_ref().and_then(|p| {
            let level = ConsistencyLevel::from_provider(&p.default_consistency_level);
            if level.is_none() {
                log::warn!(
                    "Unsupported consistency level '{}' on account {}",
                    p.default_consistency_level,
                    self.name
                );
            }
            level
        });
        match (self.consistency_level, policy) {
            (Some(ConsistencyLevel::BoundedStaleness), Some(p)) => {
                self.max_staleness_prefix = p.max_staleness_prefix;
                self.max_interval = p.max_interval_in_seconds;
            }
            _ => {
                self.max_staleness_prefix = None;
                self.max_interval = None;
            }
        }

        let (write_region, read_regions) = split_locations(&properties.locations);
        self.write_region = write_region;
        self.read_regions = read_regions;

        self.ip_range_filter = properties
            .ip_rules
            .into_iter()
            .map(|r| r.ip_address_or_range)
            .collect();
        self.virtual_network_rules = properties
            .virtual_network_rules
            .into_iter()
            .map(|r| r.id)
            .collect();
        self.enable_automatic_failover = properties.enable_automatic_failover;
        self.tags = tags;

        self.id = id;
        self.document_endpoint = properties.document_endpoint;
        self.provisioning_state = properties.provisioning_state;
    }

    /// Replace the region list, keeping the given order as failover priority
    async fn put_locations(
        &self,
        ctx: &ProviderContext,
        resource_group: &str,
        name: &str,
        regions: &[String],
    ) -> ProviderResult<()> {
        log::debug!("Setting regions of {} to {:?}", self.display_name(), regions);
        let update = DatabaseAccountUpdate {
            tags: None,
            properties: DatabaseAccountUpdateProperties {
                locations: Some(prioritized(regions)),
                ..Default::default()
            },
        };
        ctx.client
            .update_database_account(resource_group, name, &update)
            .await?;
        Ok(())
    }
}

/// Locations with failover priority following slice order
fn prioritized(regions: &[String]) -> Vec<Location> {
    regions
        .iter()
        .enumerate()
        .map(|(i, region)| Location::new(region.clone(), i as i32))
        .collect()
}

/// Split a prioritized location list into the write region and the read
/// regions in ascending priority
fn split_locations(locations: &[Location]) -> (Option<String>, Vec<String>) {
    let mut sorted: Vec<&Location> = locations.iter().collect();
    sorted.sort_by_key(|l| l.failover_priority);

    let mut write_region = None;
    let mut read_regions: Vec<String> = Vec::new();
    for location in sorted {
        let region = normalize_region(&location.location_name);
        if location.failover_priority == 0 && write_region.is_none() {
            write_region = Some(region);
        } else if write_region.as_ref() != Some(&region) && !read_regions.contains(&region) {
            read_regions.push(region);
        }
    }
    (write_region, read_regions)
}

fn dedup_regions(regions: Vec<String>) -> Vec<String> {
    let mut result: Vec<String> = Vec::with_capacity(regions.len());
    for region in regions {
        let region = normalize_region(&region);
        if !result.contains(&region) {
            result.push(region);
        }
    }
    result
}

impl FieldModel for CosmosDbAccountResource {
    fn schema() -> ResourceSchema {
        let kinds = DatabaseAccountKind::NAMES.iter().map(|s| s.to_string()).collect();
        let levels = ConsistencyLevel::NAMES.iter().map(|s| s.to_string()).collect();

        ResourceSchema::new(RESOURCE_TYPE)
            .with_description("An Azure Cosmos DB database account")
            .attribute(
                AttributeSchema::new("name", account_name_type())
                    .required()
                    .immutable()
                    .with_provider_name("name"),
            )
            .attribute(
                AttributeSchema::new("resource_group", AttributeType::String)
                    .required()
                    .immutable(),
            )
            .attribute(
                AttributeSchema::new("kind", AttributeType::Enum(kinds))
                    .immutable()
                    .with_description("Data model of the account")
                    .with_provider_name("kind"),
            )
            .attribute(
                AttributeSchema::new("consistency_level", AttributeType::Enum(levels))
                    .with_provider_name("consistencyPolicy.defaultConsistencyLevel"),
            )
            .attribute(
                AttributeSchema::new("max_interval", AttributeType::Int)
                    .with_description("Maximum lag in seconds (bounded staleness)")
                    .with_provider_name("consistencyPolicy.maxIntervalInSeconds"),
            )
            .attribute(
                AttributeSchema::new("max_staleness_prefix", AttributeType::Int)
                    .with_description("Maximum lag in operations (bounded staleness)")
                    .with_provider_name("consistencyPolicy.maxStalenessPrefix"),
            )
            .attribute(
                AttributeSchema::new("ip_range_filter", types::string_list())
                    .with_provider_name("ipRules"),
            )
            .attribute(
                AttributeSchema::new("virtual_network_rules", types::string_list())
                    .with_description("Subnet ids allowed to reach the account")
                    .with_provider_name("virtualNetworkRules"),
            )
            .attribute(
                AttributeSchema::new("write_region", AttributeType::String)
                    .required()
                    .with_provider_name("locations"),
            )
            .attribute(
                AttributeSchema::new("read_regions", types::string_list())
                    .with_description("Read regions in failover order")
                    .with_provider_name("locations"),
            )
            .attribute(
                AttributeSchema::new("enable_automatic_failover", AttributeType::Bool)
                    .with_default(Value::Bool(false))
                    .with_provider_name("enableAutomaticFailover"),
            )
            .attribute(AttributeSchema::new("tags", types::string_map()))
            .attribute(AttributeSchema::new("id", AttributeType::String).output())
            .attribute(
                AttributeSchema::new("document_endpoint", AttributeType::String)
                    .output()
                    .with_provider_name("documentEndpoint"),
            )
            .attribute(
                AttributeSchema::new("provisioning_state", AttributeType::String)
                    .output()
                    .with_provider_name("provisioningState"),
            )
    }

    fn from_attributes(attributes: &HashMap<String, Value>) -> Result<Self, ConfigurationError> {
        let kind = fields::optional_string(attributes, "kind")?
            .map(|s| s.parse::<DatabaseAccountKind>())
            .transpose()?;
        let consistency_level = fields::optional_string(attributes, "consistency_level")?
            .map(|s| s.parse::<ConsistencyLevel>())
            .transpose()?;

        Ok(Self {
            name: fields::required_string(attributes, "name")?,
            resource_group: fields::required_string(attributes, "resource_group")?,
            kind,
            consistency_level,
            max_interval: fields::optional_int(attributes, "max_interval")?,
            max_staleness_prefix: fields::optional_int(attributes, "max_staleness_prefix")?,
            ip_range_filter: fields::string_list(attributes, "ip_range_filter")?,
            virtual_network_rules: fields::string_list(attributes, "virtual_network_rules")?,
            write_region: fields::optional_string(attributes, "write_region")?
                .map(|r| normalize_region(&r)),
            read_regions: dedup_regions(fields::string_list(attributes, "read_regions")?),
            enable_automatic_failover: fields::optional_bool(
                attributes,
                "enable_automatic_failover",
            )?
            .unwrap_or(false),
            tags: fields::string_map(attributes, "tags")?,
            id: fields::optional_string(attributes, "id")?,
            document_endpoint: fields::optional_string(attributes, "document_endpoint")?,
            provisioning_state: fields::optional_string(attributes, "provisioning_state")?,
        })
    }

    fn to_attributes(&self) -> HashMap<String, Value> {
        let mut attributes = HashMap::new();
        attributes.insert("name".to_string(), Value::String(self.name.clone()));
        attributes.insert(
            "resource_group".to_string(),
            Value::String(self.resource_group.clone()),
        );
        fields::put_string(&mut attributes, "kind", self.kind.map(|k| k.as_str()));
        fields::put_string(
            &mut attributes,
            "consistency_level",
            self.consistency_level.map(|l| l.as_str()),
        );
        // Staleness bounds only mean something for bounded staleness
        if self.consistency_level == Some(ConsistencyLevel::BoundedStaleness) {
            fields::put_int(&mut attributes, "max_interval", self.max_interval);
            fields::put_int(
                &mut attributes,
                "max_staleness_prefix",
                self.max_staleness_prefix,
            );
        }
        attributes.insert(
            "ip_range_filter".to_string(),
            Value::string_list(self.ip_range_filter.iter().cloned()),
        );
        attributes.insert(
            "virtual_network_rules".to_string(),
            Value::string_list(self.virtual_network_rules.iter().cloned()),
        );
        fields::put_string(&mut attributes, "write_region", self.write_region.as_deref());
        attributes.insert(
            "read_regions".to_string(),
            Value::string_list(self.read_regions.iter().cloned()),
        );
        attributes.insert(
            "enable_automatic_failover".to_string(),
            Value::Bool(self.enable_automatic_failover),
        );
        attributes.insert("tags".to_string(), Value::string_map(&self.tags));
        fields::put_string(&mut attributes, "id", self.id.as_deref());
        fields::put_string(
            &mut attributes,
            "document_endpoint",
            self.document_endpoint.as_deref(),
        );
        fields::put_string(
            &mut attributes,
            "provisioning_state",
            self.provisioning_state.as_deref(),
        );
        attributes
    }
}

#[async_trait]
impl ResourceAdapter for CosmosDbAccountResource {
    type Context = ProviderContext;

    fn display_name(&self) -> String {
        format!(
            "Cosmos DB account '{}' (resource group '{}')",
            self.name, self.resource_group
        )
    }

    async fn refresh(&mut self, ctx: &ProviderContext) -> ProviderResult<bool> {
        let Some((resource_group, name)) = self.lookup_key(ctx) else {
            return Ok(false);
        };

        log::debug!("Refreshing {}", self.display_name());
        match ctx.client.get_database_account(&resource_group, &name).await? {
            Some(account) => {
                self.hydrate(account);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn create(&mut self, ctx: &ProviderContext) -> ProviderResult<()> {
        let kind = self
            .kind
            .ok_or_else(|| ConfigurationError::missing("kind", &DatabaseAccountKind::NAMES))?;
        let (policy, write) = self.validate()?;

        let mut regions = vec![write];
        regions.extend(self.read_regions.iter().cloned());
        let network_rules = self.network_rules();

        let mut account = DatabaseAccount {
            location: ctx.region.clone(),
            tags: self.tags.clone(),
            properties: DatabaseAccountProperties {
                database_account_offer_type: Some("Standard".to_string()),
                consistency_policy: Some(policy),
                locations: prioritized(&regions),
                ip_rules: self.ip_rules(),
                is_virtual_network_filter_enabled: !network_rules.is_empty(),
                virtual_network_rules: network_rules,
                enable_automatic_failover: self.enable_automatic_failover,
                ..Default::default()
            },
            ..Default::default()
        };
        kind.apply(&mut account);

        log::info!("Creating {}", self.display_name());
        let created = ctx
            .client
            .create_or_update_database_account(&self.resource_group, &self.name, &account)
            .await?;

        self.id = created.id;
        self.document_endpoint = created.properties.document_endpoint;
        self.provisioning_state = created.properties.provisioning_state;
        Ok(())
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        current: &Self,
        changed_fields: &[String],
    ) -> ProviderResult<()> {
        let schema = Self::schema();
        let mut updatable: Vec<&str> = Vec::new();
        for field in changed_fields {
            match schema.mutability(field) {
                Some(Mutability::Updatable) => updatable.push(field),
                Some(Mutability::Immutable) => log::warn!(
                    "Ignoring change to immutable field '{}' of {}",
                    field,
                    self.display_name()
                ),
                _ => {}
            }
        }
        if updatable.is_empty() {
            log::debug!("No updatable changes for {}", self.display_name());
            return Ok(());
        }

        let (policy, write) = self.validate()?;
        let (resource_group, name) = current.lookup_key(ctx).ok_or_else(|| {
            ProviderError::not_found(format!("{} does not exist", current.display_name()))
        })?;
        log::info!(
            "Updating {} ({})",
            self.display_name(),
            updatable.join(", ")
        );

        // Region membership: adds, then removes, keeping the current write
        // region at priority 0
        let delta = reconcile_regions(&self.read_regions, &current.read_regions, &write);
        let mut active: Vec<String> = current
            .write_region
            .iter()
            .chain(current.read_regions.iter())
            .cloned()
            .collect();

        let added: Vec<String> = delta
            .to_add
            .iter()
            .filter(|r| !active.contains(r))
            .cloned()
            .collect();
        if !added.is_empty() {
            active.extend(added);
            self.put_locations(ctx, &resource_group, &name, &active)
                .await?;
        }
        if active.iter().any(|r| delta.to_remove.contains(r)) {
            active.retain(|r| !delta.to_remove.contains(r));
            self.put_locations(ctx, &resource_group, &name, &active)
                .await?;
        }

        // Consistency policy goes with every property update
        let network_rules = self.network_rules();
        let update = DatabaseAccountUpdate {
            tags: Some(self.tags.clone()),
            properties: DatabaseAccountUpdateProperties {
                consistency_policy: Some(policy),
                locations: None,
                ip_rules: Some(self.ip_rules()),
                is_virtual_network_filter_enabled: Some(!network_rules.is_empty()),
                virtual_network_rules: Some(network_rules),
                enable_automatic_failover: Some(self.enable_automatic_failover),
            },
        };
        ctx.client
            .update_database_account(&resource_group, &name, &update)
            .await?;

        // Priorities: write region first, then reads in declared order. A
        // former write region that is no longer declared goes last and is
        // dropped afterwards.
        let stale_write = current
            .write_region
            .clone()
            .filter(|w| *w != write && !self.read_regions.contains(w));
        let mut regions = vec![write];
        regions.extend(self.read_regions.iter().cloned());
        let mut order = regions.clone();
        order.extend(stale_write.iter().cloned());

        let policies: Vec<FailoverPolicy> = order
            .iter()
            .enumerate()
            .map(|(i, region)| FailoverPolicy {
                location_name: region.clone(),
                failover_priority: i as i32,
            })
            .collect();
        ctx.client
            .failover_priority_change(&resource_group, &name, &policies)
            .await?;

        if let Some(stale) = stale_write {
            log::info!("Removing former write region {} from {}", stale, self.display_name());
            self.put_locations(ctx, &resource_group, &name, &regions)
                .await?;
        }

        Ok(())
    }

    async fn delete(&self, ctx: &ProviderContext) -> ProviderResult<()> {
        let Some((resource_group, name)) = self.lookup_key(ctx) else {
            log::info!("{} addresses no account, nothing to delete", self.display_name());
            return Ok(());
        };
        log::info!("Deleting {}", self.display_name());
        match ctx
            .client
            .delete_database_account(&resource_group, &name)
            .await
        {
            Err(e) if e.is_not_found() => {
                log::info!("{} is already gone", self.display_name());
                Ok(())
            }
            other => other,
        }
    }
}
