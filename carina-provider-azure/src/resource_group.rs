//! Resource group adapter and finder

use std::collections::HashMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use carina_core::adapter::{FieldModel, ResourceAdapter, fields};
use carina_core::finder::{Filters, Finder};
use carina_core::provider::{ProviderError, ProviderResult};
use carina_core::resource::Value;
use carina_core::schema::{
    AttributeSchema, AttributeType, ConfigurationError, Mutability, ResourceSchema, types,
};
use regex::Regex;

use crate::client::models::ResourceGroup;
use crate::context::ProviderContext;
use crate::utils::{ArmResourceId, normalize_region};

pub const RESOURCE_TYPE: &str = "resource_group";

static GROUP_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-\w._()]{1,90}$").expect("resource group name pattern is valid")
});

/// Resource group names are 1-90 word characters, '-', '.', '_', '(' or ')',
/// not ending in '.'
pub fn validate_group_name(value: &Value) -> Result<(), String> {
    match value {
        Value::String(name) if GROUP_NAME.is_match(name) && !name.ends_with('.') => Ok(()),
        Value::String(name) => Err(format!(
            "'{}' must be 1-90 alphanumerics, '-', '.', '_', '(' or ')', and must not end with '.'",
            name
        )),
        _ => Err("Expected string".to_string()),
    }
}

/// A declared resource group
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceGroupResource {
    pub name: String,
    /// Defaults to the provider region
    pub location: Option<String>,
    pub tags: HashMap<String, String>,
    pub id: Option<String>,
    pub provisioning_state: Option<String>,
}

impl ResourceGroupResource {
    /// Adapter addressing an existing group by its ARM id
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        let arm_id = ArmResourceId::parse(identifier)?;
        if arm_id.resource.is_some() {
            return None;
        }
        Some(Self {
            name: arm_id.resource_group,
            id: Some(identifier.to_string()),
            ..Default::default()
        })
    }

    /// Record of a group returned by the provider
    pub fn from_group(group: ResourceGroup) -> Self {
        let mut record = Self::default();
        record.hydrate(group);
        record
    }

    /// Group name to address, preferring the ARM id; `None` when the id is in
    /// another subscription or no name is known
    fn lookup_name(&self, ctx: &ProviderContext) -> Option<String> {
        let name = match self.id.as_deref().and_then(ArmResourceId::parse) {
            Some(arm_id) if arm_id.resource.is_none() => {
                if !ctx.owns(&arm_id) {
                    log::warn!(
                        "{} is in subscription {}, not {}",
                        self.display_name(),
                        arm_id.subscription_id,
                        ctx.subscription_id
                    );
                    return None;
                }
                arm_id.resource_group
            }
            _ => self.name.clone(),
        };
        (!name.is_empty()).then_some(name)
    }

    fn hydrate(&mut self, group: ResourceGroup) {
        if let Some(name) = group.name {
            self.name = name;
        }
        self.location = Some(normalize_region(&group.location));
        self.tags = group.tags;
        self.id = group.id;
        self.provisioning_state = group.properties.and_then(|p| p.provisioning_state);
    }
}

impl FieldModel for ResourceGroupResource {
    fn schema() -> ResourceSchema {
        ResourceSchema::new(RESOURCE_TYPE)
            .with_description("An Azure resource group")
            .attribute(
                AttributeSchema::new(
                    "name",
                    AttributeType::Custom {
                        name: "ResourceGroupName".to_string(),
                        base: Box::new(AttributeType::String),
                        validate: validate_group_name,
                    },
                )
                .required()
                .immutable(),
            )
            .attribute(AttributeSchema::new("location", AttributeType::String).immutable())
            .attribute(AttributeSchema::new("tags", types::string_map()))
            .attribute(AttributeSchema::new("id", AttributeType::String).output())
            .attribute(
                AttributeSchema::new("provisioning_state", AttributeType::String)
                    .output()
                    .with_provider_name("properties.provisioningState"),
            )
    }

    fn from_attributes(attributes: &HashMap<String, Value>) -> Result<Self, ConfigurationError> {
        Ok(Self {
            name: fields::required_string(attributes, "name")?,
            location: fields::optional_string(attributes, "location")?.map(|l| normalize_region(&l)),
            tags: fields::string_map(attributes, "tags")?,
            id: fields::optional_string(attributes, "id")?,
            provisioning_state: fields::optional_string(attributes, "provisioning_state")?,
        })
    }

    fn to_attributes(&self) -> HashMap<String, Value> {
        let mut attributes = HashMap::new();
        attributes.insert("name".to_string(), Value::String(self.name.clone()));
        fields::put_string(&mut attributes, "location", self.location.as_deref());
        attributes.insert("tags".to_string(), Value::string_map(&self.tags));
        fields::put_string(&mut attributes, "id", self.id.as_deref());
        fields::put_string(
            &mut attributes,
            "provisioning_state",
            self.provisioning_state.as_deref(),
        );
        attributes
    }
}

#[async_trait]
impl ResourceAdapter for ResourceGroupResource {
    type Context = ProviderContext;

    fn display_name(&self) -> String {
        format!("resource group '{}'", self.name)
    }

    async fn refresh(&mut self, ctx: &ProviderContext) -> ProviderResult<bool> {
        let Some(name) = self.lookup_name(ctx) else {
            return Ok(false);
        };

        match ctx.client.get_resource_group(&name).await? {
            Some(group) => {
                self.hydrate(group);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn create(&mut self, ctx: &ProviderContext) -> ProviderResult<()> {
        validate_group_name(&Value::String(self.name.clone()))
            .map_err(|message| ConfigurationError::invalid("name", message))?;

        let group = ResourceGroup {
            location: self
                .location
                .clone()
                .unwrap_or_else(|| ctx.region.clone()),
            tags: self.tags.clone(),
            ..Default::default()
        };

        log::info!("Creating {} in {}", self.display_name(), group.location);
        let created = ctx
            .client
            .create_or_update_resource_group(&self.name, &group)
            .await?;

        self.id = created.id;
        self.provisioning_state = created.properties.and_then(|p| p.provisioning_state);
        Ok(())
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        current: &Self,
        changed_fields: &[String],
    ) -> ProviderResult<()> {
        let schema = Self::schema();
        let mut apply = false;
        for field in changed_fields {
            match schema.mutability(field) {
                Some(Mutability::Updatable) => apply = true,
                Some(Mutability::Immutable) => log::warn!(
                    "Ignoring change to immutable field '{}' of {}",
                    field,
                    self.display_name()
                ),
                _ => {}
            }
        }
        if !apply {
            return Ok(());
        }

        let name = current.lookup_name(ctx).ok_or_else(|| {
            ProviderError::not_found(format!("{} does not exist", current.display_name()))
        })?;
        log::info!("Updating tags of {}", self.display_name());
        ctx.client
            .update_resource_group_tags(&name, &self.tags)
            .await?;
        Ok(())
    }

    async fn delete(&self, ctx: &ProviderContext) -> ProviderResult<()> {
        let Some(name) = self.lookup_name(ctx) else {
            log::info!("{} addresses no group, nothing to delete", self.display_name());
            return Ok(());
        };
        log::info!("Deleting {}", self.display_name());
        match ctx.client.delete_resource_group(&name).await {
            Err(e) if e.is_not_found() => {
                log::info!("{} is already gone", self.display_name());
                Ok(())
            }
            other => other,
        }
    }
}

/// Finds resource groups by `name` or `id`
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceGroupFinder;

impl ResourceGroupFinder {
    pub const FILTER_KEYS: &'static [&'static str] = &["name", "id"];
}

#[async_trait]
impl Finder for ResourceGroupFinder {
    type Context = ProviderContext;
    type Item = ResourceGroupResource;

    fn filter_keys(&self) -> &'static [&'static str] {
        Self::FILTER_KEYS
    }

    async fn find_all(&self, ctx: &ProviderContext) -> ProviderResult<Vec<ResourceGroupResource>> {
        let groups = ctx.client.list_resource_groups().await?;
        Ok(groups.into_iter().map(ResourceGroupResource::from_group).collect())
    }

    async fn find(
        &self,
        ctx: &ProviderContext,
        filters: &Filters,
    ) -> ProviderResult<Vec<ResourceGroupResource>> {
        filters.check_keys(self.filter_keys())?;

        let name = match (filters.get("id"), filters.get("name")) {
            (Some(id), name) => match ArmResourceId::parse(id) {
                Some(arm_id)
                    if arm_id.resource.is_none()
                        && ctx.owns(&arm_id)
                        && name.is_none_or(|n| n.eq_ignore_ascii_case(&arm_id.resource_group)) =>
                {
                    arm_id.resource_group
                }
                _ => return Ok(Vec::new()),
            },
            (None, Some(name)) => name.to_string(),
            (None, None) => return self.find_all(ctx).await,
        };

        let group = ctx.client.get_resource_group(&name).await?;
        Ok(group.into_iter().map(ResourceGroupResource::from_group).collect())
    }
}
