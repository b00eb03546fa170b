//! Azure Provider implementation
//!
//! Bridges the engine-facing `Provider` trait onto the typed resource
//! adapters: attributes are decoded into an adapter, the adapter talks to
//! Resource Manager, and a refresh turns the result back into `State`.

use carina_core::adapter::{FieldModel, ResourceAdapter};
use carina_core::differ;
use carina_core::provider::{ProviderError, ProviderResult};
use carina_core::resource::{Resource, ResourceId, State, Value};
use carina_core::schema::ConfigurationError;

use crate::config::AzureConfig;
use crate::context::ProviderContext;
use crate::cosmosdb::{self, CosmosDbAccountResource};
use crate::resource_group::{self, ResourceGroupResource};

/// Adapters addressable by a provider identifier (their ARM id)
pub(crate) trait AzureResource:
    FieldModel + ResourceAdapter<Context = ProviderContext> + Sized
{
    fn from_identifier(identifier: &str) -> Option<Self>;
    fn identifier(&self) -> Option<&str>;
}

impl AzureResource for CosmosDbAccountResource {
    fn from_identifier(identifier: &str) -> Option<Self> {
        CosmosDbAccountResource::from_identifier(identifier)
    }

    fn identifier(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

impl AzureResource for ResourceGroupResource {
    fn from_identifier(identifier: &str) -> Option<Self> {
        ResourceGroupResource::from_identifier(identifier)
    }

    fn identifier(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// Azure Provider
pub struct AzureProvider {
    ctx: ProviderContext,
}

impl AzureProvider {
    pub fn new(ctx: ProviderContext) -> Self {
        Self { ctx }
    }

    /// Provider talking to Resource Manager with the given configuration
    pub fn from_config(config: &AzureConfig) -> Self {
        log::debug!("Creating Azure provider: {:?}", config);
        Self::new(ProviderContext::from_config(config))
    }

    pub fn context(&self) -> &ProviderContext {
        &self.ctx
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    pub async fn read_resource(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> ProviderResult<State> {
        match id.resource_type.as_str() {
            cosmosdb::RESOURCE_TYPE => self.read_as::<CosmosDbAccountResource>(id, identifier).await,
            resource_group::RESOURCE_TYPE => {
                self.read_as::<ResourceGroupResource>(id, identifier).await
            }
            other => Err(unknown_type(id, other)),
        }
    }

    pub async fn create_resource(&self, resource: &Resource) -> ProviderResult<State> {
        match resource.id.resource_type.as_str() {
            cosmosdb::RESOURCE_TYPE => self.create_as::<CosmosDbAccountResource>(resource).await,
            resource_group::RESOURCE_TYPE => self.create_as::<ResourceGroupResource>(resource).await,
            other => Err(unknown_type(&resource.id, other)),
        }
    }

    pub async fn update_resource(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        match id.resource_type.as_str() {
            cosmosdb::RESOURCE_TYPE => {
                self.update_as::<CosmosDbAccountResource>(id, identifier, from, to)
                    .await
            }
            resource_group::RESOURCE_TYPE => {
                self.update_as::<ResourceGroupResource>(id, identifier, from, to)
                    .await
            }
            other => Err(unknown_type(id, other)),
        }
    }

    pub async fn delete_resource(&self, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
        match id.resource_type.as_str() {
            cosmosdb::RESOURCE_TYPE => {
                self.delete_as::<CosmosDbAccountResource>(id, identifier)
                    .await
            }
            resource_group::RESOURCE_TYPE => {
                self.delete_as::<ResourceGroupResource>(id, identifier)
                    .await
            }
            other => Err(unknown_type(id, other)),
        }
    }

    // =========================================================================
    // Generic lifecycle
    // =========================================================================

    async fn read_as<A: AzureResource>(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> ProviderResult<State> {
        let Some(identifier) = identifier else {
            return Ok(State::not_found(id.clone()));
        };
        let adapter = addressed::<A>(id, identifier)?;
        self.refreshed(id, adapter).await
    }

    async fn create_as<A: AzureResource>(&self, resource: &Resource) -> ProviderResult<State> {
        let id = &resource.id;
        let schema = A::schema();
        schema
            .check(&resource.attributes)
            .map_err(|e| ProviderError::from(e).for_resource(id.clone()))?;
        let mut adapter = A::from_attributes(&resource.attributes)
            .map_err(|e| ProviderError::from(e).for_resource(id.clone()))?;

        adapter
            .create(&self.ctx)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;

        let identifier = adapter.identifier().map(str::to_string).ok_or_else(|| {
            ProviderError::new("Provider did not return an identifier").for_resource(id.clone())
        })?;
        self.refreshed(id, addressed::<A>(id, &identifier)?).await
    }

    async fn update_as<A: AzureResource>(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        let schema = A::schema();
        let with_id = |e: ConfigurationError| ProviderError::from(e).for_resource(id.clone());

        schema.check(&to.attributes).map_err(with_id)?;
        let desired = A::from_attributes(&to.attributes).map_err(with_id)?;

        let mut current_attributes = from.attributes.clone();
        current_attributes.insert("id".to_string(), Value::String(identifier.to_string()));
        let current = A::from_attributes(&current_attributes).map_err(with_id)?;

        // Both sides go through the field model so selector spelling and
        // region formatting do not count as changes.
        let changed = differ::changed_attributes(
            &schema,
            &desired.to_attributes(),
            &current.to_attributes(),
        )
        .map_err(with_id)?;

        if !changed.is_empty() {
            desired
                .update(&self.ctx, &current, &changed)
                .await
                .map_err(|e| e.for_resource(id.clone()))?;
        }

        self.refreshed(id, addressed::<A>(id, identifier)?).await
    }

    async fn delete_as<A: AzureResource>(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<()> {
        addressed::<A>(id, identifier)?
            .delete(&self.ctx)
            .await
            .map_err(|e| e.for_resource(id.clone()))
    }

    /// Refresh an adapter into engine state
    async fn refreshed<A: AzureResource>(
        &self,
        id: &ResourceId,
        mut adapter: A,
    ) -> ProviderResult<State> {
        let found = adapter
            .refresh(&self.ctx)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
        if !found {
            return Ok(State::not_found(id.clone()));
        }

        let attributes = adapter.to_attributes();
        let state = State::existing(id.clone(), attributes);
        Ok(match adapter.identifier() {
            Some(identifier) => state.with_identifier(identifier),
            None => state,
        })
    }
}

fn addressed<A: AzureResource>(id: &ResourceId, identifier: &str) -> ProviderResult<A> {
    A::from_identifier(identifier).ok_or_else(|| {
        ProviderError::new(format!("Invalid identifier: {}", identifier)).for_resource(id.clone())
    })
}

fn unknown_type(id: &ResourceId, resource_type: &str) -> ProviderError {
    ProviderError::new(format!("Unknown resource type: {}", resource_type)).for_resource(id.clone())
}
