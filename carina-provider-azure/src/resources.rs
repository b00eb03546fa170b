//! Resource type definitions
//!
//! Each type's schema comes from the field model of its adapter.

use carina_core::adapter::FieldModel;
use carina_core::provider::ResourceType;
use carina_core::schema::ResourceSchema;

use crate::cosmosdb::{self, CosmosDbAccountResource};
use crate::resource_group::{self, ResourceGroupResource};

macro_rules! define_resource_type {
    ($name:ident, $type_name:expr, $model:ty) => {
        pub struct $name;
        impl ResourceType for $name {
            fn name(&self) -> &'static str {
                $type_name
            }
            fn schema(&self) -> ResourceSchema {
                <$model as FieldModel>::schema()
            }
        }
    };
}

define_resource_type!(
    CosmosDbAccountType,
    cosmosdb::RESOURCE_TYPE,
    CosmosDbAccountResource
);
define_resource_type!(
    ResourceGroupType,
    resource_group::RESOURCE_TYPE,
    ResourceGroupResource
);

/// Returns all resource types supported by this provider
pub fn resource_types() -> Vec<Box<dyn ResourceType>> {
    vec![Box::new(CosmosDbAccountType), Box::new(ResourceGroupType)]
}

/// Schema of a resource type by name
pub fn get_schema(resource_type: &str) -> Option<ResourceSchema> {
    resource_types()
        .into_iter()
        .find(|t| t.name() == resource_type)
        .map(|t| t.schema())
}
