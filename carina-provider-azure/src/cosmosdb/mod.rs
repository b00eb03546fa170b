//! Cosmos DB database accounts

mod account;
mod finder;
pub mod kind;
pub mod regions;

pub use account::{ARM_TYPE, CosmosDbAccountResource, RESOURCE_TYPE, validate_account_name};
pub use finder::CosmosDbAccountFinder;
pub use kind::{ConsistencyLevel, DatabaseAccountKind};
pub use regions::{RegionDelta, reconcile_regions};
