//! Queries over existing Cosmos DB database accounts

use async_trait::async_trait;
use carina_core::finder::{Filters, Finder};
use carina_core::provider::ProviderResult;

use super::account::{ARM_TYPE, CosmosDbAccountResource};
use crate::context::ProviderContext;
use crate::utils::ArmResourceId;

/// Finds database accounts by `id`, `resource_group`, or `name`
#[derive(Debug, Clone, Copy, Default)]
pub struct CosmosDbAccountFinder;

impl CosmosDbAccountFinder {
    pub const FILTER_KEYS: &'static [&'static str] = &["id", "resource_group", "name"];
}

#[async_trait]
impl Finder for CosmosDbAccountFinder {
    type Context = ProviderContext;
    type Item = CosmosDbAccountResource;

    fn filter_keys(&self) -> &'static [&'static str] {
        Self::FILTER_KEYS
    }

    async fn find_all(&self, ctx: &ProviderContext) -> ProviderResult<Vec<CosmosDbAccountResource>> {
        let accounts = ctx.client.list_database_accounts().await?;
        Ok(accounts
            .into_iter()
            .map(CosmosDbAccountResource::from_account)
            .collect())
    }

    async fn find(
        &self,
        ctx: &ProviderContext,
        filters: &Filters,
    ) -> ProviderResult<Vec<CosmosDbAccountResource>> {
        filters.check_keys(self.filter_keys())?;
        if filters.is_empty() {
            return self.find_all(ctx).await;
        }

        let accounts = match (filters.get("id"), filters.get("resource_group")) {
            (Some(id), _) => match ArmResourceId::parse(id) {
                Some(arm_id) if arm_id.is_type(ARM_TYPE) && ctx.owns(&arm_id) => ctx
                    .client
                    .get_database_account(&arm_id.resource_group, arm_id.name())
                    .await?
                    .into_iter()
                    .collect(),
                // Not an account id in this subscription, so nothing can match
                _ => Vec::new(),
            },
            (None, Some(resource_group)) => {
                ctx.client
                    .list_database_accounts_by_resource_group(resource_group)
                    .await?
            }
            (None, None) => ctx.client.list_database_accounts().await?,
        };

        log::debug!("Found {} account(s) for filters {:?}", accounts.len(), filters);
        Ok(accounts
            .into_iter()
            .map(CosmosDbAccountResource::from_account)
            .filter(|account| {
                filters
                    .get("name")
                    .is_none_or(|name| account.name.eq_ignore_ascii_case(name))
                    && filters
                        .get("resource_group")
                        .is_none_or(|group| account.resource_group.eq_ignore_ascii_case(group))
            })
            .collect())
    }
}
