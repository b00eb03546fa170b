//! Finder - Read-only queries of existing provider objects
//!
//! Finders back query expressions in configuration: they list provider
//! objects, optionally narrowed by a filter map, and never mutate anything.

use async_trait::async_trait;

use crate::provider::ProviderResult;
use crate::schema::ConfigurationError;

/// Ordered key/value pairs narrowing a finder query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    entries: Vec<(String, String)>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter; a later value for the same key replaces the earlier one
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Reject keys the finder does not understand
    pub fn check_keys(&self, allowed: &[&str]) -> Result<(), ConfigurationError> {
        for (key, _) in self.iter() {
            if !allowed.contains(&key) {
                return Err(ConfigurationError::invalid_value("filter", key, allowed));
            }
        }
        Ok(())
    }
}

impl<K, V> FromIterator<(K, V)> for Filters
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Filters::new(), |filters, (k, v)| filters.with(k, v))
    }
}

/// Query adapter for one provider object type
#[async_trait]
pub trait Finder: Send + Sync {
    /// Provider context handed to each query
    type Context: Send + Sync;
    /// Record returned for each matching provider object
    type Item: Send;

    /// Filter keys this finder accepts
    fn filter_keys(&self) -> &'static [&'static str];

    /// Every object visible to the context
    async fn find_all(&self, ctx: &Self::Context) -> ProviderResult<Vec<Self::Item>>;

    /// Objects matching all filters; an empty result is not an error
    ///
    /// No filters means list-all.
    async fn find(&self, ctx: &Self::Context, filters: &Filters) -> ProviderResult<Vec<Self::Item>>;
}
