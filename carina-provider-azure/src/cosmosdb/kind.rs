//! Account kind and consistency level selectors
//!
//! Both are decoded from declaration strings (case-insensitive, optionally
//! prefixed like `azure.cosmosdb.Kind.Sql`) and map onto the request struct
//! through a fixed per-variant transformation.

use std::fmt;
use std::str::FromStr;

use carina_core::schema::ConfigurationError;

use crate::client::models::{Capability, ConsistencyPolicy, DatabaseAccount};

/// Strip a `Type.` style prefix from an enum selector
fn variant_part(s: &str) -> &str {
    s.split('.').next_back().unwrap_or(s)
}

/// Data model of a database account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseAccountKind {
    AzureTable,
    Cassandra,
    Gremlin,
    MongoDB,
    Sql,
}

impl DatabaseAccountKind {
    pub const ALL: [DatabaseAccountKind; 5] = [
        DatabaseAccountKind::AzureTable,
        DatabaseAccountKind::Cassandra,
        DatabaseAccountKind::Gremlin,
        DatabaseAccountKind::MongoDB,
        DatabaseAccountKind::Sql,
    ];

    pub const NAMES: [&'static str; 5] = ["AzureTable", "Cassandra", "Gremlin", "MongoDB", "Sql"];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseAccountKind::AzureTable => "AzureTable",
            DatabaseAccountKind::Cassandra => "Cassandra",
            DatabaseAccountKind::Gremlin => "Gremlin",
            DatabaseAccountKind::MongoDB => "MongoDB",
            DatabaseAccountKind::Sql => "Sql",
        }
    }

    /// Account kind and capability the service expects for this data model
    fn wire_form(&self) -> (&'static str, Option<&'static str>) {
        match self {
            DatabaseAccountKind::AzureTable => ("GlobalDocumentDB", Some("EnableTable")),
            DatabaseAccountKind::Cassandra => ("GlobalDocumentDB", Some("EnableCassandra")),
            DatabaseAccountKind::Gremlin => ("GlobalDocumentDB", Some("EnableGremlin")),
            DatabaseAccountKind::MongoDB => ("MongoDB", None),
            DatabaseAccountKind::Sql => ("GlobalDocumentDB", None),
        }
    }

    /// Set the account kind and data model capability on a request
    pub fn apply(&self, account: &mut DatabaseAccount) {
        let (kind, capability) = self.wire_form();
        account.kind = Some(kind.to_string());
        if let Some(name) = capability {
            account.properties.capabilities.push(Capability {
                name: name.to_string(),
            });
        }
    }

    /// Recover the data model from a provider object
    pub fn from_account(account: &DatabaseAccount) -> Option<Self> {
        let has = |name: &str| {
            account
                .properties
                .capabilities
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(name))
        };

        match account.kind.as_deref() {
            Some(k) if k.eq_ignore_ascii_case("MongoDB") => Some(DatabaseAccountKind::MongoDB),
            Some(k) if k.eq_ignore_ascii_case("GlobalDocumentDB") => {
                if has("EnableCassandra") {
                    Some(DatabaseAccountKind::Cassandra)
                } else if has("EnableGremlin") {
                    Some(DatabaseAccountKind::Gremlin)
                } else if has("EnableTable") {
                    Some(DatabaseAccountKind::AzureTable)
                } else {
                    Some(DatabaseAccountKind::Sql)
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for DatabaseAccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseAccountKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let variant = variant_part(s);
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(variant))
            .ok_or_else(|| ConfigurationError::invalid_value("kind", s, &Self::NAMES))
    }
}

/// Bounds of the bounded-staleness sub-fields
pub const MAX_STALENESS_PREFIX_RANGE: std::ops::RangeInclusive<i64> = 1..=2_147_483_647;
pub const MAX_INTERVAL_RANGE: std::ops::RangeInclusive<i64> = 5..=86_400;

/// Default consistency level of a database account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyLevel {
    BoundedStaleness,
    Eventual,
    Session,
    Strong,
}

impl ConsistencyLevel {
    pub const ALL: [ConsistencyLevel; 4] = [
        ConsistencyLevel::BoundedStaleness,
        ConsistencyLevel::Eventual,
        ConsistencyLevel::Session,
        ConsistencyLevel::Strong,
    ];

    pub const NAMES: [&'static str; 4] = ["BoundedStaleness", "Eventual", "Session", "Strong"];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsistencyLevel::BoundedStaleness => "BoundedStaleness",
            ConsistencyLevel::Eventual => "Eventual",
            ConsistencyLevel::Session => "Session",
            ConsistencyLevel::Strong => "Strong",
        }
    }

    /// Build the consistency policy for this level
    ///
    /// Bounded staleness needs both sub-fields, each within its range; the
    /// other levels ignore them.
    pub fn policy(
        &self,
        max_staleness_prefix: Option<i64>,
        max_interval: Option<i64>,
    ) -> Result<ConsistencyPolicy, ConfigurationError> {
        match self {
            ConsistencyLevel::BoundedStaleness => {
                let prefix = max_staleness_prefix
                    .ok_or_else(|| ConfigurationError::missing("max_staleness_prefix", &[]))?;
                let interval =
                    max_interval.ok_or_else(|| ConfigurationError::missing("max_interval", &[]))?;
                check_range("max_staleness_prefix", prefix, &MAX_STALENESS_PREFIX_RANGE)?;
                check_range("max_interval", interval, &MAX_INTERVAL_RANGE)?;

                Ok(ConsistencyPolicy {
                    default_consistency_level: self.as_str().to_string(),
                    max_staleness_prefix: Some(prefix),
                    max_interval_in_seconds: Some(interval),
                })
            }
            ConsistencyLevel::Eventual | ConsistencyLevel::Session | ConsistencyLevel::Strong => {
                Ok(ConsistencyPolicy {
                    default_consistency_level: self.as_str().to_string(),
                    max_staleness_prefix: None,
                    max_interval_in_seconds: None,
                })
            }
        }
    }

    /// Level reported by the service; `None` for levels this adapter does not model
    pub fn from_provider(level: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(level))
    }
}

fn check_range(
    field: &str,
    value: i64,
    range: &std::ops::RangeInclusive<i64>,
) -> Result<(), ConfigurationError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ConfigurationError::invalid(
            field,
            format!(
                "{} is out of range {}..={}",
                value,
                range.start(),
                range.end()
            ),
        ))
    }
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsistencyLevel {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let variant = variant_part(s);
        Self::ALL
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(variant))
            .ok_or_else(|| ConfigurationError::invalid_value("consistency_level", s, &Self::NAMES))
    }
}
