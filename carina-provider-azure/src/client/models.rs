//! Resource Manager wire models
//!
//! Only the properties the adapters read or write are modeled; everything
//! else the service returns is ignored on deserialization.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// =============================================================================
// Cosmos DB database accounts
// =============================================================================

/// A Cosmos DB database account (`Microsoft.DocumentDB/databaseAccounts`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseAccount {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub location: String,
    /// "GlobalDocumentDB" or "MongoDB"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default)]
    pub properties: DatabaseAccountProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseAccountProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_account_offer_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consistency_policy: Option<ConsistencyPolicy>,
    #[serde(default)]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    #[serde(default)]
    pub ip_rules: Vec<IpAddressOrRange>,
    #[serde(default)]
    pub is_virtual_network_filter_enabled: bool,
    #[serde(default)]
    pub virtual_network_rules: Vec<VirtualNetworkRule>,
    #[serde(default)]
    pub enable_automatic_failover: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyPolicy {
    pub default_consistency_level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_staleness_prefix: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_interval_in_seconds: Option<i64>,
}

/// A replication region of an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub location_name: String,
    pub failover_priority: i32,
    #[serde(default)]
    pub is_zone_redundant: bool,
}

impl Location {
    pub fn new(location_name: impl Into<String>, failover_priority: i32) -> Self {
        Self {
            location_name: location_name.into(),
            failover_priority,
            is_zone_redundant: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpAddressOrRange {
    pub ip_address_or_range: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNetworkRule {
    /// Subnet resource id
    pub id: String,
    #[serde(default)]
    pub ignore_missing_v_net_service_endpoint: bool,
}

/// PATCH body for an account; unset fields are left unchanged by the service
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseAccountUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, String>>,
    pub properties: DatabaseAccountUpdateProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseAccountUpdateProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistency_policy: Option<ConsistencyPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<Location>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_rules: Option<Vec<IpAddressOrRange>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_virtual_network_filter_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_network_rules: Option<Vec<VirtualNetworkRule>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_automatic_failover: Option<bool>,
}

/// Entry of a `failoverPriorityChange` request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailoverPolicy {
    pub location_name: String,
    pub failover_priority: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailoverPolicies {
    pub failover_policies: Vec<FailoverPolicy>,
}

// =============================================================================
// Resource groups
// =============================================================================

/// A resource group (`Microsoft.Resources/resourceGroups`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<ResourceGroupProperties>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroupProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResourceGroupUpdate {
    pub tags: HashMap<String, String>,
}

// =============================================================================
// Envelopes
// =============================================================================

/// Paged list response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(default)]
    pub next_link: Option<String>,
}

/// Error body: `{"error": {"code": "...", "message": "..."}}`
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Body of an `Azure-AsyncOperation` status poll
#[derive(Debug, Clone, Deserialize)]
pub struct OperationStatus {
    pub status: String,
    #[serde(default)]
    pub error: Option<ErrorDetail>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn account_deserializes_from_arm_json() {
        let body = json!({
            "id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.DocumentDB/databaseAccounts/orders",
            "name": "orders",
            "location": "East US",
            "kind": "GlobalDocumentDB",
            "tags": {"env": "prod"},
            "properties": {
                "provisioningState": "Succeeded",
                "documentEndpoint": "https://orders.documents.azure.com:443/",
                "consistencyPolicy": {
                    "defaultConsistencyLevel": "BoundedStaleness",
                    "maxStalenessPrefix": 100,
                    "maxIntervalInSeconds": 5
                },
                "locations": [
                    {"locationName": "West US", "failoverPriority": 1, "isZoneRedundant": false},
                    {"locationName": "East US", "failoverPriority": 0}
                ],
                "capabilities": [{"name": "EnableCassandra"}],
                "ipRules": [{"ipAddressOrRange": "10.0.0.0/24"}],
                "unmodeled": true
            }
        });

        let account: DatabaseAccount = serde_json::from_value(body).unwrap();
        assert_eq!(account.name.as_deref(), Some("orders"));
        assert_eq!(account.properties.locations.len(), 2);
        assert_eq!(account.properties.capabilities[0].name, "EnableCassandra");
        assert_eq!(
            account.properties.consistency_policy.unwrap().max_staleness_prefix,
            Some(100)
        );
        assert!(!account.properties.is_virtual_network_filter_enabled);
    }

    #[test]
    fn update_omits_unset_properties() {
        let update = DatabaseAccountUpdate {
            tags: None,
            properties: DatabaseAccountUpdateProperties {
                locations: Some(vec![Location::new("eastus", 0)]),
                ..Default::default()
            },
        };
        let body = serde_json::to_value(&update).unwrap();
        assert_eq!(
            body,
            json!({
                "properties": {
                    "locations": [
                        {"locationName": "eastus", "failoverPriority": 0, "isZoneRedundant": false}
                    ]
                }
            })
        );
    }

    #[test]
    fn failover_policies_serialize_camel_case() {
        let body = serde_json::to_value(FailoverPolicies {
            failover_policies: vec![FailoverPolicy {
                location_name: "eastus".to_string(),
                failover_priority: 0,
            }],
        })
        .unwrap();
        assert_eq!(
            body,
            json!({"failoverPolicies": [{"locationName": "eastus", "failoverPriority": 0}]})
        );
    }
}
