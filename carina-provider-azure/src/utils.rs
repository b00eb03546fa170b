//! Utility functions for value normalization and ARM resource ids

/// Normalize a region name to its ARM programmatic form
///
/// - "East US 2" -> "eastus2"
/// - "azure.Region.west_europe" -> "westeurope"
/// - "eastus" -> "eastus"
pub fn normalize_region(s: &str) -> String {
    let region_part = if s.contains('.') {
        s.split('.').next_back().unwrap_or(s)
    } else {
        s
    };
    region_part
        .chars()
        .filter(|c| !matches!(*c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Components of an ARM resource id
///
/// `/subscriptions/{sub}/resourceGroups/{group}[/providers/{namespace}/{type}/{name}]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmResourceId {
    pub subscription_id: String,
    pub resource_group: String,
    /// `(namespace/type, name)` of the addressed resource; `None` for the group itself
    pub resource: Option<(String, String)>,
}

impl ArmResourceId {
    /// Parse an ARM id; segment keys are matched case-insensitively
    pub fn parse(id: &str) -> Option<Self> {
        let segments: Vec<&str> = id.trim_matches('/').split('/').collect();
        match segments.as_slice() {
            [subs, sub, groups, group] => {
                if subs.eq_ignore_ascii_case("subscriptions")
                    && groups.eq_ignore_ascii_case("resourcegroups")
                    && !sub.is_empty()
                    && !group.is_empty()
                {
                    Some(Self {
                        subscription_id: sub.to_string(),
                        resource_group: group.to_string(),
                        resource: None,
                    })
                } else {
                    None
                }
            }
            [subs, sub, groups, group, providers, namespace, kind, name] => {
                if subs.eq_ignore_ascii_case("subscriptions")
                    && groups.eq_ignore_ascii_case("resourcegroups")
                    && providers.eq_ignore_ascii_case("providers")
                    && !name.is_empty()
                {
                    Some(Self {
                        subscription_id: sub.to_string(),
                        resource_group: group.to_string(),
                        resource: Some((format!("{}/{}", namespace, kind), name.to_string())),
                    })
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Name of the addressed resource (the group name for a group id)
    pub fn name(&self) -> &str {
        match &self.resource {
            Some((_, name)) => name,
            None => &self.resource_group,
        }
    }

    /// Whether the id addresses a resource of the given `namespace/type`
    pub fn is_type(&self, type_name: &str) -> bool {
        matches!(&self.resource, Some((t, _)) if t.eq_ignore_ascii_case(type_name))
    }
}
