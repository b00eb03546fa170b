//! Differ - Compare desired state with current state
//!
//! Compares the "desired state" declared in DSL with the "current state"
//! refreshed from the Provider, and decides whether the resource must be
//! created, updated, or left alone. Only updatable attributes may differ on an
//! existing resource; a change to an immutable attribute is a configuration
//! error reported before the provider is called.

use std::collections::HashMap;

use crate::resource::{Resource, ResourceId, State, Value};
use crate::schema::{ConfigurationError, Mutability, ResourceSchema};

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences -> needs update
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare desired state with current state to compute a Diff
pub fn diff(
    schema: &ResourceSchema,
    desired: &Resource,
    current: &State,
) -> Result<Diff, ConfigurationError> {
    if !current.exists {
        return Ok(Diff::Create(desired.clone()));
    }

    let changed = changed_attributes(schema, &desired.attributes, &current.attributes)?;

    if changed.is_empty() {
        Ok(Diff::NoChange(desired.id.clone()))
    } else {
        Ok(Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        })
    }
}

/// Find changed attributes between desired and current state
///
/// Absent desired attributes take their schema default first, so an omitted
/// collection compares equal to an empty one. Output attributes are never
/// compared. The result is sorted by name.
pub fn changed_attributes(
    schema: &ResourceSchema,
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
) -> Result<Vec<String>, ConfigurationError> {
    let desired = schema.with_defaults(desired);
    let mut changed = Vec::new();

    for (key, desired_value) in &desired {
        // Skip internal attributes (starting with _)
        if key.starts_with('_') {
            continue;
        }

        let mutability = schema.mutability(key).unwrap_or_default();
        if mutability == Mutability::Output {
            continue;
        }

        match current.get(key) {
            Some(current_value) if current_value == desired_value => {}
            _ if mutability == Mutability::Immutable => {
                return Err(ConfigurationError::Immutable { field: key.clone() });
            }
            _ => changed.push(key.clone()),
        }
    }

    changed.sort();
    Ok(changed)
}
