//! Adapter - The CRUD lifecycle unit behind a declared resource
//!
//! A resource adapter owns the typed fields of one declaration and maps them
//! onto provider calls. The engine drives it through
//! `refresh` / `create` / `update` / `delete`; the provider context (client
//! handle, region, ...) is passed into every operation rather than held in a
//! shared base.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::provider::ProviderResult;
use crate::resource::Value;
use crate::schema::{ConfigurationError, ResourceSchema};

/// Conversion between typed adapter fields and the engine's attribute map
pub trait FieldModel: Sized {
    /// Schema describing every field and its mutability
    fn schema() -> ResourceSchema;

    /// Build from declared (or stored) attributes
    ///
    /// Absent collections decode to empty values; selector strings are
    /// decoded into closed enums here, so unknown values fail at this
    /// boundary.
    fn from_attributes(attributes: &HashMap<String, Value>) -> Result<Self, ConfigurationError>;

    /// Current field values, including provider-assigned outputs
    fn to_attributes(&self) -> HashMap<String, Value>;
}

/// Lifecycle contract of a resource adapter
#[async_trait]
pub trait ResourceAdapter: Send + Sync {
    /// Provider context handed to each operation
    type Context: Send + Sync;

    /// Human-readable label for diagnostics
    fn display_name(&self) -> String;

    /// Hydrate every field from the provider object
    ///
    /// Returns `false`, leaving fields untouched, when the object is gone.
    async fn refresh(&mut self, ctx: &Self::Context) -> ProviderResult<bool>;

    /// Create the provider object and record its identifier
    async fn create(&mut self, ctx: &Self::Context) -> ProviderResult<()>;

    /// Re-apply updatable fields, given the last refreshed snapshot
    async fn update(
        &self,
        ctx: &Self::Context,
        current: &Self,
        changed_fields: &[String],
    ) -> ProviderResult<()>;

    /// Delete the provider object; an object that is already gone is not an error
    async fn delete(&self, ctx: &Self::Context) -> ProviderResult<()>;
}

/// Field decoding helpers shared by adapters
pub mod fields {
    use super::*;

    fn type_error(field: &str, expected: &str, got: &Value) -> ConfigurationError {
        ConfigurationError::invalid(
            field,
            format!("expected {}, got {}", expected, got.type_name()),
        )
    }

    /// Optional string; empty strings decode as absent
    pub fn optional_string(
        attributes: &HashMap<String, Value>,
        field: &str,
    ) -> Result<Option<String>, ConfigurationError> {
        match attributes.get(field) {
            None => Ok(None),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(type_error(field, "String", other)),
        }
    }

    /// String that must be present and non-empty
    pub fn required_string(
        attributes: &HashMap<String, Value>,
        field: &str,
    ) -> Result<String, ConfigurationError> {
        optional_string(attributes, field)?.ok_or_else(|| ConfigurationError::missing(field, &[]))
    }

    pub fn optional_int(
        attributes: &HashMap<String, Value>,
        field: &str,
    ) -> Result<Option<i64>, ConfigurationError> {
        match attributes.get(field) {
            None => Ok(None),
            Some(Value::Int(i)) => Ok(Some(*i)),
            Some(other) => Err(type_error(field, "Int", other)),
        }
    }

    pub fn optional_bool(
        attributes: &HashMap<String, Value>,
        field: &str,
    ) -> Result<Option<bool>, ConfigurationError> {
        match attributes.get(field) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(type_error(field, "Bool", other)),
        }
    }

    /// List of strings, empty when absent
    pub fn string_list(
        attributes: &HashMap<String, Value>,
        field: &str,
    ) -> Result<Vec<String>, ConfigurationError> {
        match attributes.get(field) {
            None => Ok(Vec::new()),
            Some(Value::List(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(type_error(field, "List<String>", other)),
                })
                .collect(),
            Some(other) => Err(type_error(field, "List<String>", other)),
        }
    }

    /// Map of strings, empty when absent
    pub fn string_map(
        attributes: &HashMap<String, Value>,
        field: &str,
    ) -> Result<HashMap<String, String>, ConfigurationError> {
        match attributes.get(field) {
            None => Ok(HashMap::new()),
            Some(Value::Map(entries)) => entries
                .iter()
                .map(|(k, v)| match v {
                    Value::String(s) => Ok((k.clone(), s.clone())),
                    other => Err(type_error(field, "Map<String>", other)),
                })
                .collect(),
            Some(other) => Err(type_error(field, "Map<String>", other)),
        }
    }

    /// Insert a string only when it is set
    pub fn put_string(attributes: &mut HashMap<String, Value>, field: &str, value: Option<&str>) {
        if let Some(v) = value {
            attributes.insert(field.to_string(), Value::String(v.to_string()));
        }
    }

    pub fn put_int(attributes: &mut HashMap<String, Value>, field: &str, value: Option<i64>) {
        if let Some(v) = value {
            attributes.insert(field.to_string(), Value::Int(v));
        }
    }
}
