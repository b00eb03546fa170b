//! Schema - Define type schemas for resources
//!
//! Providers define schemas for each resource type, enabling type validation
//! of declarations before any provider call is made. Each attribute also
//! carries a mutability tag that tells the differ and the adapters which
//! fields may be re-applied after creation.

use std::collections::HashMap;
use std::fmt;

use crate::resource::Value;

/// Attribute type
#[derive(Debug, Clone)]
pub enum AttributeType {
    /// String
    String,
    /// Integer
    Int,
    /// Boolean
    Bool,
    /// Enum (list of allowed values, matched case-insensitively)
    Enum(Vec<String>),
    /// Custom type (with validation function)
    Custom {
        name: String,
        base: Box<AttributeType>,
        validate: fn(&Value) -> Result<(), String>,
    },
    /// List
    List(Box<AttributeType>),
    /// Map
    Map(Box<AttributeType>),
}

impl AttributeType {
    /// Check if a value conforms to this type
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        match (self, value) {
            (AttributeType::String, Value::String(_)) => Ok(()),
            (AttributeType::Int, Value::Int(_)) => Ok(()),
            (AttributeType::Bool, Value::Bool(_)) => Ok(()),

            (AttributeType::Enum(variants), Value::String(s)) => {
                // Extract variant from "Type.variant" format
                let variant = s.split('.').next_back().unwrap_or(s);
                if variants.iter().any(|v| v.eq_ignore_ascii_case(variant)) {
                    Ok(())
                } else {
                    Err(TypeError::InvalidEnumVariant {
                        value: s.clone(),
                        expected: variants.clone(),
                    })
                }
            }

            (AttributeType::Custom { validate, base, .. }, v) => {
                base.validate(v)?;
                validate(v).map_err(|msg| TypeError::ValidationFailed { message: msg })
            }

            (AttributeType::List(inner), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.validate(item).map_err(|e| TypeError::ListItemError {
                        index: i,
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Map(inner), Value::Map(map)) => {
                for (k, v) in map {
                    inner.validate(v).map_err(|e| TypeError::MapValueError {
                        key: k.clone(),
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name(),
            }),
        }
    }

    /// Empty value used when a declaration omits a collection attribute
    pub fn empty_value(&self) -> Option<Value> {
        match self {
            AttributeType::List(_) => Some(Value::List(Vec::new())),
            AttributeType::Map(_) => Some(Value::Map(HashMap::new())),
            AttributeType::Custom { base, .. } => base.empty_value(),
            _ => None,
        }
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::Enum(variants) => format!("Enum({})", variants.join(" | ")),
            AttributeType::Custom { name, .. } => name.clone(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Map(inner) => format!("Map<{}>", inner.type_name()),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Type error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invalid enum variant '{value}', expected one of: {}", expected.join(", "))]
    InvalidEnumVariant {
        value: String,
        expected: Vec<String>,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Attribute '{name}' is assigned by the provider and cannot be set")]
    OutputAttribute { name: String },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Map value for key '{key}': {inner}")]
    MapValueError { key: String, inner: Box<TypeError> },

    #[error("Attribute '{name}': {inner}")]
    Attribute { name: String, inner: Box<TypeError> },
}

/// A declaration defect detected before any provider call
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("'{field}' is required{}", describe_expected(expected))]
    Missing { field: String, expected: Vec<String> },

    #[error("Invalid value '{value}' for '{field}'{}", describe_expected(expected))]
    InvalidValue {
        field: String,
        value: String,
        expected: Vec<String>,
    },

    #[error("'{field}' cannot be changed after creation")]
    Immutable { field: String },

    #[error("'{field}' is assigned by the provider and cannot be set")]
    ReadOnly { field: String },

    #[error("Invalid '{field}': {message}")]
    Invalid { field: String, message: String },
}

fn describe_expected(expected: &[String]) -> String {
    if expected.is_empty() {
        String::new()
    } else {
        format!(", expected one of: {}", expected.join(", "))
    }
}

impl ConfigurationError {
    pub fn missing(field: impl Into<String>, expected: &[&str]) -> Self {
        Self::Missing {
            field: field.into(),
            expected: expected.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn invalid_value(field: impl Into<String>, value: impl Into<String>, expected: &[&str]) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            expected: expected.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Name of the offending field
    pub fn field(&self) -> &str {
        match self {
            Self::Missing { field, .. }
            | Self::InvalidValue { field, .. }
            | Self::Immutable { field }
            | Self::ReadOnly { field }
            | Self::Invalid { field, .. } => field,
        }
    }

    /// Legal values for the field, empty when the defect is not an enumeration
    pub fn expected(&self) -> &[String] {
        match self {
            Self::Missing { expected, .. } | Self::InvalidValue { expected, .. } => expected,
            _ => &[],
        }
    }

    /// Map a schema validation error onto the field it was raised for
    pub fn from_type_error(field: &str, error: TypeError) -> Self {
        match error {
            TypeError::InvalidEnumVariant { value, expected } => Self::InvalidValue {
                field: field.to_string(),
                value,
                expected,
            },
            TypeError::MissingRequired { name } => Self::Missing {
                field: name,
                expected: Vec::new(),
            },
            TypeError::OutputAttribute { name } => Self::ReadOnly { field: name },
            TypeError::Attribute { name, inner } => Self::from_type_error(&name, *inner),
            other => Self::invalid(field, other.to_string()),
        }
    }
}

/// When an attribute may be written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mutability {
    /// Settable only at creation
    Immutable,
    /// May change after creation and is re-applied on update
    #[default]
    Updatable,
    /// Assigned by the provider, read-only to the configuration author
    Output,
}

/// Attribute schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
    pub mutability: Mutability,
    pub default: Option<Value>,
    pub description: Option<String>,
    /// Provider-side property name (e.g., "consistencyPolicy" for ARM)
    pub provider_name: Option<String>,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            mutability: Mutability::default(),
            default: None,
            description: None,
            provider_name: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn immutable(mut self) -> Self {
        self.mutability = Mutability::Immutable;
        self
    }

    pub fn output(mut self) -> Self {
        self.mutability = Mutability::Output;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = Some(name.into());
        self
    }
}

/// Resource schema
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub attributes: HashMap<String, AttributeSchema>,
    pub description: Option<String>,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: HashMap::new(),
            description: None,
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Mutability of an attribute, `None` for attributes outside the schema
    pub fn mutability(&self, name: &str) -> Option<Mutability> {
        self.attributes.get(name).map(|a| a.mutability)
    }

    /// Names of the attributes that may be re-applied after creation
    pub fn updatable_attributes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .attributes
            .values()
            .filter(|a| a.mutability == Mutability::Updatable)
            .map(|a| a.name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Validate declared attributes
    ///
    /// Output attributes are rejected because the author cannot set them.
    pub fn validate(&self, attributes: &HashMap<String, Value>) -> Result<(), Vec<TypeError>> {
        let mut errors = Vec::new();

        // Check required attributes
        for (name, schema) in &self.attributes {
            if schema.required && !attributes.contains_key(name) && schema.default.is_none() {
                errors.push(TypeError::MissingRequired { name: name.clone() });
            }
        }

        // Type check each attribute
        for (name, value) in attributes {
            let Some(schema) = self.attributes.get(name) else {
                // Unknown attributes are allowed (for flexibility)
                continue;
            };
            if schema.mutability == Mutability::Output {
                errors.push(TypeError::OutputAttribute { name: name.clone() });
            } else if let Err(e) = schema.attr_type.validate(value) {
                errors.push(TypeError::Attribute {
                    name: name.clone(),
                    inner: Box::new(e),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            errors.sort_by_key(|e| e.to_string());
            Err(errors)
        }
    }

    /// Validate declared attributes, reporting the first defect as a configuration error
    pub fn check(&self, attributes: &HashMap<String, Value>) -> Result<(), ConfigurationError> {
        match self.validate(attributes) {
            Ok(()) => Ok(()),
            Err(mut errors) => {
                let first = errors.remove(0);
                Err(ConfigurationError::from_type_error(&self.resource_type, first))
            }
        }
    }

    /// Fill absent attributes with their default, or an empty collection
    pub fn with_defaults(&self, attributes: &HashMap<String, Value>) -> HashMap<String, Value> {
        let mut filled = attributes.clone();
        for (name, schema) in &self.attributes {
            if filled.contains_key(name) || schema.mutability == Mutability::Output {
                continue;
            }
            if let Some(value) = schema
                .default
                .clone()
                .or_else(|| schema.attr_type.empty_value())
            {
                filled.insert(name.clone(), value);
            }
        }
        filled
    }
}

/// Helper functions for common types
pub mod types {
    use super::*;

    /// List of strings
    pub fn string_list() -> AttributeType {
        AttributeType::List(Box::new(AttributeType::String))
    }

    /// Map of strings (tags)
    pub fn string_map() -> AttributeType {
        AttributeType::Map(Box::new(AttributeType::String))
    }
}
