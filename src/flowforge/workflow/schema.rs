// SPDX-License-Identifier: MIT

//! Node config checks against a component's `configSchema`

use serde_json::{Map, Value};
use std::fmt;

use crate::cdk::component::{ConfigSchema, FieldType};

/// A single finding from checking a config map
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigIssue {
    /// Required field absent or null
    MissingRequired { field: String },
    /// Value has a different primitive type than declared
    WrongType {
        field: String,
        expected: FieldType,
        actual: &'static str,
    },
    /// Numeric value outside `[min, max]`
    OutOfRange {
        field: String,
        value: f64,
        min: Option<f64>,
        max: Option<f64>,
    },
    /// Value not in the declared `enum`
    NotAllowed { field: String, value: Value },
    /// Field not declared by the schema
    UnknownField { field: String },
}

impl ConfigIssue {
    /// Only missing required fields make a config unusable
    pub fn is_error(&self) -> bool {
        matches!(self, ConfigIssue::MissingRequired { .. })
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRequired { field } => {
                write!(f, "missing required config field '{}'", field)
            }
            Self::WrongType {
                field,
                expected,
                actual,
            } => write!(
                f,
                "config field '{}' should be {} but is {}",
                field,
                expected.as_str(),
                actual
            ),
            Self::OutOfRange {
                field,
                value,
                min,
                max,
            } => {
                let lo = min.map_or_else(|| "-inf".to_string(), |m| m.to_string());
                let hi = max.map_or_else(|| "inf".to_string(), |m| m.to_string());
                write!(
                    f,
                    "config field '{}' value {} is outside [{}, {}]",
                    field, value, lo, hi
                )
            }
            Self::NotAllowed { field, value } => {
                write!(
                    f,
                    "config field '{}' value {} is not an allowed option",
                    field, value
                )
            }
            Self::UnknownField { field } => write!(f, "unknown config field '{}'", field),
        }
    }
}

/// JSON type name of a value
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Check a node config against a component schema.
///
/// An empty schema (no required fields, no properties) accepts anything.
pub fn check_config(config: &Map<String, Value>, schema: &ConfigSchema) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();

    for field in &schema.required {
        if config.get(field).map_or(true, Value::is_null) {
            issues.push(ConfigIssue::MissingRequired {
                field: field.clone(),
            });
        }
    }

    if schema.properties.is_empty() && schema.required.is_empty() {
        return issues;
    }

    for (field, value) in config {
        let Some(def) = schema.properties.get(field) else {
            if !schema.required.contains(field) {
                issues.push(ConfigIssue::UnknownField {
                    field: field.clone(),
                });
            }
            continue;
        };

        if value.is_null() {
            continue;
        }

        if let Some(expected) = def.field_type {
            if !expected.matches(value) {
                issues.push(ConfigIssue::WrongType {
                    field: field.clone(),
                    expected,
                    actual: json_type_name(value),
                });
                continue;
            }
        }

        if let Some(n) = value.as_f64() {
            let below = def.min.is_some_and(|min| n < min);
            let above = def.max.is_some_and(|max| n > max);
            if below || above {
                issues.push(ConfigIssue::OutOfRange {
                    field: field.clone(),
                    value: n,
                    min: def.min,
                    max: def.max,
                });
            }
        }

        if let Some(allowed) = &def.allowed {
            if !allowed.contains(value) {
                issues.push(ConfigIssue::NotAllowed {
                    field: field.clone(),
                    value: value.clone(),
                });
            }
        }
    }

    issues
}
