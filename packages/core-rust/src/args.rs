//! Validated parameter record driving one service operation.
//!
//! A parameter record is a flat JSON object fetched from the parameter store.
//! Two members are interpreted by the wrapper itself (`operationType` and
//! `validate`); every other member is a domain key handed to the service
//! handler and its templates.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::Value;

/// Raw record as stored in the parameter store.
pub type ParamRecord = serde_json::Map<String, serde_json::Value>;

/// Separator between service name and operation id in parameter store keys.
pub const KEY_SEPARATOR: &str = "-";

/// Domain keys must not start with this prefix; it is reserved for wrapper internals.
pub const RESERVED_PREFIX: &str = "_";

/// Record member holding the operation type.
pub const OPERATION_TYPE_FIELD: &str = "operationType";

/// Record member holding the dry-run flag.
pub const VALIDATE_FIELD: &str = "validate";

/// Builds the parameter store key for a service invocation.
#[must_use]
pub fn parameter_key(service_name: &str, operation_id: &str) -> String {
    format!("{service_name}{KEY_SEPARATOR}{operation_id}")
}

// ---------------------------------------------------------------------------
// OperationType
// ---------------------------------------------------------------------------

/// Lifecycle operation requested for a service instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Create,
    Modify,
    Delete,
}

impl OperationType {
    /// Lowercase wire name, also used as the template name suffix.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Modify => "modify",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = ArgsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "modify" => Ok(Self::Modify),
            "delete" => Ok(Self::Delete),
            other => Err(ArgsError::InvalidOperationType {
                value: other.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// ArgsError
// ---------------------------------------------------------------------------

/// Validation failures when turning a parameter record into `ServiceArguments`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArgsError {
    #[error("missing mandatory field: {field}")]
    MissingField { field: &'static str },
    #[error("invalid operation type: {value}")]
    InvalidOperationType { value: String },
    #[error("parameter name uses reserved prefix '_': {key}")]
    ReservedKeyConflict { key: String },
    #[error("parameter {key} must be a string, number, boolean or null")]
    NonScalarValue { key: String },
    #[error("invalid validate flag: {value}")]
    InvalidValidateFlag { value: String },
}

// ---------------------------------------------------------------------------
// ServiceArguments
// ---------------------------------------------------------------------------

/// Immutable, validated parameters for a single service operation invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceArguments {
    service_name: String,
    operation_id: String,
    operation_type: OperationType,
    validate_only: bool,
    domain: BTreeMap<String, Value>,
}

impl ServiceArguments {
    /// Validates a raw parameter record.
    ///
    /// # Errors
    ///
    /// - `ReservedKeyConflict` if any member name starts with `_`
    /// - `MissingField` if `operationType` is absent (or null)
    /// - `InvalidOperationType` if it is not `create`, `modify` or `delete`
    /// - `InvalidValidateFlag` if `validate` is not a boolean or `"true"`/`"false"`
    /// - `NonScalarValue` if a domain member is an array or object
    pub fn from_record(
        service_name: impl Into<String>,
        operation_id: impl Into<String>,
        record: &ParamRecord,
    ) -> Result<Self, ArgsError> {
        if let Some(key) = record.keys().find(|k| k.starts_with(RESERVED_PREFIX)) {
            return Err(ArgsError::ReservedKeyConflict { key: key.clone() });
        }

        let operation_type = match record.get(OPERATION_TYPE_FIELD) {
            None | Some(serde_json::Value::Null) => {
                return Err(ArgsError::MissingField {
                    field: OPERATION_TYPE_FIELD,
                })
            }
            Some(serde_json::Value::String(s)) => s.parse::<OperationType>()?,
            Some(other) => {
                return Err(ArgsError::InvalidOperationType {
                    value: other.to_string(),
                })
            }
        };

        let validate_only = parse_validate_flag(record.get(VALIDATE_FIELD))?;

        let mut domain = BTreeMap::new();
        for (key, raw) in record {
            if key == OPERATION_TYPE_FIELD || key == VALIDATE_FIELD {
                continue;
            }
            let value =
                Value::from_json(raw).ok_or_else(|| ArgsError::NonScalarValue { key: key.clone() })?;
            domain.insert(key.clone(), value);
        }

        Ok(Self {
            service_name: service_name.into(),
            operation_id: operation_id.into(),
            operation_type,
            validate_only,
            domain,
        })
    }

    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    #[must_use]
    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    #[must_use]
    pub fn operation_type(&self) -> OperationType {
        self.operation_type
    }

    /// Whether the operation should only be dry-run.
    #[must_use]
    pub fn validate_only(&self) -> bool {
        self.validate_only
    }

    /// Looks up a domain key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.domain.get(key)
    }

    /// Looks up a domain key that must be present and non-null.
    ///
    /// # Errors
    ///
    /// Returns `MissingField` naming the key when it is absent or null.
    pub fn require(&self, key: &'static str) -> Result<&Value, ArgsError> {
        match self.domain.get(key) {
            Some(v) if !v.is_null() => Ok(v),
            _ => Err(ArgsError::MissingField { field: key }),
        }
    }

    /// All domain keys in sorted order.
    #[must_use]
    pub fn domain(&self) -> &BTreeMap<String, Value> {
        &self.domain
    }

    /// Parameter store key this record was (or would be) loaded from.
    #[must_use]
    pub fn key(&self) -> String {
        parameter_key(&self.service_name, &self.operation_id)
    }
}

fn parse_validate_flag(raw: Option<&serde_json::Value>) -> Result<bool, ArgsError> {
    match raw {
        None | Some(serde_json::Value::Null) => Ok(false),
        Some(serde_json::Value::Bool(b)) => Ok(*b),
        Some(serde_json::Value::String(s)) if s.eq_ignore_ascii_case("true") => Ok(true),
        Some(serde_json::Value::String(s)) if s.eq_ignore_ascii_case("false") => Ok(false),
        Some(other) => {
            tracing::debug!(value = %other, "rejecting validate flag");
            Err(ArgsError::InvalidValidateFlag {
                value: other.to_string(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
