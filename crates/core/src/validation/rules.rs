//! Validation rule and error types.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Expected shape of a field's value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Email,
    Phone,
    Date,
    Number,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Date => "date",
            Self::Number => "number",
        }
    }
}

/// Caller-supplied predicate run against a non-empty field value.
///
/// Returns `Ok(())` when the value is acceptable, or the error message to
/// record otherwise.
#[derive(Clone)]
pub struct CustomCheck(Arc<dyn Fn(&str) -> Result<(), String> + Send + Sync>);

impl CustomCheck {
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(&str) -> Result<(), String> + Send + Sync + 'static,
    {
        Self(Arc::new(check))
    }

    pub fn check(&self, value: &str) -> Result<(), String> {
        (self.0)(value)
    }
}

impl fmt::Debug for CustomCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomCheck(..)")
    }
}

/// Constraints attached to one logical field.
///
/// Every applicable constraint is evaluated; a field may produce several
/// errors for the same row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationRule {
    /// Empty or whitespace-only values fail.
    pub required: bool,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Minimum length in characters.
    pub min_length: Option<usize>,
    /// Maximum length in characters.
    pub max_length: Option<usize>,
    /// User-supplied regular expression the whole value must match.
    pub pattern: Option<String>,
    /// Optional predicate; not serializable.
    #[serde(skip)]
    pub custom: Option<CustomCheck>,
}

impl ValidationRule {
    pub fn required() -> Self {
        Self {
            required: true,
            ..Default::default()
        }
    }

    pub fn of_type(field_type: FieldType) -> Self {
        Self {
            field_type,
            ..Default::default()
        }
    }

    pub fn with_custom<F>(mut self, check: F) -> Self
    where
        F: Fn(&str) -> Result<(), String> + Send + Sync + 'static,
    {
        self.custom = Some(CustomCheck::new(check));
        self
    }
}

/// Rules keyed by logical field name. Ordered so evaluation output is
/// deterministic.
pub type ValidationRules = BTreeMap<String, ValidationRule>;

/// A row- or job-scoped problem recorded during an import.
///
/// Row numbers are 1-based; row `0` denotes a general (not row-scoped)
/// error such as a preparation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportError {
    pub row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ImportError {
    /// A job-level error not tied to any row.
    pub fn general(message: impl Into<String>) -> Self {
        Self {
            row: 0,
            field: None,
            message: message.into(),
            value: None,
        }
    }

    /// An error scoped to one row but no particular field.
    pub fn row(row: usize, message: impl Into<String>) -> Self {
        Self {
            row,
            field: None,
            message: message.into(),
            value: None,
        }
    }

    /// An error scoped to one field of one row.
    pub fn field(
        row: usize,
        field: impl Into<String>,
        message: impl Into<String>,
        value: Option<&str>,
    ) -> Self {
        Self {
            row,
            field: Some(field.into()),
            message: message.into(),
            value: value.map(str::to_string),
        }
    }

    pub fn is_general(&self) -> bool {
        self.row == 0
    }
}
