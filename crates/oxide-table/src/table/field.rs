//! Field declarations.

use oxide_query::{ToValue, Value};
use serde::{Deserialize, Serialize};

use super::check::Check;
use super::filter::Filter;

/// Storage type of a declared field; decides its coercion filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Text.
    String,
    /// Boolean, stored as 0/1.
    Boolean,
    /// Floating point.
    Real,
    /// Integer.
    Integer,
    /// Time of day, passed through unchanged.
    Time,
    /// `YYYY-MM-DD`.
    Date,
    /// `YYYY-MM-DD HH:MM:SS`.
    Datetime,
    /// Anything else; no coercion.
    Custom,
}

impl FieldType {
    /// Infers the type from a default value.
    #[must_use]
    pub const fn infer(default: &Value) -> Self {
        match default {
            Value::Text(_) => Self::String,
            Value::Bool(_) => Self::Boolean,
            Value::Float(_) => Self::Real,
            Value::Int(_) => Self::Integer,
            Value::Null | Value::Blob(_) => Self::Custom,
        }
    }

    /// Returns the filter that coerces values to this type.
    #[must_use]
    pub const fn coercion(self) -> Option<Filter> {
        match self {
            Self::String => Some(Filter::ToString),
            Self::Boolean => Some(Filter::ToBoolean),
            Self::Real => Some(Filter::ToReal),
            Self::Integer => Some(Filter::ToInteger),
            Self::Time => Some(Filter::ToTime),
            Self::Date => Some(Filter::ToDate),
            Self::Datetime => Some(Filter::ToDatetime),
            Self::Custom => None,
        }
    }

    /// Returns the lowercase type name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Real => "real",
            Self::Integer => "integer",
            Self::Time => "time",
            Self::Date => "date",
            Self::Datetime => "datetime",
            Self::Custom => "custom",
        }
    }
}

/// A field declaration for [`TableBuilder::define_field`](super::TableBuilder::define_field).
///
/// ```rust
/// use oxide_table::{Check, FieldDef, FieldType, Filter};
///
/// let email = FieldDef::new("email", "")
///     .filter(Filter::ToLowercase)
///     .check(Check::NotEmpty)
///     .check(Check::Unique);
/// let born = FieldDef::new("born", "").as_type(FieldType::Date);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub(crate) name: String,
    pub(crate) default: Value,
    pub(crate) field_type: FieldType,
    pub(crate) filters: Vec<Filter>,
    pub(crate) checks: Vec<Check>,
}

impl FieldDef {
    /// Declares a field; its type is inferred from `default`.
    #[must_use]
    pub fn new(name: impl Into<String>, default: impl ToValue) -> Self {
        let default = default.to_value();
        Self {
            name: name.into(),
            field_type: FieldType::infer(&default),
            default,
            filters: Vec::new(),
            checks: Vec::new(),
        }
    }

    /// Overrides the inferred type.
    #[must_use]
    pub const fn as_type(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }

    /// Adds a filter, run after the type's coercion.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Adds a check on this field.
    #[must_use]
    pub fn check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }
}

/// A field as stored in a built table.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    /// The field's type.
    pub field_type: FieldType,
    /// The value of the field in a blank record.
    pub default: Value,
    /// Filters in application order, coercion first.
    pub filters: Vec<Filter>,
}

impl FieldSpec {
    pub(crate) fn from_def(def: &FieldDef) -> Self {
        let filters = def
            .field_type
            .coercion()
            .into_iter()
            .chain(def.filters.iter().cloned())
            .collect();
        Self {
            field_type: def.field_type,
            default: def.default.clone(),
            filters,
        }
    }
}
