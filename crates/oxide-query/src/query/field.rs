//! Projected field expressions.

use super::resolve::{remap, AliasMap};
use crate::lexer::tokenize;

/// One projected column of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldExpr {
    /// A column of one of the query's sources.
    Reference {
        /// Alias of the source the column comes from.
        source_alias: String,
        /// Column name within that source.
        field_name: String,
    },
    /// A computed expression, already resolved to qualified references.
    Defined {
        /// The resolved SQL expression.
        expression: String,
    },
}

impl FieldExpr {
    /// Creates a reference to `field_name` in the source aliased `source_alias`.
    #[must_use]
    pub fn reference(source_alias: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self::Reference {
            source_alias: source_alias.into(),
            field_name: field_name.into(),
        }
    }

    /// Creates a computed field from a resolved expression.
    #[must_use]
    pub fn defined(expression: impl Into<String>) -> Self {
        Self::Defined {
            expression: expression.into(),
        }
    }

    /// Renders the field as it appears in a select list.
    #[must_use]
    pub fn to_sql(&self) -> String {
        match self {
            Self::Reference {
                source_alias,
                field_name,
            } => format!("{source_alias}.`{field_name}`"),
            Self::Defined { expression } => expression.clone(),
        }
    }

    /// Renders the field for substitution into another expression.
    ///
    /// Computed expressions of more than one token are parenthesized so
    /// that operator precedence in the surrounding expression is kept.
    #[must_use]
    pub fn to_operand(&self) -> String {
        match self {
            Self::Defined { expression } if tokenize(expression).len() > 1 => {
                format!("({expression})")
            }
            _ => self.to_sql(),
        }
    }

    /// Returns true when selecting this field under `name` needs an `AS`.
    #[must_use]
    pub fn needs_alias(&self, name: &str) -> bool {
        !matches!(self, Self::Reference { field_name, .. } if field_name == name)
    }

    /// Returns a copy with table aliases rewritten through `mapping`.
    #[must_use]
    pub fn remapped(&self, mapping: &AliasMap) -> Self {
        match self {
            Self::Reference {
                source_alias,
                field_name,
            } => Self::Reference {
                source_alias: mapping
                    .get(source_alias)
                    .cloned()
                    .unwrap_or_else(|| source_alias.clone()),
                field_name: field_name.clone(),
            },
            Self::Defined { expression } => Self::Defined {
                expression: remap(expression, mapping),
            },
        }
    }
}

impl std::fmt::Display for FieldExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_sql())
    }
}
