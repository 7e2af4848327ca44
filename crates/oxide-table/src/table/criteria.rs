//! Row selection criteria.

use oxide_query::{Record, Value};

use crate::connection::Connection;

/// Which rows of a table an operation applies to.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Criteria {
    /// Every row.
    #[default]
    None,
    /// The row with this id.
    Id(i64),
    /// Rows whose fields equal the given values; null matches `IS NULL`.
    Fields(Record),
    /// A free-form condition in terms of the table's field names.
    Expression(String),
}

impl Criteria {
    /// Renders the criteria as a condition over the table's fields, or
    /// `None` when every row matches.
    #[must_use]
    pub fn to_expression<C: Connection>(&self, db: &C, id_field: &str) -> Option<String> {
        match self {
            Self::None => None,
            Self::Id(id) => Some(format!("`{id_field}` = {id}")),
            Self::Fields(fields) if fields.is_empty() => None,
            Self::Fields(fields) => Some(
                fields
                    .iter()
                    .map(|(field, value)| match value {
                        Value::Null => format!("`{field}` IS NULL"),
                        value => db.format(&format!("`{field}` = ?"), std::slice::from_ref(value)),
                    })
                    .collect::<Vec<_>>()
                    .join(" AND "),
            ),
            Self::Expression(expression) if expression.trim().is_empty() => None,
            Self::Expression(expression) => Some(expression.clone()),
        }
    }
}

impl From<i64> for Criteria {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

impl From<Record> for Criteria {
    fn from(fields: Record) -> Self {
        Self::Fields(fields)
    }
}

impl From<&str> for Criteria {
    fn from(expression: &str) -> Self {
        Self::Expression(expression.to_string())
    }
}

impl From<String> for Criteria {
    fn from(expression: String) -> Self {
        Self::Expression(expression)
    }
}

impl<T: Into<Self>> From<Option<T>> for Criteria {
    fn from(criteria: Option<T>) -> Self {
        criteria.map_or(Self::None, Into::into)
    }
}
