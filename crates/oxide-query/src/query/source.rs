//! Relations a query reads from.

use super::Query;

/// A named database table and its columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    /// The table name.
    pub name: String,
    /// The table's columns, in order.
    pub fields: Vec<String>,
}

impl TableRef {
    /// Creates a table reference.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

/// Anything a query can select from: a table or another query.
#[derive(Debug, Clone, PartialEq)]
pub enum Relation {
    /// A database table.
    Table(TableRef),
    /// A nested query, rendered as a parenthesized subquery.
    Query(Box<Query>),
}

impl Relation {
    /// Returns the externally visible field names, in order.
    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        match self {
            Self::Table(table) => table.fields.clone(),
            Self::Query(query) => query.field_names(),
        }
    }

    pub(crate) fn to_sql(&self, indent: &str) -> String {
        match self {
            Self::Table(table) => format!("`{}`", table.name),
            Self::Query(query) => {
                let inner = query.to_sql(&format!("{indent}  "));
                format!("(\n{inner}\n{indent})")
            }
        }
    }
}

impl From<TableRef> for Relation {
    fn from(table: TableRef) -> Self {
        Self::Table(table)
    }
}

impl From<Query> for Relation {
    fn from(query: Query) -> Self {
        Self::Query(Box::new(query))
    }
}

impl From<&Query> for Relation {
    fn from(query: &Query) -> Self {
        Self::Query(Box::new(query.clone()))
    }
}

/// How a source is attached to the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    /// The first source.
    From,
    /// An inner join.
    Inner,
    /// A left outer join.
    Left,
}

impl JoinKind {
    /// Returns the SQL keyword(s) introducing the source.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::From => "FROM",
            Self::Inner => "JOIN",
            Self::Left => "LEFT JOIN",
        }
    }
}

/// One entry of a query's FROM clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    /// What is read.
    pub relation: Relation,
    /// The table alias, unique within the query.
    pub alias: String,
    /// How the source is attached.
    pub kind: JoinKind,
    /// The resolved join condition, if any.
    pub condition: Option<String>,
}

impl Source {
    pub(crate) fn to_sql(&self, indent: &str) -> String {
        let mut sql = format!(
            "{} {} {}",
            self.kind.as_str(),
            self.relation.to_sql(indent),
            self.alias
        );
        if let Some(condition) = &self.condition {
            sql.push_str(" ON ");
            sql.push_str(condition);
        }
        sql
    }
}
