//! The immutable query algebra.
//!
//! A [`Query`] describes a SELECT over one or more [`Source`]s, exposing a
//! set of named fields. Every transformation returns a new query and leaves
//! the receiver untouched, so a query can be shared and refined freely:
//!
//! ```rust
//! use oxide_query::{Query, TableRef};
//!
//! let users = Query::new(TableRef::new("users", ["id", "name", "age"]));
//! let adults = users
//!     .where_clause("age >= 18")
//!     .unwrap()
//!     .select(["id", "name"])
//!     .unwrap();
//!
//! assert_eq!(users.field_names(), vec!["id", "name", "age"]);
//! assert_eq!(
//!     adults.to_string(),
//!     "SELECT t1.`id`, t1.`name`\nFROM `users` t1\nWHERE t1.`age` >= 18"
//! );
//! ```
//!
//! Transformations that cannot be expressed on the current query level
//! (projecting a grouped query, filtering a limited one) wrap the query as
//! a subquery first and apply to the wrapper.

mod field;
mod join;
mod render;
pub mod resolve;
mod source;

use std::collections::HashMap;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};

pub use field::FieldExpr;
pub use resolve::AliasMap;
pub use source::{JoinKind, Relation, Source, TableRef};

/// SQL aggregate function names, followed by an opening parenthesis.
static AGGREGATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(AVG|BIT_AND|BIT_OR|COUNT|GROUP_CONCAT|MAX|MIN|STD|STDDEV|STDDEV_POP|STDDEV_SAMP|SUM|VAR_POP|VAR_SAMP|VARIANCE)\s*\(",
    )
    .expect("aggregate pattern is valid")
});

/// Returns true if `expression` calls an SQL aggregate function.
#[must_use]
pub fn contains_aggregate(expression: &str) -> bool {
    AGGREGATE.is_match(expression)
}

/// Sort direction for ORDER BY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Ascending (default).
    #[default]
    Asc,
    /// Descending.
    Desc,
}

/// An immutable relational query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    fields: IndexMap<String, FieldExpr>,
    sources: Vec<Source>,
    where_condition: Option<String>,
    group_by: Vec<String>,
    order_by: Vec<(String, Direction)>,
    offset: u64,
    limit: Option<u64>,
    has_aggregates: bool,
    next_alias: usize,
}

impl Query {
    /// Creates a query selecting every field of `relation`.
    #[must_use]
    pub fn new(relation: impl Into<Relation>) -> Self {
        let mut query = Self {
            fields: IndexMap::new(),
            sources: Vec::new(),
            where_condition: None,
            group_by: Vec::new(),
            order_by: Vec::new(),
            offset: 0,
            limit: None,
            has_aggregates: false,
            next_alias: 1,
        };
        let relation = relation.into();
        let names = relation.field_names();
        let alias = query.push_source(relation, JoinKind::From, None);
        for name in names {
            query
                .fields
                .insert(name.clone(), FieldExpr::reference(alias.clone(), name));
        }
        query
    }

    /// Creates a query over the table `name` with the given columns.
    #[must_use]
    pub fn from_table<I, S>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(TableRef::new(name, fields))
    }

    /// Wraps `inner` as a subquery, selecting all of its fields.
    #[must_use]
    pub fn over(inner: Self) -> Self {
        Self::new(Relation::Query(Box::new(inner)))
    }

    /// Converts a relation into a query: queries are unwrapped, tables are
    /// selected in full.
    #[must_use]
    pub fn from_relation(relation: Relation) -> Self {
        match relation {
            Relation::Query(query) => *query,
            table @ Relation::Table(_) => Self::new(table),
        }
    }

    // ==================== Accessors ====================

    /// Returns the external field names, in order.
    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    /// Returns the expression behind an external field name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldExpr> {
        self.fields.get(name)
    }

    /// Returns all fields with their expressions, in order.
    #[must_use]
    pub const fn fields(&self) -> &IndexMap<String, FieldExpr> {
        &self.fields
    }

    /// Returns the FROM clause entries, in order.
    #[must_use]
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Returns the resolved WHERE condition.
    #[must_use]
    pub fn where_condition(&self) -> Option<&str> {
        self.where_condition.as_deref()
    }

    /// Returns the GROUP BY field names.
    #[must_use]
    pub fn grouping(&self) -> &[String] {
        &self.group_by
    }

    /// Returns the ORDER BY terms.
    #[must_use]
    pub fn ordering(&self) -> &[(String, Direction)] {
        &self.order_by
    }

    /// Returns `(offset, limit)`.
    #[must_use]
    pub const fn pagination(&self) -> (u64, Option<u64>) {
        (self.offset, self.limit)
    }

    /// Returns true once a defined field has used an aggregate function.
    #[must_use]
    pub const fn has_aggregates(&self) -> bool {
        self.has_aggregates
    }

    /// Returns true if another query could absorb this one into its own
    /// FROM clause rather than nesting it.
    #[must_use]
    pub fn is_mergeable(&self) -> bool {
        self.sources.len() == 1
            && self.group_by.is_empty()
            && self.offset == 0
            && self.limit.is_none()
            && !self.has_aggregates
    }

    // ==================== Projection ====================

    /// Replaces the field set. Each `(target, source)` pair exposes the
    /// existing field `source` under the name `target`, in the given order.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownField`] if a source name is not a field.
    pub fn project<I, T, S>(&self, mapping: I) -> Result<Self>
    where
        I: IntoIterator<Item = (T, S)>,
        T: Into<String>,
        S: AsRef<str>,
    {
        let mut result = self.successor();
        let mut fields = IndexMap::new();
        for (target, source) in mapping {
            let expr = result.require(source.as_ref())?.clone();
            fields.insert(target.into(), expr);
        }
        result.fields = fields;
        Ok(result)
    }

    /// Keeps only the named fields, in the given order.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownField`] if a name is not a field.
    pub fn select<I, S>(&self, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<String> = names.into_iter().map(|n| n.as_ref().to_string()).collect();
        self.project(names.iter().map(|n| (n.clone(), n.as_str())))
    }

    /// Drops the named fields; names that are not fields are ignored.
    ///
    /// # Errors
    ///
    /// Propagates projection errors.
    pub fn discard<I, S>(&self, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let dropped: Vec<String> = names.into_iter().map(|n| n.as_ref().to_string()).collect();
        let kept: Vec<String> = self
            .fields
            .keys()
            .filter(|name| !dropped.contains(name))
            .cloned()
            .collect();
        self.select(kept)
    }

    /// Renames fields through `(from, to)` pairs, keeping field order.
    /// Fields not mentioned keep their name.
    ///
    /// # Errors
    ///
    /// Propagates projection errors.
    pub fn rename<I, F, T>(&self, mapping: I) -> Result<Self>
    where
        I: IntoIterator<Item = (F, T)>,
        F: Into<String>,
        T: Into<String>,
    {
        let mapping: HashMap<String, String> = mapping
            .into_iter()
            .map(|(from, to)| (from.into(), to.into()))
            .collect();
        let pairs: Vec<(String, String)> = self
            .fields
            .keys()
            .map(|name| {
                let target = mapping.get(name).cloned().unwrap_or_else(|| name.clone());
                (target, name.clone())
            })
            .collect();
        self.project(pairs)
    }

    /// Prepends `prefix` to every field name.
    ///
    /// # Errors
    ///
    /// Propagates projection errors.
    pub fn prefix(&self, prefix: &str) -> Result<Self> {
        self.rename(
            self.fields
                .keys()
                .map(|name| (name.clone(), format!("{prefix}{name}"))),
        )
    }

    /// Prepends `prefix` to the named fields only.
    ///
    /// # Errors
    ///
    /// Propagates projection errors.
    pub fn prefix_fields<I, S>(&self, prefix: &str, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.rename(
            names
                .into_iter()
                .map(|name| (name.as_ref().to_string(), format!("{prefix}{}", name.as_ref()))),
        )
    }

    // ==================== Filtering and computed fields ====================

    /// ANDs a condition, written in terms of the field names, into WHERE.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnresolvedField`] for an unknown backtick
    /// identifier.
    pub fn where_clause(&self, expression: &str) -> Result<Self> {
        let mut result = self.successor_unpaginated();
        let resolved = result.resolve(expression)?;
        result.and_where(resolved);
        Ok(result)
    }

    /// Adds (or replaces) the field `name`, computed by `expression`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnresolvedField`] for an unknown backtick
    /// identifier.
    pub fn define(&self, name: impl Into<String>, expression: &str) -> Result<Self> {
        let mut result = self.successor_unpaginated();
        let resolved = result.resolve(expression)?;
        result
            .fields
            .insert(name.into(), FieldExpr::defined(resolved));
        if contains_aggregate(expression) {
            result.has_aggregates = true;
        }
        Ok(result)
    }

    // ==================== Grouping, ordering, pagination ====================

    /// Groups by the named fields.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownField`] if a name is not a field.
    pub fn group_by<I, S>(&self, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut result = self.successor_unpaginated();
        let mut group_by = Vec::new();
        for name in names {
            result.require(name.as_ref())?;
            group_by.push(name.as_ref().to_string());
        }
        result.group_by = group_by;
        Ok(result)
    }

    /// Orders by the named fields. A term `"-1"` makes the preceding field
    /// descending: `order_by(["age", "-1", "name"])`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownField`] if a name is not a field.
    pub fn order_by<I, S>(&self, terms: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ordering: Vec<(String, Direction)> = Vec::new();
        for term in terms {
            let term = term.as_ref();
            if term == "-1" {
                if let Some(last) = ordering.last_mut() {
                    last.1 = Direction::Desc;
                }
            } else {
                ordering.push((term.to_string(), Direction::Asc));
            }
        }
        self.order_by_fields(ordering)
    }

    /// Orders by `(field, direction)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownField`] if a name is not a field.
    pub fn order_by_fields<I, S>(&self, ordering: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Direction)>,
        S: AsRef<str>,
    {
        let mut result = self.successor();
        let mut order_by = Vec::new();
        for (name, direction) in ordering {
            result.require(name.as_ref())?;
            order_by.push((name.as_ref().to_string(), direction));
        }
        result.order_by = order_by;
        Ok(result)
    }

    /// Limits the result to `count` rows from the start.
    #[must_use]
    pub fn limit(&self, count: u64) -> Self {
        let mut result = self.successor();
        result.offset = 0;
        result.limit = Some(count);
        result
    }

    /// Limits the result to `count` rows, skipping `offset`.
    #[must_use]
    pub fn offset(&self, offset: u64, count: u64) -> Self {
        let mut result = self.successor();
        result.offset = offset;
        result.limit = Some(count);
        result
    }

    // ==================== Internals ====================

    /// Resolves an expression against this query's fields.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnresolvedField`] for an unknown backtick
    /// identifier.
    pub fn resolve(&self, expression: &str) -> Result<String> {
        resolve::resolve(expression, &self.fields)
    }

    /// The starting point of a transformation that cannot apply to a
    /// grouped query.
    fn successor(&self) -> Self {
        if self.group_by.is_empty() {
            self.clone()
        } else {
            Self::over(self.clone())
        }
    }

    /// The starting point of a transformation that cannot apply to a
    /// grouped or paginated query.
    fn successor_unpaginated(&self) -> Self {
        if self.group_by.is_empty() && self.limit.is_none() {
            self.clone()
        } else {
            Self::over(self.clone())
        }
    }

    fn require(&self, name: &str) -> Result<&FieldExpr> {
        self.fields.get(name).ok_or_else(|| QueryError::UnknownField {
            field: name.to_string(),
            available: self.field_names(),
        })
    }

    fn and_where(&mut self, condition: String) {
        self.where_condition = Some(match self.where_condition.take() {
            Some(existing) => format!("({existing}) AND ({condition})"),
            None => condition,
        });
    }

    fn next_alias(&mut self) -> String {
        let alias = format!("t{}", self.next_alias);
        self.next_alias += 1;
        alias
    }

    fn push_source(&mut self, relation: Relation, kind: JoinKind, condition: Option<String>) -> String {
        let alias = self.next_alias();
        self.sources.push(Source {
            relation,
            alias: alias.clone(),
            kind,
            condition,
        });
        alias
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Query {
        Query::from_table("users", ["id", "name", "age"])
    }

    #[test]
    fn test_new_selects_every_field() {
        let query = users();
        assert_eq!(query.field_names(), vec!["id", "name", "age"]);
        assert_eq!(query.sources().len(), 1);
        assert_eq!(query.sources()[0].alias, "t1");
        assert_eq!(query.field("age"), Some(&FieldExpr::reference("t1", "age")));
        assert!(query.is_mergeable());
    }

    #[test]
    fn test_transformations_leave_receiver_untouched() {
        let query = users();
        let before = query.clone();
        let _ = query.select(["id"]).unwrap();
        let _ = query.where_clause("age > 3").unwrap();
        let _ = query.define("twice", "age * 2").unwrap();
        let _ = query.limit(5);
        assert_eq!(query, before);
    }

    #[test]
    fn test_project_reorders_and_renames() {
        let query = users().project([("who", "name"), ("key", "id")]).unwrap();
        assert_eq!(query.field_names(), vec!["who", "key"]);
        assert_eq!(query.field("who"), Some(&FieldExpr::reference("t1", "name")));
    }

    #[test]
    fn test_project_unknown_field() {
        let err = users().select(["id", "email"]).unwrap_err();
        assert_eq!(
            err,
            QueryError::UnknownField {
                field: String::from("email"),
                available: vec![
                    String::from("id"),
                    String::from("name"),
                    String::from("age")
                ],
            }
        );
    }

    #[test]
    fn test_discard_ignores_unknown_names() {
        let query = users().discard(["age", "email"]).unwrap();
        assert_eq!(query.field_names(), vec!["id", "name"]);
    }

    #[test]
    fn test_rename_keeps_order() {
        let query = users().rename([("name", "full_name")]).unwrap();
        assert_eq!(query.field_names(), vec!["id", "full_name", "age"]);
    }

    #[test]
    fn test_prefix() {
        let all = users().prefix("u_").unwrap();
        assert_eq!(all.field_names(), vec!["u_id", "u_name", "u_age"]);
        let some = users().prefix_fields("u_", ["id"]).unwrap();
        assert_eq!(some.field_names(), vec!["u_id", "name", "age"]);
    }

    #[test]
    fn test_where_conditions_are_anded() {
        let query = users()
            .where_clause("age > 18")
            .unwrap()
            .where_clause("name LIKE 'A%'")
            .unwrap();
        assert_eq!(
            query.where_condition(),
            Some("(t1.`age` > 18) AND (t1.`name` LIKE 'A%')")
        );
    }

    #[test]
    fn test_define_tracks_aggregates() {
        let plain = users().define("decade", "age / 10").unwrap();
        assert!(!plain.has_aggregates());
        assert_eq!(plain.field("decade"), Some(&FieldExpr::defined("t1.`age` / 10")));

        let counted = users().define("n", "count( id )").unwrap();
        assert!(counted.has_aggregates());
        assert!(!counted.is_mergeable());
    }

    #[test]
    fn test_define_replaces_in_place() {
        let query = users().define("name", "UPPER(name)").unwrap();
        assert_eq!(query.field_names(), vec!["id", "name", "age"]);
        assert_eq!(
            query.field("name"),
            Some(&FieldExpr::defined("UPPER(t1.`name`)"))
        );
    }

    #[test]
    fn test_aggregate_detection() {
        assert!(contains_aggregate("SUM(x)"));
        assert!(contains_aggregate("1 + max (y)"));
        assert!(contains_aggregate("GROUP_CONCAT(name)"));
        assert!(!contains_aggregate("summary"));
        assert!(!contains_aggregate("my_count(x)"));
        assert!(!contains_aggregate("count"));
        assert!(!contains_aggregate("BIT_XOR(flags)"));
    }

    #[test]
    fn test_order_by_minus_one_reverses_preceding_field() {
        let query = users().order_by(["age", "-1", "name"]).unwrap();
        assert_eq!(
            query.ordering(),
            &[
                (String::from("age"), Direction::Desc),
                (String::from("name"), Direction::Asc)
            ]
        );
    }

    #[test]
    fn test_group_by_validates_names() {
        assert!(users().group_by(["nope"]).is_err());
        let grouped = users().group_by(["age"]).unwrap();
        assert_eq!(grouped.grouping(), &[String::from("age")]);
    }

    #[test]
    fn test_grouped_query_is_wrapped_before_projection() {
        let grouped = users()
            .define("n", "COUNT(id)")
            .unwrap()
            .group_by(["age"])
            .unwrap();
        let projected = grouped.select(["age", "n"]).unwrap();
        assert_eq!(projected.sources().len(), 1);
        assert!(matches!(projected.sources()[0].relation, Relation::Query(_)));
        assert!(projected.grouping().is_empty());
        assert_eq!(projected.field("n"), Some(&FieldExpr::reference("t1", "n")));
    }

    #[test]
    fn test_limited_query_is_wrapped_before_filtering() {
        let limited = users().limit(10);
        assert_eq!(limited.pagination(), (0, Some(10)));

        let filtered = limited.where_clause("age > 1").unwrap();
        assert_eq!(filtered.pagination(), (0, None));
        assert!(matches!(filtered.sources()[0].relation, Relation::Query(_)));

        let paged = limited.offset(20, 10);
        assert_eq!(paged.pagination(), (20, Some(10)));
        assert!(matches!(paged.sources()[0].relation, Relation::Table(_)));
        assert_eq!(paged.limit(3).pagination(), (0, Some(3)));
    }
}
