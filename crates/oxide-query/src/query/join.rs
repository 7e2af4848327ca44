//! Joins and natural joins.
//!
//! A join adds the right-hand relation as a new source and exposes its
//! fields next to the left-hand ones; on a name clash the left-hand field
//! wins. When the right-hand side is a plain single-source query its table
//! is merged straight into this query's FROM clause (and its WHERE into
//! ours), otherwise it is nested as a subquery. Both forms select the same
//! rows.

use std::collections::BTreeSet;

use tracing::debug;

use super::resolve::{remap, AliasMap};
use super::{FieldExpr, JoinKind, Query, Relation};
use crate::error::{QueryError, Result};

/// Suffix given to the right-hand copies of shared fields in a natural join.
pub const NATURAL_JOIN_SUFFIX: &str = "__rhs";

impl Query {
    /// Inner-joins `rhs` on `condition`, written in terms of the joined
    /// field names.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnresolvedField`] if the condition names an
    /// unknown backtick identifier.
    pub fn join(&self, rhs: impl Into<Relation>, condition: &str) -> Result<Self> {
        self.join_with(JoinKind::Inner, rhs, Some(condition))
    }

    /// Left-joins `rhs` on `condition`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnresolvedField`] if the condition names an
    /// unknown backtick identifier.
    pub fn left_join(&self, rhs: impl Into<Relation>, condition: &str) -> Result<Self> {
        self.join_with(JoinKind::Left, rhs, Some(condition))
    }

    /// Joins `rhs` with an explicit kind and optional condition, merging
    /// it into this query where possible.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnresolvedField`] if the condition names an
    /// unknown backtick identifier.
    pub fn join_with(
        &self,
        kind: JoinKind,
        rhs: impl Into<Relation>,
        condition: Option<&str>,
    ) -> Result<Self> {
        let rhs = Self::from_relation(rhs.into());
        if rhs.is_mergeable() {
            self.join_merged(kind, rhs, condition)
        } else {
            self.join_subquery(kind, rhs, condition)
        }
    }

    /// Joins `rhs` as a subquery, never merging it.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnresolvedField`] if the condition names an
    /// unknown backtick identifier.
    pub fn join_nested(
        &self,
        kind: JoinKind,
        rhs: impl Into<Relation>,
        condition: Option<&str>,
    ) -> Result<Self> {
        self.join_subquery(kind, Self::from_relation(rhs.into()), condition)
    }

    /// Inner-joins `rhs` on equality of every field the two share.
    ///
    /// The shared fields appear once in the result. With no shared fields
    /// the join has no condition.
    ///
    /// # Errors
    ///
    /// Propagates resolution errors.
    pub fn natural_join(&self, rhs: impl Into<Relation>) -> Result<Self> {
        self.natural_join_expecting(JoinKind::Inner, rhs, &[] as &[&str])
    }

    /// Left-joins `rhs` on equality of every field the two share.
    ///
    /// # Errors
    ///
    /// Propagates resolution errors.
    pub fn natural_left_join(&self, rhs: impl Into<Relation>) -> Result<Self> {
        self.natural_join_expecting(JoinKind::Left, rhs, &[] as &[&str])
    }

    /// Natural join that first checks the shared fields are exactly
    /// `expected` (in any order). An empty `expected` skips the check.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::JoinChecksumMismatch`] when the shared fields
    /// differ from `expected`.
    pub fn natural_join_expecting<S: AsRef<str>>(
        &self,
        kind: JoinKind,
        rhs: impl Into<Relation>,
        expected: &[S],
    ) -> Result<Self> {
        let rhs = Self::from_relation(rhs.into());
        let common: Vec<String> = self
            .fields
            .keys()
            .filter(|name| rhs.fields.contains_key(*name))
            .cloned()
            .collect();

        if !expected.is_empty() {
            let wanted: BTreeSet<&str> = expected.iter().map(AsRef::as_ref).collect();
            let actual: BTreeSet<&str> = common.iter().map(String::as_str).collect();
            if wanted != actual {
                return Err(QueryError::JoinChecksumMismatch {
                    expected: expected.iter().map(|s| s.as_ref().to_string()).collect(),
                    actual: common,
                });
            }
        }

        let shadowed: Vec<String> = common
            .iter()
            .map(|name| format!("{name}{NATURAL_JOIN_SUFFIX}"))
            .collect();
        let condition = common
            .iter()
            .zip(&shadowed)
            .map(|(name, copy)| format!("`{name}` = `{copy}`"))
            .collect::<Vec<_>>()
            .join(" AND ");

        let rhs = rhs.rename(common.iter().cloned().zip(shadowed.iter().cloned()))?;
        let joined = self.join_with(kind, rhs, (!condition.is_empty()).then_some(condition.as_str()))?;
        joined.discard(&shadowed)
    }

    fn join_merged(&self, kind: JoinKind, rhs: Self, condition: Option<&str>) -> Result<Self> {
        let mut result = self.successor_unpaginated();
        let Some(source) = rhs.sources.into_iter().next() else {
            return Ok(result);
        };

        let alias = result.push_source(source.relation, kind, None);
        let mapping: AliasMap = [(source.alias, alias.clone())].into();
        for (name, expr) in rhs.fields {
            if !result.fields.contains_key(&name) {
                result.fields.insert(name, expr.remapped(&mapping));
            }
        }
        let mut on = condition.map(|c| result.resolve(c)).transpose()?;
        if let Some(filter) = rhs.where_condition {
            let filter = remap(&filter, &mapping);
            // A left join keeps unmatched rows, so the filter belongs in ON.
            if kind == JoinKind::Left {
                on = Some(match on {
                    Some(on) => format!("({on}) AND ({filter})"),
                    None => filter,
                });
            } else {
                result.and_where(filter);
            }
        }
        if let Some(on) = on {
            result.set_condition(on);
        }

        debug!(alias = %alias, kind = kind.as_str(), "Merged joined relation");
        Ok(result)
    }

    fn join_subquery(&self, kind: JoinKind, rhs: Self, condition: Option<&str>) -> Result<Self> {
        let mut result = self.successor_unpaginated();
        let names = rhs.field_names();
        let alias = result.push_source(Relation::Query(Box::new(rhs)), kind, None);
        for name in names {
            if !result.fields.contains_key(&name) {
                let expr = FieldExpr::reference(alias.clone(), name.clone());
                result.fields.insert(name, expr);
            }
        }
        if let Some(condition) = condition {
            let resolved = result.resolve(condition)?;
            result.set_condition(resolved);
        }

        debug!(alias = %alias, kind = kind.as_str(), "Nested joined relation");
        Ok(result)
    }

    /// Sets the join condition of the most recently added source.
    fn set_condition(&mut self, condition: String) {
        if let Some(source) = self.sources.last_mut() {
            source.condition = Some(condition);
        }
    }
}
