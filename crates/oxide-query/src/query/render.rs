//! SQL text generation.

use std::fmt::Write;

use super::{Direction, FieldExpr, Query};

impl Query {
    /// Renders the query as SQL, every line prefixed with `indent`.
    ///
    /// Nested subqueries are indented two spaces further.
    #[must_use]
    pub fn to_sql(&self, indent: &str) -> String {
        let columns: Vec<String> = self
            .fields
            .iter()
            .map(|(name, expr)| {
                if expr.needs_alias(name) {
                    format!("{} AS `{name}`", expr.to_sql())
                } else {
                    expr.to_sql()
                }
            })
            .collect();

        let mut sql = format!("{indent}SELECT {}", columns.join(", "));
        for source in &self.sources {
            let _ = write!(sql, "\n{indent}{}", source.to_sql(indent));
        }
        if let Some(condition) = &self.where_condition {
            let _ = write!(sql, "\n{indent}WHERE {condition}");
        }
        if !self.group_by.is_empty() {
            let terms: Vec<String> = self
                .group_by
                .iter()
                .map(|name| {
                    self.fields
                        .get(name)
                        .map_or_else(|| format!("`{name}`"), FieldExpr::to_sql)
                })
                .collect();
            let _ = write!(sql, "\n{indent}GROUP BY {}", terms.join(", "));
        }
        if !self.order_by.is_empty() {
            let terms: Vec<String> = self
                .order_by
                .iter()
                .map(|(name, direction)| match direction {
                    Direction::Asc => self.order_term(name),
                    Direction::Desc => format!("{} DESC", self.order_term(name)),
                })
                .collect();
            let _ = write!(sql, "\n{indent}ORDER BY {}", terms.join(", "));
        }
        if let Some(limit) = self.limit {
            if self.offset > 0 {
                let _ = write!(sql, "\n{indent}LIMIT {}, {limit}", self.offset);
            } else {
                let _ = write!(sql, "\n{indent}LIMIT {limit}");
            }
        }
        sql
    }

    /// Renders an ORDER BY term: the output alias where the select list
    /// defines one, otherwise the qualified column.
    fn order_term(&self, name: &str) -> String {
        match self.fields.get(name) {
            Some(expr) if !expr.needs_alias(name) => expr.to_sql(),
            _ => format!("`{name}`"),
        }
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_sql(""))
    }
}
