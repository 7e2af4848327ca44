//! The database connection abstraction.
//!
//! A [`Connection`] executes SQL text and returns materialized rows. Tables
//! and queries only ever hand it fully rendered statements; parameters are
//! inlined with [`Connection::format`] beforehand.

use indexmap::IndexMap;
use oxide_query::lexer::{tokenize, TokenKind};
use oxide_query::{escape, quote, Record, Value};

use crate::error::{Result, TableError};
use crate::tree::{Container, Program};

/// Executes SQL against a database.
///
/// Implementors provide [`execute`](Self::execute), [`query`](Self::query)
/// and [`last_insert_id`](Self::last_insert_id); everything else has a
/// default built on those three.
#[allow(async_fn_in_trait)]
pub trait Connection {
    /// Executes a statement and returns the number of affected rows.
    async fn execute(&self, sql: &str) -> Result<u64>;

    /// Runs a query and returns every row.
    async fn query(&self, sql: &str) -> Result<Vec<Record>>;

    /// Returns the id generated by the most recent insert.
    async fn last_insert_id(&self) -> Result<i64>;

    /// Escapes text for inclusion in a single-quoted literal.
    fn escape(&self, text: &str) -> String {
        escape(text)
    }

    /// Renders a value as an SQL literal.
    fn literal(&self, value: &Value) -> String {
        match value {
            Value::Text(text) => quote(&self.escape(text)),
            other => other.to_sql_inline(),
        }
    }

    /// Replaces each `?` placeholder in `template` with the next parameter.
    ///
    /// Question marks inside string literals are left alone, as are
    /// placeholders beyond the last parameter.
    fn format(&self, template: &str, params: &[Value]) -> String {
        let mut params = params.iter();
        let mut sql = String::with_capacity(template.len());
        for token in tokenize(template) {
            if token.kind != TokenKind::Placeholder {
                sql.push_str(token.raw(template));
                continue;
            }
            match params.next() {
                Some(value) => sql.push_str(&self.literal(value)),
                None => sql.push('?'),
            }
        }
        sql
    }

    /// Takes an exclusive write lock on `table`.
    async fn lock_table(&self, table: &str) -> Result<()> {
        self.execute(&format!("LOCK TABLES `{table}` WRITE")).await?;
        Ok(())
    }

    /// Releases locks taken by [`lock_table`](Self::lock_table).
    async fn unlock_table(&self, _table: &str) -> Result<()> {
        self.execute("UNLOCK TABLES").await?;
        Ok(())
    }

    /// Returns the first row, if any.
    async fn query_first(&self, sql: &str) -> Result<Option<Record>> {
        Ok(self.query(sql).await?.into_iter().next())
    }

    /// Returns `field` of the first row, or `default` when there is no row.
    async fn query_value(&self, field: &str, default: Value, sql: &str) -> Result<Value> {
        Ok(self
            .query_first(sql)
            .await?
            .and_then(|mut row| row.shift_remove(field))
            .unwrap_or(default))
    }

    /// Returns true if the query produces at least one row.
    async fn query_exists(&self, sql: &str) -> Result<bool> {
        Ok(self.query_first(sql).await?.is_some())
    }

    /// Returns `field` from every row.
    async fn query_column(&self, field: &str, sql: &str) -> Result<Vec<Value>> {
        Ok(self
            .query(sql)
            .await?
            .into_iter()
            .map(|mut row| row.shift_remove(field).unwrap_or_default())
            .collect())
    }

    /// Maps `key_field` to `value_field` over every row. Keys are the
    /// textual form of the key values; later rows overwrite earlier ones.
    async fn query_map(
        &self,
        key_field: &str,
        value_field: &str,
        sql: &str,
    ) -> Result<IndexMap<String, Value>> {
        let mut map = IndexMap::new();
        for mut row in self.query(sql).await? {
            let key = row.get(key_field).map(Value::to_key).unwrap_or_default();
            map.insert(key, row.shift_remove(value_field).unwrap_or_default());
        }
        Ok(map)
    }

    /// Runs a query whose rows are sorted by the program's levels and knits
    /// them into a tree.
    async fn query_structure(&self, program: &Program, sql: &str) -> Result<Container> {
        let rows = self.query(sql).await?;
        Ok(program.reconstruct(&rows))
    }
}

/// Rejects statements that are empty after trimming.
///
/// # Errors
///
/// Returns [`TableError::Configuration`] for an empty statement.
pub fn ensure_statement(sql: &str) -> Result<&str> {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return Err(TableError::Configuration(String::from(
            "empty SQL statement; did you forget to pass a query?",
        )));
    }
    Ok(trimmed)
}
