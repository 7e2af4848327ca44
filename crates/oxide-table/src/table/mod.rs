//! Table descriptors: schema, filters, checks, reads and writes.
//!
//! A [`Table`] is declared once with [`Table::builder`] and is immutable
//! afterwards. Records flow through it in a fixed pipeline:
//!
//! 1. **filter**: each field's filters run in declaration order (the type
//!    coercion first), then the table's custom filters over the whole
//!    record;
//! 2. **check**: checks run in declaration order and the first failure
//!    stops the write;
//! 3. **write**: the statement is rendered and handed to the connection.
//!
//! ```rust
//! use oxide_table::{Check, FieldDef, Filter, Table};
//!
//! let users = Table::builder("users")
//!     .define_field(FieldDef::new("name", "").filter(Filter::ToTitlecase).check(Check::NotEmpty))
//!     .define_field(FieldDef::new("active", true))
//!     .check(["name", "active"], Check::Unique)
//!     .build();
//!
//! assert_eq!(users.field_names(), vec!["id", "name", "active"]);
//! ```

mod check;
mod criteria;
mod crud;
mod field;
mod filter;

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use indexmap::IndexMap;
use lru::LruCache;
use oxide_query::{Direction, Query, Record, Relation, TableRef, Value};
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::error::Result;

pub use check::{Check, CheckDecl, CheckFailure, Subject};
pub use criteria::Criteria;
pub use crud::SaveOutcome;
pub use field::{FieldDef, FieldSpec, FieldType};
pub use filter::{is_epoch, Filter, EPOCH_DATE, EPOCH_DATETIME};

/// A whole-record filter run after the per-field filters.
pub type CustomFilter = Arc<dyn Fn(Record) -> Record + Send + Sync>;

/// Number of distinct map queries kept, and the size below which a map is
/// worth keeping.
pub const MAP_CACHE_CAPACITY: usize = 200;

/// Output alias of the value column in [`Table::map`] queries.
const MAP_VALUE: &str = "map_value";

/// A table declaration.
pub struct Table {
    name: String,
    id_field: String,
    id_is_autoincrement: bool,
    fields: IndexMap<String, FieldSpec>,
    checks: Vec<CheckDecl>,
    custom_filters: Vec<CustomFilter>,
    maps: Mutex<LruCache<String, IndexMap<String, Value>>>,
}

/// Builder for [`Table`].
pub struct TableBuilder {
    name: String,
    id_field: String,
    id_is_autoincrement: bool,
    fields: Vec<FieldDef>,
    checks: Vec<CheckDecl>,
    custom_filters: Vec<CustomFilter>,
}

impl TableBuilder {
    /// Sets the id field name (default `id`).
    #[must_use]
    pub fn id_field(mut self, name: impl Into<String>) -> Self {
        self.id_field = name.into();
        self
    }

    /// Sets whether the database generates ids (default `true`). Without
    /// it, inserts lock the table and use `MAX(id) + 1`.
    #[must_use]
    pub const fn autoincrement(mut self, autoincrement: bool) -> Self {
        self.id_is_autoincrement = autoincrement;
        self
    }

    /// Declares a field, along with its filters and checks.
    #[must_use]
    pub fn define_field(mut self, field: FieldDef) -> Self {
        for check in &field.checks {
            self.checks.push(CheckDecl {
                subject: Subject::Field(field.name.clone()),
                check: check.clone(),
            });
        }
        self.fields.push(field);
        self
    }

    /// Declares a check on one field or a group of fields.
    #[must_use]
    pub fn check(mut self, subject: impl Into<Subject>, check: Check) -> Self {
        self.checks.push(CheckDecl {
            subject: subject.into(),
            check,
        });
        self
    }

    /// Adds a whole-record filter.
    #[must_use]
    pub fn custom_filter(mut self, filter: impl Fn(Record) -> Record + Send + Sync + 'static) -> Self {
        self.custom_filters.push(Arc::new(filter));
        self
    }

    /// Builds the table. The id field comes first, as an integer defaulting
    /// to `0`, unless it was declared explicitly.
    #[must_use]
    pub fn build(self) -> Table {
        let mut fields = IndexMap::new();
        fields.insert(
            self.id_field.clone(),
            FieldSpec::from_def(&FieldDef::new(self.id_field.clone(), 0_i64)),
        );
        for def in &self.fields {
            fields.insert(def.name.clone(), FieldSpec::from_def(def));
        }

        let capacity = NonZeroUsize::new(MAP_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Table {
            name: self.name,
            id_field: self.id_field,
            id_is_autoincrement: self.id_is_autoincrement,
            fields,
            checks: self.checks,
            custom_filters: self.custom_filters,
            maps: Mutex::new(LruCache::new(capacity)),
        }
    }
}

impl Table {
    /// Starts declaring a table.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> TableBuilder {
        TableBuilder {
            name: name.into(),
            id_field: String::from("id"),
            id_is_autoincrement: true,
            fields: Vec::new(),
            checks: Vec::new(),
            custom_filters: Vec::new(),
        }
    }

    // ==================== Schema ====================

    /// Returns the table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the id field name.
    #[must_use]
    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Returns true if the database generates ids.
    #[must_use]
    pub const fn is_autoincrement(&self) -> bool {
        self.id_is_autoincrement
    }

    /// Returns the declared field names, id first.
    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    /// Returns true if `name` is a declared field.
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Returns a declared field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    /// Returns the declared checks, in order.
    #[must_use]
    pub fn checks(&self) -> &[CheckDecl] {
        &self.checks
    }

    /// Returns a record holding every field's default.
    #[must_use]
    pub fn blank_record(&self) -> Record {
        self.fields
            .iter()
            .map(|(name, spec)| (name.clone(), spec.default.clone()))
            .collect()
    }

    /// Returns the table as a relation for the query algebra.
    #[must_use]
    pub fn relation(&self) -> TableRef {
        TableRef::new(self.name.clone(), self.field_names())
    }

    /// Returns a query selecting every declared field.
    #[must_use]
    pub fn query(&self) -> Query {
        Query::new(self.relation())
    }

    // ==================== Pipeline ====================

    /// Runs the filter chain. With `canonicalize`, missing declared fields
    /// are first added as null. Undeclared fields pass through unfiltered.
    #[must_use]
    pub fn filter(&self, mut record: Record, canonicalize: bool) -> Record {
        if canonicalize {
            for name in self.fields.keys() {
                record.entry(name.clone()).or_insert(Value::Null);
            }
        }
        for (name, value) in &mut record {
            if let Some(spec) = self.fields.get(name) {
                for filter in &spec.filters {
                    *value = filter.apply(std::mem::take(value));
                }
            }
        }
        self.custom_filters
            .iter()
            .fold(record, |record, filter| filter(record))
    }

    /// Runs the check chain; returns the first failure.
    ///
    /// # Errors
    ///
    /// Propagates connection errors from checks that query the database.
    pub async fn check<C: Connection>(
        &self,
        db: &C,
        record: &Record,
        id: Option<i64>,
    ) -> Result<Option<CheckFailure>> {
        for decl in &self.checks {
            if let Some(detail) = decl.check.evaluate(db, self, record, &decl.subject, id).await? {
                let failure = CheckFailure {
                    check: decl.check.name().to_string(),
                    subject: decl.subject.clone(),
                    detail,
                };
                warn!(
                    table = %self.name,
                    check = %failure.check,
                    subject = %failure.subject,
                    "Check failed"
                );
                return Ok(Some(failure));
            }
        }
        Ok(None)
    }

    // ==================== Reads ====================

    /// Builds the query behind the read operations: every declared field,
    /// restricted by `criteria`, in `order`.
    ///
    /// # Errors
    ///
    /// Returns a query error if the criteria or order name unknown fields.
    pub fn make_query<C: Connection>(
        &self,
        db: &C,
        criteria: &Criteria,
        order: &[(&str, Direction)],
    ) -> Result<Query> {
        let mut query = self.query();
        if let Some(condition) = criteria.to_expression(db, &self.id_field) {
            query = query.where_clause(&condition)?;
        }
        if !order.is_empty() {
            query = query.order_by_fields(order.iter().copied())?;
        }
        Ok(query)
    }

    /// Loads the first matching record.
    ///
    /// # Errors
    ///
    /// Propagates query and connection errors.
    pub async fn load<C: Connection>(
        &self,
        db: &C,
        criteria: &Criteria,
        order: &[(&str, Direction)],
    ) -> Result<Option<Record>> {
        let query = self.make_query(db, criteria, order)?.limit(1);
        db.query_first(&query.to_string()).await
    }

    /// Loads every matching record.
    ///
    /// # Errors
    ///
    /// Propagates query and connection errors.
    pub async fn load_all<C: Connection>(
        &self,
        db: &C,
        criteria: &Criteria,
        order: &[(&str, Direction)],
    ) -> Result<Vec<Record>> {
        let query = self.make_query(db, criteria, order)?;
        db.query(&query.to_string()).await
    }

    /// Returns the id of the first matching record.
    ///
    /// # Errors
    ///
    /// Propagates query and connection errors.
    pub async fn find<C: Connection>(&self, db: &C, criteria: &Criteria) -> Result<Option<i64>> {
        let query = self
            .make_query(db, criteria, &[])?
            .select([self.id_field.as_str()])?
            .limit(1);
        let found = db
            .query_value(&self.id_field, Value::Null, &query.to_string())
            .await?;
        Ok(found.as_i64())
    }

    /// Maps `key_field` (the id by default) to `value`, which is a field
    /// name or an expression over the fields.
    ///
    /// Maps smaller than [`MAP_CACHE_CAPACITY`] are cached by their SQL for
    /// the table's lifetime, least recently used first out.
    ///
    /// # Errors
    ///
    /// Propagates query and connection errors.
    pub async fn map<C: Connection>(
        &self,
        db: &C,
        value: &str,
        criteria: &Criteria,
        order: &[(&str, Direction)],
        key_field: Option<&str>,
    ) -> Result<IndexMap<String, Value>> {
        let key_field = key_field.unwrap_or(&self.id_field);
        let base = self.make_query(db, criteria, order)?;
        let query = if base.field(value).is_some() {
            base.project([(key_field, key_field), (MAP_VALUE, value)])?
        } else {
            base.define(MAP_VALUE, value)?
                .select([key_field, MAP_VALUE])?
        };
        let sql = query.to_string();

        if let Some(map) = self.cached_map(&sql) {
            debug!(table = %self.name, "Map cache hit");
            return Ok(map);
        }
        let map = db.query_map(key_field, MAP_VALUE, &sql).await?;
        if map.len() < MAP_CACHE_CAPACITY {
            self.maps
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .put(sql, map.clone());
        }
        Ok(map)
    }

    fn cached_map(&self, sql: &str) -> Option<IndexMap<String, Value>> {
        self.maps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(sql)
            .cloned()
    }

    /// Forgets every cached map.
    pub fn clear_map_cache(&self) {
        self.maps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl From<&Table> for Relation {
    fn from(table: &Table) -> Self {
        Self::Table(table.relation())
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("id_field", &self.id_field)
            .field("id_is_autoincrement", &self.id_is_autoincrement)
            .field("fields", &self.fields)
            .field("checks", &self.checks)
            .field("custom_filters", &self.custom_filters.len())
            .finish_non_exhaustive()
    }
}
