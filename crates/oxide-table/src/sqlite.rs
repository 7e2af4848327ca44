//! SQLite connection backed by sqlx.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use oxide_query::{quote, Record, Value};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{Sqlite, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::connection::{ensure_statement, Connection};
use crate::error::{Result, TableError};

/// Callback invoked with every statement before it runs.
pub type QueryObserver = Arc<dyn Fn(&str) + Send + Sync>;

/// A [`Connection`] over an sqlx SQLite pool.
///
/// Table locks map to `BEGIN IMMEDIATE` / `COMMIT`. A second locker waits
/// until the first unlocks. While a lock is held, every statement runs on
/// the locked pool connection.
pub struct SqliteDatabase {
    pool: SqlitePool,
    writer: Arc<Mutex<()>>,
    locked: Mutex<Option<HeldLock>>,
    last_insert_id: AtomicI64,
    on_query: Option<QueryObserver>,
}

/// The connection holding an open `BEGIN IMMEDIATE`, and the guard that
/// keeps other lockers waiting.
struct HeldLock {
    conn: PoolConnection<Sqlite>,
    _writer: OwnedMutexGuard<()>,
}

impl SqliteDatabase {
    /// Wraps an existing pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            writer: Arc::new(Mutex::new(())),
            locked: Mutex::new(None),
            last_insert_id: AtomicI64::new(0),
            on_query: None,
        }
    }

    /// Connects to `url` with a single-connection pool, so that in-memory
    /// databases keep their contents for the pool's lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::Database`] if the connection fails.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(url)
            .await?;
        info!(url = %url, "Connected to SQLite");
        Ok(Self::new(pool))
    }

    /// Installs a callback that sees every statement before it runs.
    #[must_use]
    pub fn on_query(mut self, observer: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_query = Some(Arc::new(observer));
        self
    }

    /// Returns the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn prepare<'a>(&self, sql: &'a str) -> Result<&'a str> {
        let sql = ensure_statement(sql)?;
        debug!(sql = %sql, "Executing SQL");
        if let Some(observer) = &self.on_query {
            observer(sql);
        }
        Ok(sql)
    }
}

impl std::fmt::Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDatabase")
            .field("pool", &self.pool)
            .field("on_query", &self.on_query.is_some())
            .finish_non_exhaustive()
    }
}

impl Connection for SqliteDatabase {
    async fn execute(&self, sql: &str) -> Result<u64> {
        let sql = self.prepare(sql)?;
        let mut locked = self.locked.lock().await;
        let result = match locked.as_mut() {
            Some(held) => sqlx::query(sql).execute(&mut *held.conn).await?,
            None => sqlx::query(sql).execute(&self.pool).await?,
        };
        self.last_insert_id
            .store(result.last_insert_rowid(), Ordering::SeqCst);
        Ok(result.rows_affected())
    }

    async fn query(&self, sql: &str) -> Result<Vec<Record>> {
        let sql = self.prepare(sql)?;
        let mut locked = self.locked.lock().await;
        let rows = match locked.as_mut() {
            Some(held) => sqlx::query(sql).fetch_all(&mut *held.conn).await?,
            None => sqlx::query(sql).fetch_all(&self.pool).await?,
        };
        rows.iter().map(decode_row).collect()
    }

    async fn last_insert_id(&self) -> Result<i64> {
        Ok(self.last_insert_id.load(Ordering::SeqCst))
    }

    /// SQLite string literals have no backslash escapes, so text holding a
    /// backslash is spliced together around `CHAR(92)`.
    fn literal(&self, value: &Value) -> String {
        match value {
            Value::Text(text) if text.contains('\\') => {
                let parts: Vec<String> = text
                    .split('\\')
                    .map(|part| quote(&part.replace('\'', "''")))
                    .collect();
                format!("({})", parts.join(" || CHAR(92) || "))
            }
            Value::Text(text) => quote(&self.escape(text)),
            other => other.to_sql_inline(),
        }
    }

    async fn lock_table(&self, table: &str) -> Result<()> {
        let writer = Arc::clone(&self.writer).lock_owned().await;
        let mut conn = self.pool.acquire().await?;
        let sql = self.prepare("BEGIN IMMEDIATE")?;
        sqlx::query(sql).execute(&mut *conn).await?;
        debug!(table = %table, "Table locked");
        *self.locked.lock().await = Some(HeldLock {
            conn,
            _writer: writer,
        });
        Ok(())
    }

    async fn unlock_table(&self, table: &str) -> Result<()> {
        let mut locked = self.locked.lock().await;
        let Some(held) = locked.as_mut() else {
            return Ok(());
        };
        let committed = sqlx::query(self.prepare("COMMIT")?)
            .execute(&mut *held.conn)
            .await;
        if let Err(err) = committed {
            warn!(table = %table, error = %err, "Commit failed, rolling back");
            let rolled_back = sqlx::query(self.prepare("ROLLBACK")?)
                .execute(&mut *held.conn)
                .await;
            if let Err(rollback) = rolled_back {
                warn!(table = %table, error = %rollback, "Rollback failed");
            }
            locked.take();
            return Err(err.into());
        }
        locked.take();
        debug!(table = %table, "Table unlocked");
        Ok(())
    }
}

/// Converts a row into a record, choosing each value's variant from the
/// storage class SQLite reports for it.
fn decode_row(row: &SqliteRow) -> Result<Record> {
    let mut record = Record::with_capacity(row.len());
    for (index, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(index)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let storage = raw.type_info().name().to_string();
            match storage.as_str() {
                "INTEGER" | "BOOLEAN" => Value::Int(row.try_get_unchecked::<i64, _>(index)?),
                "REAL" => Value::Float(row.try_get_unchecked::<f64, _>(index)?),
                "BLOB" => Value::Blob(row.try_get_unchecked::<Vec<u8>, _>(index)?),
                _ => Value::Text(row.try_get_unchecked::<String, _>(index)?),
            }
        };
        record.insert(column.name().to_string(), value);
    }
    Ok(record)
}
