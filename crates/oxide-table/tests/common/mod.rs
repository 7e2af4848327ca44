#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use oxide_query::{Record, Value};
use oxide_table::{Check, Connection, FieldDef, FieldType, Result, SqliteDatabase, Table};

/// Opens a fresh in-memory database with the test schema.
pub async fn database() -> SqliteDatabase {
    let db = SqliteDatabase::connect("sqlite::memory:").await.unwrap();
    create_schema(&db).await;
    db
}

/// Opens a fresh in-memory database that counts the statements it runs.
pub async fn counted_database() -> (SqliteDatabase, Arc<AtomicUsize>) {
    let counter = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&counter);
    let db = SqliteDatabase::connect("sqlite::memory:")
        .await
        .unwrap()
        .on_query(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
    create_schema(&db).await;
    counter.store(0, Ordering::SeqCst);
    (db, counter)
}

pub async fn create_schema(db: &SqliteDatabase) {
    for statement in [
        "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, email TEXT, age INTEGER, active INTEGER)",
        "CREATE TABLE orders (order_id INTEGER PRIMARY KEY AUTOINCREMENT, user_id INTEGER, total REAL)",
        "CREATE TABLE invoices (id INTEGER PRIMARY KEY, number TEXT, issued TEXT)",
        "CREATE TABLE tags (id INTEGER, label TEXT)",
    ] {
        db.execute(statement).await.unwrap();
    }
}

pub fn users() -> Table {
    Table::builder("users")
        .define_field(FieldDef::new("name", "").check(Check::NotEmpty))
        .define_field(
            FieldDef::new("email", "")
                .filter(oxide_table::Filter::ToLowercase)
                .check(Check::Unique),
        )
        .define_field(FieldDef::new("age", 0_i64))
        .define_field(FieldDef::new("active", true))
        .build()
}

pub fn orders() -> Table {
    Table::builder("orders")
        .id_field("order_id")
        .define_field(FieldDef::new("user_id", 0_i64).check(Check::MemberOf {
            table: String::from("users"),
            fields: vec![String::from("id")],
        }))
        .define_field(FieldDef::new("total", 0.0))
        .build()
}

pub fn invoices() -> Table {
    Table::builder("invoices")
        .autoincrement(false)
        .define_field(FieldDef::new("number", "").check(Check::NotEmpty))
        .define_field(FieldDef::new("issued", "").as_type(FieldType::Date))
        .build()
}

pub fn tags() -> Table {
    Table::builder("tags")
        .autoincrement(false)
        .define_field(FieldDef::new("label", ""))
        .build()
}

pub fn text(s: &str) -> Value {
    Value::from_text(s)
}

/// A connection that records statements and answers from a script.
///
/// Every `execute` reports `affected` rows; every `query` returns `rows`.
#[derive(Default)]
pub struct Scripted {
    pub affected: u64,
    pub rows: Vec<Record>,
    pub fail_execute: bool,
    pub log: Mutex<Vec<String>>,
}

impl Scripted {
    pub fn affecting(affected: u64) -> Self {
        Self {
            affected,
            ..Self::default()
        }
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl Connection for Scripted {
    async fn execute(&self, sql: &str) -> Result<u64> {
        self.log.lock().unwrap().push(sql.to_string());
        if self.fail_execute && sql.starts_with("INSERT") {
            return Err(oxide_table::TableError::Connection(String::from(
                "scripted failure",
            )));
        }
        Ok(self.affected)
    }

    async fn query(&self, sql: &str) -> Result<Vec<Record>> {
        self.log.lock().unwrap().push(sql.to_string());
        Ok(self.rows.clone())
    }

    async fn last_insert_id(&self) -> Result<i64> {
        Ok(0)
    }
}
