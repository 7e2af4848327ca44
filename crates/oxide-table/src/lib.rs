//! # oxide-table
//!
//! Table descriptors and database access on top of `oxide-query`.
//!
//! This crate provides:
//! - [`Table`]: declared fields with type coercions, filters and checks,
//!   and the reads and writes that go through them
//! - [`Connection`]: the small async interface tables talk to, with
//!   helpers for common result shapes
//! - [`SqliteDatabase`]: a [`Connection`] over an sqlx SQLite pool
//! - [`tree`]: reconstruction of nested structures from sorted rows
//!
//! ## Example
//!
//! ```rust,no_run
//! use oxide_query::record;
//! use oxide_table::{Check, Criteria, FieldDef, SaveOutcome, SqliteDatabase, Table};
//! use oxide_table::Connection;
//!
//! # async fn run() -> oxide_table::Result<()> {
//! let db = SqliteDatabase::connect("sqlite::memory:").await?;
//! db.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT)").await?;
//!
//! let users = Table::builder("users")
//!     .define_field(FieldDef::new("email", "").check(Check::NotEmpty).check(Check::Unique))
//!     .build();
//!
//! let outcome = users
//!     .save(&db, None, record([("email", "ann@example.com")]), false, &Criteria::None)
//!     .await?;
//! assert_eq!(outcome, SaveOutcome::Added(1));
//!
//! let ann = users.load(&db, &Criteria::Id(1), &[]).await?;
//! assert!(ann.is_some());
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod sqlite;
pub mod table;
pub mod tree;

pub use connection::Connection;
pub use error::{Result, TableError};
pub use sqlite::SqliteDatabase;
pub use table::{
    Check, CheckDecl, CheckFailure, Criteria, FieldDef, FieldSpec, FieldType, Filter,
    SaveOutcome, Subject, Table, TableBuilder,
};
pub use tree::{Container, Level, Node, Program};
