//! # oxide-query
//!
//! Relational query composition over SQL expression fragments.
//!
//! This crate provides:
//! - A total, byte-preserving tokenizer for SQL fragments
//! - Resolution of field names into qualified column references
//! - An immutable query algebra: projection, renaming, filtering, computed
//!   fields, grouping, ordering, pagination, joins and natural joins
//! - Rendering of composed queries to SQL text
//!
//! ## Composing queries
//!
//! Callers only ever talk about a query's *fields*; which table or
//! subquery a field comes from is tracked for them:
//!
//! ```rust
//! use oxide_query::{Query, TableRef};
//!
//! let users = Query::new(TableRef::new("users", ["id", "name"]));
//! let orders = Query::new(TableRef::new("orders", ["order_id", "user_id", "total"]));
//!
//! let big_spenders = users
//!     .join(orders.where_clause("total > 100").unwrap(), "id = user_id")
//!     .unwrap()
//!     .select(["name", "total"])
//!     .unwrap();
//!
//! assert_eq!(
//!     big_spenders.to_string(),
//!     "SELECT t1.`name`, t2.`total`\n\
//!      FROM `users` t1\n\
//!      JOIN `orders` t2 ON t1.`id` = t2.`user_id`\n\
//!      WHERE t2.`total` > 100"
//! );
//! ```

pub mod error;
pub mod lexer;
pub mod query;
pub mod value;

pub use error::{QueryError, Result};
pub use lexer::{tokenize, Token, TokenKind};
pub use query::resolve::{remap, resolve};
pub use query::{
    contains_aggregate, AliasMap, Direction, FieldExpr, JoinKind, Query, Relation, Source,
    TableRef,
};
pub use value::{escape, quote, record, Record, ToValue, Value};
