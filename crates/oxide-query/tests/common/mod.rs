#![allow(dead_code)]

use oxide_query::{Query, TableRef};

pub fn users() -> Query {
    Query::new(TableRef::new("users", ["id", "name", "email", "age"]))
}

pub fn orders() -> Query {
    Query::new(TableRef::new(
        "orders",
        ["order_id", "user_id", "total", "placed_at"],
    ))
}

pub fn profiles() -> Query {
    Query::new(TableRef::new("profiles", ["id", "name", "bio"]))
}

/// Asserts two queries expose the same fields bound to the same expressions.
pub fn assert_same_fields(left: &Query, right: &Query) {
    assert_eq!(left.field_names(), right.field_names());
    for name in left.field_names() {
        assert_eq!(
            left.field(&name),
            right.field(&name),
            "field {name} differs"
        );
    }
}
