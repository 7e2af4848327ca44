//! Tests for the projection family: project, select, rename, discard and
//! prefix all express the same underlying operation.

mod common;
use common::*;

use oxide_query::{FieldExpr, QueryError};

#[test]
fn select_is_identity_projection() {
    let selected = users().select(["email", "id"]).unwrap();
    let projected = users().project([("email", "email"), ("id", "id")]).unwrap();
    assert_same_fields(&selected, &projected);
    assert_eq!(selected.to_string(), projected.to_string());
}

#[test]
fn rename_equals_projection_over_all_fields() {
    let renamed = users().rename([("email", "mail"), ("age", "years")]).unwrap();
    let projected = users()
        .project([
            ("id", "id"),
            ("name", "name"),
            ("mail", "email"),
            ("years", "age"),
        ])
        .unwrap();
    assert_same_fields(&renamed, &projected);
}

#[test]
fn discard_equals_selecting_the_rest() {
    let discarded = users().discard(["email"]).unwrap();
    let selected = users().select(["id", "name", "age"]).unwrap();
    assert_same_fields(&discarded, &selected);
}

#[test]
fn prefix_equals_renaming_every_field() {
    let prefixed = users().prefix("user_").unwrap();
    let renamed = users()
        .rename([
            ("id", "user_id"),
            ("name", "user_name"),
            ("email", "user_email"),
            ("age", "user_age"),
        ])
        .unwrap();
    assert_same_fields(&prefixed, &renamed);
}

#[test]
fn chained_projections_collapse_into_one() {
    let chained = users()
        .project([("id", "id"), ("name", "name"), ("email", "email")])
        .unwrap()
        .rename([("name", "full_name")])
        .unwrap()
        .discard(["id"])
        .unwrap();
    let direct = users()
        .project([("full_name", "name"), ("email", "email")])
        .unwrap();
    assert_same_fields(&chained, &direct);
    assert_eq!(chained.to_string(), direct.to_string());
}

#[test]
fn projection_can_duplicate_a_field() {
    let query = users().project([("id", "id"), ("key", "id")]).unwrap();
    assert_eq!(
        query.to_string(),
        "SELECT t1.`id`, t1.`id` AS `key`\nFROM `users` t1"
    );
}

#[test]
fn where_sees_renamed_fields() {
    let query = users()
        .rename([("age", "years")])
        .unwrap()
        .where_clause("years > 30")
        .unwrap();
    assert_eq!(query.where_condition(), Some("t1.`age` > 30"));

    let err = users()
        .rename([("age", "years")])
        .unwrap()
        .where_clause("`age` > 30")
        .unwrap_err();
    assert!(matches!(err, QueryError::UnresolvedField { token, .. } if token == "age"));
}

#[test]
fn defined_fields_compose() {
    let query = orders()
        .define("tax", "total * 0.2")
        .unwrap()
        .define("gross", "total + tax")
        .unwrap();
    assert_eq!(
        query.field("gross"),
        Some(&FieldExpr::defined("t1.`total` + (t1.`total` * 0.2)"))
    );
}

#[test]
fn grouped_report() {
    let report = orders()
        .define("spent", "SUM(total)")
        .unwrap()
        .define("orders", "COUNT(order_id)")
        .unwrap()
        .group_by(["user_id"])
        .unwrap()
        .select(["user_id", "spent", "orders"])
        .unwrap()
        .where_clause("spent > 100")
        .unwrap()
        .order_by(["spent", "-1"])
        .unwrap()
        .limit(10);

    assert_eq!(
        report.to_string(),
        "SELECT t1.`user_id`, t1.`spent`, t1.`orders`\n\
         FROM (\n  \
         SELECT t1.`order_id`, t1.`user_id`, t1.`total`, t1.`placed_at`, SUM(t1.`total`) AS `spent`, COUNT(t1.`order_id`) AS `orders`\n  \
         FROM `orders` t1\n  \
         GROUP BY t1.`user_id`\n\
         ) t1\n\
         WHERE t1.`spent` > 100\n\
         ORDER BY t1.`spent` DESC\n\
         LIMIT 10"
    );
}
