//! Tests for joins between composed queries.

mod common;
use common::*;

use oxide_query::{JoinKind, QueryError, Relation};

#[test]
fn natural_join_exposes_union_of_fields() {
    let joined = users().natural_join(profiles()).unwrap();
    assert_eq!(
        joined.field_names(),
        vec!["id", "name", "email", "age", "bio"]
    );
    assert_eq!(
        joined.sources()[1].condition.as_deref(),
        Some("t1.`id` = t2.`id` AND t1.`name` = t2.`name`")
    );
}

#[test]
fn natural_join_checksum() {
    let err = users()
        .natural_join_expecting(JoinKind::Inner, profiles(), &["id"])
        .unwrap_err();
    assert!(matches!(err, QueryError::JoinChecksumMismatch { .. }));
}

#[test]
fn joining_a_limited_query_nests_it() {
    let recent = orders().order_by(["placed_at", "-1"]).unwrap().limit(5);
    let joined = users().join(recent, "id = user_id").unwrap();
    assert!(matches!(joined.sources()[1].relation, Relation::Query(_)));
    assert!(joined.to_string().contains("LIMIT 5\n) t2 ON t1.`id` = t2.`user_id`"));
}

#[test]
fn joining_from_a_limited_query_wraps_the_left_side() {
    let first = users().limit(1);
    let joined = first.join(orders(), "id = user_id").unwrap();
    assert_eq!(joined.pagination(), (0, None));
    assert!(matches!(joined.sources()[0].relation, Relation::Query(_)));
    assert_eq!(joined.sources()[1].alias, "t2");
}

#[test]
fn merged_join_carries_the_right_hand_filter() {
    let adults = users().where_clause("age >= 18").unwrap();
    let joined = orders().join(adults, "user_id = id").unwrap();
    assert_eq!(joined.sources().len(), 2);
    assert_eq!(joined.where_condition(), Some("t2.`age` >= 18"));
    assert_eq!(
        joined.to_string(),
        "SELECT t1.`order_id`, t1.`user_id`, t1.`total`, t1.`placed_at`, t2.`id`, t2.`name`, t2.`email`, t2.`age`\n\
         FROM `orders` t1\n\
         JOIN `users` t2 ON t1.`user_id` = t2.`id`\n\
         WHERE t2.`age` >= 18"
    );
}

#[test]
fn multi_source_right_hand_side_is_nested() {
    let with_profiles = users().natural_join(profiles()).unwrap();
    let joined = orders().join(&with_profiles, "user_id = id").unwrap();
    assert!(matches!(joined.sources()[1].relation, Relation::Query(_)));
    assert_eq!(joined.field_names().len(), 4 + 5);
}
