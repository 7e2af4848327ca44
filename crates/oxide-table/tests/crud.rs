//! Tests for the write pipeline against SQLite and a scripted connection.

mod common;
use common::*;

use oxide_query::{record, Record, Value};
use oxide_table::{
    Check, Connection, Criteria, FieldDef, Filter, SaveOutcome, Subject, Table,
};

#[tokio::test]
async fn autoincrement_insert_returns_generated_id() {
    let db = database().await;
    let users = users();

    let first = users
        .save(&db, None, record([("name", "Ann"), ("email", "ANN@Example.com")]), false, &Criteria::None)
        .await
        .unwrap();
    let second = users
        .insert(&db, record([("name", "Bob"), ("email", "bob@example.com")]), false)
        .await
        .unwrap();

    assert_eq!(first, SaveOutcome::Added(1));
    assert_eq!(second, SaveOutcome::Added(db.last_insert_id().await.unwrap()));
    assert_eq!(second, SaveOutcome::Added(2));

    let ann = users.load(&db, &Criteria::Id(1), &[]).await.unwrap().unwrap();
    assert_eq!(ann.get("email"), Some(&text("ann@example.com")));
    assert_eq!(ann.get("age"), Some(&Value::Int(0)));
    assert_eq!(ann.get("active"), Some(&Value::Int(1)));
}

#[tokio::test]
async fn unique_passes_on_self_match() {
    let db = database().await;
    let users = users();
    users
        .insert(&db, record([("name", "Ann"), ("email", "ann@example.com")]), false)
        .await
        .unwrap();

    let resaved = users
        .save(
            &db,
            Some(1),
            record([("name", "Ann B"), ("email", "ANN@example.com")]),
            false,
            &Criteria::None,
        )
        .await
        .unwrap();
    assert_eq!(resaved, SaveOutcome::Updated(1));

    let duplicate = users
        .insert(&db, record([("name", "Impostor"), ("email", "Ann@Example.com")]), false)
        .await
        .unwrap();
    let SaveOutcome::FailedCheck(failure) = duplicate else {
        panic!("expected a unique failure, got {duplicate:?}");
    };
    assert_eq!(failure.check, "unique");
    assert_eq!(failure.subject, Subject::from("email"));
    assert_eq!(failure.detail, Value::Int(1));
}

#[tokio::test]
async fn first_declared_check_wins() {
    let db = database().await;
    let users = users();
    users
        .insert(&db, record([("name", "Ann"), ("email", "ann@example.com")]), false)
        .await
        .unwrap();

    let outcome = users
        .insert(&db, record([("email", "ann@example.com")]), false)
        .await
        .unwrap();
    let SaveOutcome::FailedCheck(failure) = outcome else {
        panic!("expected a failed check, got {outcome:?}");
    };
    assert_eq!(failure.check, "not_empty");

    let skipped = users
        .insert(&db, record([("email", "ann@example.com")]), true)
        .await
        .unwrap();
    assert_eq!(skipped, SaveOutcome::Added(2));
}

#[tokio::test]
async fn update_outcome_follows_affected_rows() {
    let db = database().await;
    for statement in [
        "INSERT INTO tags (id, label) VALUES (5, 'a')",
        "INSERT INTO tags (id, label) VALUES (5, 'b')",
        "INSERT INTO tags (id, label) VALUES (6, 'c')",
    ] {
        db.execute(statement).await.unwrap();
    }
    let tags = tags();
    let label = || record([("label", "z")]);

    assert_eq!(
        tags.update(&db, 6, label(), false, &Criteria::None).await.unwrap(),
        SaveOutcome::Updated(6)
    );
    assert_eq!(
        tags.update(&db, 9, label(), false, &Criteria::None).await.unwrap(),
        SaveOutcome::NoChange
    );
    assert_eq!(
        tags.update(&db, 5, label(), true, &Criteria::None).await.unwrap(),
        SaveOutcome::Failed(2)
    );
}

#[tokio::test]
async fn update_outcome_with_scripted_counts() {
    let tags = tags();
    for (affected, expected) in [
        (0, SaveOutcome::NoChange),
        (1, SaveOutcome::Updated(3)),
        (4, SaveOutcome::Failed(4)),
    ] {
        let db = Scripted::affecting(affected);
        let outcome = tags
            .update(&db, 3, record([("label", "x")]), true, &Criteria::None)
            .await
            .unwrap();
        assert_eq!(outcome, expected);
        assert_eq!(
            db.log(),
            vec!["UPDATE `tags` SET `label` = 'x' WHERE `id` = 3"]
        );
    }
}

#[tokio::test]
async fn update_checks_see_the_stored_record() {
    let db = Scripted {
        affected: 1,
        rows: vec![record([
            ("id", Value::Int(2)),
            ("name", text("")),
            ("email", text("old@example.com")),
        ])],
        ..Scripted::default()
    };
    let outcome = users()
        .update(&db, 2, record([("age", 40_i64)]), false, &Criteria::None)
        .await
        .unwrap();
    let SaveOutcome::FailedCheck(failure) = outcome else {
        panic!("expected the stored empty name to fail, got {outcome:?}");
    };
    assert_eq!(failure.check, "not_empty");
    assert!(db.log().iter().all(|sql| !sql.starts_with("UPDATE")));
}

#[tokio::test]
async fn update_checks_see_the_stored_record_filtered() {
    let coupons = Table::builder("coupons")
        .define_field(
            FieldDef::new("code", Value::Null)
                .filter(Filter::EmptyToNull)
                .check(Check::NotNull),
        )
        .define_field(FieldDef::new("uses", 0_i64))
        .build();
    let db = Scripted {
        affected: 1,
        rows: vec![record([
            ("id", Value::Int(5)),
            ("code", text("")),
            ("uses", Value::Int(0)),
        ])],
        ..Scripted::default()
    };
    let outcome = coupons
        .update(&db, 5, record([("uses", 1_i64)]), false, &Criteria::None)
        .await
        .unwrap();
    let SaveOutcome::FailedCheck(failure) = outcome else {
        panic!("expected the stored empty code to be nulled and fail, got {outcome:?}");
    };
    assert_eq!(failure.check, "not_null");
    assert_eq!(failure.subject, Subject::from("code"));
    assert!(db.log().iter().all(|sql| !sql.starts_with("UPDATE")));

    let outcome = coupons
        .update(&db, 5, record([("code", "SPRING")]), false, &Criteria::None)
        .await
        .unwrap();
    assert_eq!(outcome, SaveOutcome::Updated(5));
}

#[tokio::test]
async fn criteria_restrict_updates_and_deletes() {
    let db = database().await;
    let users = users();
    users
        .insert(&db, record([("name", "Ann"), ("email", "ann@example.com")]), false)
        .await
        .unwrap();

    let inactive_only = Criteria::from("active = 0");
    assert_eq!(
        users
            .update(&db, 1, record([("age", 30_i64)]), false, &inactive_only)
            .await
            .unwrap(),
        SaveOutcome::NoChange
    );
    assert_eq!(
        users.delete(&db, 1, &inactive_only).await.unwrap(),
        SaveOutcome::NoChange
    );

    assert_eq!(
        users
            .save(&db, Some(1), Record::new(), false, &Criteria::None)
            .await
            .unwrap(),
        SaveOutcome::Deleted(1)
    );
    assert!(users.load(&db, &Criteria::Id(1), &[]).await.unwrap().is_none());
}

#[tokio::test]
async fn manual_ids_are_allocated_under_lock() {
    let db = database().await;
    let invoices = invoices();

    let first = invoices
        .insert(&db, record([("number", "A-1"), ("issued", "2024/03/05")]), false)
        .await
        .unwrap();
    let second = invoices
        .insert(&db, record([("number", "A-2")]), false)
        .await
        .unwrap();
    assert_eq!(first, SaveOutcome::Added(1));
    assert_eq!(second, SaveOutcome::Added(2));

    let stored = invoices.load_all(&db, &Criteria::None, &[]).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].get("issued"), Some(&text("2024-03-05")));
    assert_eq!(stored[1].get("issued"), Some(&text("1970-01-01")));

    // The lock was released: a new one can be taken.
    db.lock_table("invoices").await.unwrap();
    db.unlock_table("invoices").await.unwrap();
}

#[tokio::test]
async fn concurrent_manual_id_inserts_get_distinct_ids() {
    let db = database().await;
    let invoices = invoices();

    let (first, second) = tokio::join!(
        invoices.insert(&db, record([("number", "C-1")]), false),
        invoices.insert(&db, record([("number", "C-2")]), false),
    );
    let mut ids = [first.unwrap(), second.unwrap()]
        .map(|outcome| match outcome {
            SaveOutcome::Added(id) => id,
            other => panic!("expected an added row, got {other:?}"),
        });
    ids.sort_unstable();
    assert_eq!(ids, [1, 2]);

    let stored = invoices.load_all(&db, &Criteria::None, &[]).await.unwrap();
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn manual_id_insert_unlocks_after_failure() {
    let db = Scripted {
        affected: 1,
        fail_execute: true,
        ..Scripted::default()
    };
    let result = invoices().insert(&db, record([("number", "A-1")]), false).await;
    assert!(result.is_err());

    let log = db.log();
    assert_eq!(log.first().map(String::as_str), Some("LOCK TABLES `invoices` WRITE"));
    assert_eq!(
        log[1],
        "SELECT IFNULL(MAX(`id`), 0) + 1 AS next_id FROM `invoices`"
    );
    assert!(log[2].starts_with("INSERT INTO `invoices` (`id`, `number`, `issued`) VALUES (1, 'A-1'"));
    assert_eq!(log.last().map(String::as_str), Some("UNLOCK TABLES"));
}

#[tokio::test]
async fn member_of_consults_the_referenced_table() {
    let db = database().await;
    users()
        .insert(&db, record([("name", "Ann"), ("email", "ann@example.com")]), false)
        .await
        .unwrap();
    let orders = orders();

    let orphan = orders
        .insert(&db, record([("user_id", Value::Int(99)), ("total", Value::Float(5.0))]), false)
        .await
        .unwrap();
    let SaveOutcome::FailedCheck(failure) = orphan else {
        panic!("expected a member_of failure, got {orphan:?}");
    };
    assert_eq!(failure.check, "member_of");
    assert_eq!(failure.detail, Value::Int(99));

    let placed = orders
        .insert(&db, record([("user_id", Value::Int(1)), ("total", Value::from_text("12.5"))]), false)
        .await
        .unwrap();
    assert_eq!(placed, SaveOutcome::Added(1));
    let stored = orders.load(&db, &Criteria::Id(1), &[]).await.unwrap().unwrap();
    assert_eq!(stored.get("total"), Some(&Value::Float(12.5)));
}

#[tokio::test]
async fn file_backed_database_keeps_rows_across_connections() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("relate.db").display());

    let db = oxide_table::SqliteDatabase::connect(&url).await.unwrap();
    create_schema(&db).await;
    invoices()
        .insert(&db, record([("number", "B-7")]), false)
        .await
        .unwrap();
    db.pool().close().await;

    let reopened = oxide_table::SqliteDatabase::connect(&url).await.unwrap();
    let id = invoices()
        .find(&reopened, &Criteria::from(record([("number", "B-7")])))
        .await
        .unwrap();
    assert_eq!(id, Some(1));
}
