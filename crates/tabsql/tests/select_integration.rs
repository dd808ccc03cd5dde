//! Filtered reads.

mod common;

use chrono::NaiveDate;
use common::{column, dataset, engine, raw};
use tabsql::{Error, PrimaryKey, Select, SqliteEngine, TabsqlError, Value};

async fn filter_table(engine: &mut SqliteEngine) {
    raw(
        engine,
        "CREATE TABLE f (id INT PRIMARY KEY, ColumnA INT, ColumnB INT, ColumnANDC VARCHAR(5));
         INSERT INTO f VALUES (1, 6, 2, 'x'), (2, 7, 2, NULL), (3, 3, 2, 'y'), (4, 9, 1, 'z');",
    )
    .await;
}

#[tokio::test]
async fn filter_with_connective_inside_a_name() {
    let mut engine = engine().await;
    filter_table(&mut engine).await;

    let rows = engine
        .select(
            &Select::from_table("f")
                .columns(["id"])
                .filter("ColumnA >5 AND ColumnB=2 and ColumnANDC IS NOT NULL"),
        )
        .await
        .unwrap();
    assert_eq!(column(&rows, "id"), vec![Value::Int(1)]);
}

#[tokio::test]
async fn or_and_quoted_values() {
    let mut engine = engine().await;
    filter_table(&mut engine).await;

    let rows = engine
        .select(
            &Select::from_table("f")
                .filter("ColumnANDC = 'z' OR ColumnANDC IS NULL")
                .order_by("id"),
        )
        .await
        .unwrap();
    assert_eq!(column(&rows, "id"), vec![Value::Int(2), Value::Int(4)]);
}

#[tokio::test]
async fn injection_attempts_are_bound_as_values() {
    let mut engine = engine().await;
    filter_table(&mut engine).await;

    let rows = engine
        .select(&Select::from_table("f").filter("ColumnANDC = 'x'' OR 1=1 --'"))
        .await
        .unwrap();
    assert!(rows.is_empty());
    assert_eq!(engine.read_table("f").await.unwrap().len(), 4);
}

#[tokio::test]
async fn order_and_limit() {
    let mut engine = engine().await;
    filter_table(&mut engine).await;

    let rows = engine
        .select(
            &Select::from_table("f")
                .columns(["ColumnA"])
                .order_by_desc("ColumnA")
                .limit(2),
        )
        .await
        .unwrap();
    assert_eq!(column(&rows, "ColumnA"), vec![Value::Int(9), Value::Int(7)]);
}

#[tokio::test]
async fn malformed_filter() {
    let mut engine = engine().await;
    filter_table(&mut engine).await;

    let err = engine
        .select(&Select::from_table("f").filter("ColumnA ~ 5"))
        .await
        .unwrap_err();
    assert!(
        matches!(err, TabsqlError::Core(Error::InvalidFilterSyntax { .. })),
        "got {err:?}"
    );
}

#[tokio::test]
async fn unknown_columns() {
    let mut engine = engine().await;
    filter_table(&mut engine).await;

    let err = engine
        .select(&Select::from_table("f").columns(["id", "nope"]))
        .await
        .unwrap_err();
    assert!(matches!(
        err.as_core(),
        Some(Error::ColumnNotFound { columns, .. }) if columns == &["nope".to_string()]
    ));
}

#[tokio::test]
async fn temporal_values_round_trip() {
    let mut engine = engine().await;
    let day = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
    let moment = day
        .and_hms_nano_opt(7, 8, 9, 123_456_700)
        .unwrap();
    let data = dataset(
        ["k", "day", "moment"],
        vec![[Value::from(1), Value::Date(day), Value::DateTime(moment)]],
    );
    engine
        .create_table_from_dataset("events", &data, PrimaryKey::Infer)
        .await
        .unwrap();

    let rows = engine
        .select(&Select::from_table("events").filter("day >= '2024-01-01'"))
        .await
        .unwrap();
    assert_eq!(column(&rows, "day"), vec![Value::Date(day)]);
    assert_eq!(column(&rows, "moment"), vec![Value::DateTime(moment)]);
}
