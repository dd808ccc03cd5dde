//! Table creation, introspection and reading back.

mod common;

use chrono::{NaiveDate, NaiveTime};
use common::{column, dataset, engine, engine_with, raw};
use tabsql::{
    EngineConfig, Error, PrimaryKey, Select, Size, SqlType, TableDefinition, TabsqlError, Value,
    IDENTITY_COLUMN,
};

fn people() -> tabsql::Dataset {
    dataset(
        ["id", "name", "score"],
        vec![
            [Value::from(3), Value::from("ann"), Value::from(1.5)],
            [Value::from(1), Value::from("bob"), Value::Null],
            [Value::from(2), Value::from("cy"), Value::from(4.0)],
        ],
    )
}

#[tokio::test]
async fn creates_from_dataset_and_reads_back() {
    let mut engine = engine().await;
    let schema = engine
        .create_table_from_dataset("people", &people(), PrimaryKey::Infer)
        .await
        .unwrap();

    assert_eq!(schema.primary_key(), vec!["id".to_string()]);
    let id = schema.column("id").unwrap();
    assert_eq!(id.sql_type, SqlType::TinyInt);
    assert!(id.not_null);
    assert_eq!(
        schema.column("name").unwrap().sql_type,
        SqlType::Varchar(Size::Chars(3))
    );
    let score = schema.column("score").unwrap();
    assert_eq!(score.sql_type, SqlType::Float);
    assert!(!score.not_null);

    let read = engine
        .select(&Select::from_table("people").order_by("id"))
        .await
        .unwrap();
    assert_eq!(read.columns(), ["id", "name", "score"]);
    assert_eq!(
        column(&read, "id"),
        vec![Value::TinyInt(1), Value::TinyInt(2), Value::TinyInt(3)]
    );
    assert_eq!(
        column(&read, "score"),
        vec![Value::Null, Value::Float(4.0), Value::Float(1.5)]
    );
}

#[tokio::test]
async fn identity_key_is_generated() {
    let mut engine = engine().await;
    let schema = engine
        .create_table_from_dataset("people", &people(), PrimaryKey::Identity)
        .await
        .unwrap();

    let identity = schema.identity().unwrap();
    assert_eq!(identity.name, IDENTITY_COLUMN);
    assert_eq!(schema.names()[0], IDENTITY_COLUMN);

    let read = engine
        .select(
            &Select::from_table("people")
                .columns([IDENTITY_COLUMN])
                .order_by(IDENTITY_COLUMN),
        )
        .await
        .unwrap();
    assert_eq!(
        column(&read, IDENTITY_COLUMN),
        vec![Value::Int(1), Value::Int(2), Value::Int(3)]
    );
}

#[tokio::test]
async fn explicit_key_column() {
    let mut engine = engine().await;
    let schema = engine
        .create_table_from_dataset("people", &people(), PrimaryKey::Column("name".into()))
        .await
        .unwrap();
    assert_eq!(schema.primary_key(), vec!["name".to_string()]);
    assert!(schema.identity().is_none());
}

#[tokio::test]
async fn no_key_requested() {
    let mut engine = engine().await;
    let schema = engine
        .create_table_from_dataset("people", &people(), PrimaryKey::None)
        .await
        .unwrap();
    assert!(schema.primary_key().is_empty());
}

#[tokio::test]
async fn key_and_identity_conflict() {
    let mut engine = engine().await;
    let definition = TableDefinition::new("t")
        .column("a", SqlType::Int)
        .primary_key("a")
        .identity("_pk");

    let err = engine.create_table(&definition).await.unwrap_err();
    assert!(
        matches!(err, TabsqlError::Core(Error::ConflictingPrimaryKey { .. })),
        "got {err:?}"
    );
    assert!(!engine.table_exists("t").await.unwrap());
}

#[tokio::test]
async fn odd_names_survive_quoting() {
    let mut engine = engine().await;
    let data = dataset(
        ["select", "has \"quotes\"", "with space"],
        vec![[Value::from(1), Value::from("x"), Value::from("y")]],
    );
    engine
        .create_table_from_dataset("drop table; --", &data, PrimaryKey::None)
        .await
        .unwrap();

    let read = engine.read_table("drop table; --").await.unwrap();
    assert_eq!(read.columns(), data.columns());
    assert_eq!(read.len(), 1);
}

#[tokio::test]
async fn missing_table() {
    let mut engine = engine().await;
    let err = engine.get_schema("nowhere").await.unwrap_err();
    assert!(matches!(
        err.as_core(),
        Some(Error::TableNotFound(table)) if table == "nowhere"
    ));
}

#[tokio::test]
async fn unsupported_types_are_all_reported() {
    let mut engine = engine().await;
    raw(&mut engine, "CREATE TABLE odd (a BLOB, b INT, c GEOMETRY)").await;

    let err = engine.get_schema("odd").await.unwrap_err();
    match err {
        TabsqlError::Core(Error::UnsupportedType { table, columns }) => {
            assert_eq!(table, "odd");
            let names: Vec<&str> = columns.iter().map(|(name, _)| name.as_str()).collect();
            assert_eq!(names, ["a", "c"]);
        }
        other => panic!("Expected UnsupportedType, got {other:?}"),
    }
    assert!(engine.table_exists("odd").await.unwrap());
}

#[tokio::test]
async fn introspects_declared_sizes() {
    let mut engine = engine().await;
    raw(
        &mut engine,
        "CREATE TABLE sized (k INTEGER PRIMARY KEY AUTOINCREMENT, a VARCHAR(10) NOT NULL, \
         b NVARCHAR(-1), c DECIMAL(9, 2))",
    )
    .await;

    let schema = engine.get_schema("sized").await.unwrap();
    assert!(schema.column("k").unwrap().is_identity);
    let a = schema.column("a").unwrap();
    assert_eq!(a.sql_type, SqlType::Varchar(Size::Chars(10)));
    assert!(a.not_null);
    assert_eq!(
        schema.column("b").unwrap().sql_type,
        SqlType::NVarchar(Size::Max)
    );
    assert_eq!(
        schema.column("c").unwrap().sql_type,
        SqlType::Decimal {
            precision: 9,
            scale: 2
        }
    );
}

#[tokio::test]
async fn temporal_columns_round_trip() {
    let mut engine = engine().await;
    let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let next = day.succ_opt().unwrap();
    let evening = next.and_hms_milli_opt(18, 30, 5, 250).unwrap();
    let data = dataset(
        ["k", "at_midnight", "mixed", "clock", "day"],
        vec![
            [
                Value::from(1),
                Value::DateTime(day.and_time(NaiveTime::MIN)),
                Value::DateTime(day.and_time(NaiveTime::MIN)),
                Value::Time(NaiveTime::MIN),
                Value::Date(day),
            ],
            [
                Value::from(2),
                Value::DateTime(next.and_time(NaiveTime::MIN)),
                Value::DateTime(evening),
                Value::Time(evening.time()),
                Value::Date(next),
            ],
        ],
    );
    let schema = engine
        .create_table_from_dataset("moments", &data, PrimaryKey::Infer)
        .await
        .unwrap();
    assert_eq!(
        schema.column("at_midnight").unwrap().sql_type,
        SqlType::DateTime2
    );
    assert_eq!(schema.column("clock").unwrap().sql_type, SqlType::Time);
    assert_eq!(schema.column("day").unwrap().sql_type, SqlType::Date);

    let read = engine
        .select(&Select::from_table("moments").order_by("k"))
        .await
        .unwrap();
    for name in ["at_midnight", "mixed", "clock", "day"] {
        assert_eq!(column(&read, name), column(&data, name), "{name}");
    }
}

#[tokio::test]
async fn rows_are_written_as_they_were_inferred() {
    let mut engine = engine().await;
    let data = dataset(
        ["a", "n"],
        vec![
            [Value::from("x"), Value::from(" 7 ")],
            [Value::from("None"), Value::from("nan")],
            [Value::from(" y "), Value::from("8")],
        ],
    );
    let schema = engine
        .create_table_from_dataset("q", &data, PrimaryKey::Identity)
        .await
        .unwrap();
    let a = schema.column("a").unwrap();
    assert_eq!(a.sql_type, SqlType::Varchar(Size::Chars(1)));
    assert!(!a.not_null);
    assert_eq!(schema.column("n").unwrap().sql_type, SqlType::TinyInt);

    let read = engine
        .select(&Select::from_table("q").order_by(IDENTITY_COLUMN))
        .await
        .unwrap();
    assert_eq!(
        column(&read, "a"),
        vec![Value::from("x"), Value::Null, Value::from("y")]
    );
    assert_eq!(
        column(&read, "n"),
        vec![Value::TinyInt(7), Value::Null, Value::TinyInt(8)]
    );
}

#[tokio::test]
async fn failed_initial_insert_drops_the_table() {
    let mut engine = engine_with(EngineConfig::default().infer_row_count(1)).await;
    let data = dataset(["a"], vec![[Value::from("x")], [Value::from("longer")]]);

    let err = engine
        .create_table_from_dataset("short", &data, PrimaryKey::None)
        .await
        .unwrap_err();
    assert!(
        matches!(
            err.as_core(),
            Some(Error::InsufficientColumnSize { columns, .. }) if columns == &["a".to_string()]
        ),
        "got {err:?}"
    );
    assert!(!engine.table_exists("short").await.unwrap());
}
