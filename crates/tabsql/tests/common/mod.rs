#![allow(dead_code)]

use tabsql::{Dataset, EngineConfig, SqliteEngine, Value};

/// Routes engine logs to the test harness once per binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("tabsql=debug")
        .with_test_writer()
        .try_init();
}

pub async fn engine() -> SqliteEngine {
    engine_with(EngineConfig::default()).await
}

pub async fn engine_with(config: EngineConfig) -> SqliteEngine {
    init_tracing();
    SqliteEngine::connect_with("sqlite::memory:", config)
        .await
        .expect("in-memory database")
}

/// Runs statements the engine does not synthesize.
pub async fn raw(engine: &mut SqliteEngine, sql: &str) {
    sqlx::raw_sql(sql)
        .execute(engine.connection())
        .await
        .unwrap_or_else(|e| panic!("Failed to run: {sql}\nError: {e:?}"));
}

pub fn dataset<const N: usize>(columns: [&str; N], rows: Vec<[Value; N]>) -> Dataset {
    Dataset::from_rows(columns, rows.into_iter().map(Vec::from).collect()).expect("valid dataset")
}

/// Values of one column, in row order.
pub fn column(dataset: &Dataset, name: &str) -> Vec<Value> {
    dataset
        .column_values(name)
        .unwrap_or_else(|| panic!("missing column {name}"))
        .cloned()
        .collect()
}
