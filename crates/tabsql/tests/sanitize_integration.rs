//! Identifier quoting through the engine.

mod common;

use common::engine;
use tabsql::{Error, TabsqlError};

#[tokio::test]
async fn quotes_with_doubled_quotes() {
    let mut engine = engine().await;
    let quoted = engine
        .sanitize(&["plain", "with \"quote\"", "spaces and ; semicolons"])
        .await
        .unwrap();
    assert_eq!(
        quoted,
        vec![
            "\"plain\"".to_string(),
            "\"with \"\"quote\"\"\"".to_string(),
            "\"spaces and ; semicolons\"".to_string(),
        ]
    );
}

#[tokio::test]
async fn sanitizing_twice_changes_nothing() {
    let mut engine = engine().await;
    let once = engine.sanitize(&["a\"b", "Column A"]).await.unwrap();
    let twice = engine.sanitize(&once).await.unwrap();
    assert_eq!(once, twice);
}

#[tokio::test]
async fn refuses_every_unsafe_name_at_once() {
    let mut engine = engine().await;
    let long = "x".repeat(129);
    let err = engine
        .sanitize(&["fine", "", long.as_str()])
        .await
        .unwrap_err();

    match err {
        TabsqlError::Core(Error::UnsafeIdentifier { identifiers }) => {
            assert_eq!(identifiers, vec![String::new(), long]);
        }
        other => panic!("Expected UnsafeIdentifier, got {other:?}"),
    }
}

#[tokio::test]
async fn longest_accepted_name() {
    let mut engine = engine().await;
    let name = "y".repeat(128);
    let quoted = engine.sanitize(&[name.as_str()]).await.unwrap();
    assert_eq!(quoted[0], format!("\"{name}\""));
}

#[tokio::test]
async fn empty_input_needs_no_round_trip() {
    let mut engine = engine().await;
    let none: [&str; 0] = [];
    assert!(engine.sanitize(&none).await.unwrap().is_empty());
}
