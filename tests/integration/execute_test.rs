//! End-to-end execution tests against SQLite databases.

use super::common::{read_json, Workspace};
use gold_runner::catalog::QuestionRecord;
use gold_runner::error::GoldError;
use gold_runner::run::{self, RunSummary};
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn test_single_select_question() {
    let ws = Workspace::new();
    ws.create_database("dbA", "CREATE TABLE t (id INTEGER);").await;
    ws.write_catalog(&json!([
        {"question_id": "q1", "db_id": "dbA", "gold_sql": "SELECT 1 AS x"}
    ]));

    let summary = run::execute_gold_queries(&ws.settings()).await.unwrap();

    assert_eq!(ws.read_output(), json!({"q1": {"columns": ["x"], "rows": [[1]]}}));
    assert_eq!(summary.succeeded, 1);
}

#[tokio::test]
async fn test_missing_database_question() {
    let ws = Workspace::new();
    ws.write_catalog(&json!([
        {"question_id": "q2", "db_id": "missing_db", "gold_sql": "SELECT 1"}
    ]));

    let summary = run::execute_gold_queries(&ws.settings()).await.unwrap();

    assert_eq!(
        ws.read_output(),
        json!({"q2": {"error": "Failed to execute query on database missing_db"}})
    );
    assert_eq!(summary.failed, 1);
    assert!(!ws.db_dir().join("missing_db.sqlite").exists());
}

#[tokio::test]
async fn test_record_missing_db_id_is_skipped() {
    let ws = Workspace::new();
    let record = json!({"question_id": "q3", "gold_sql": "SELECT 1"});
    ws.write_catalog(&json!([record.clone()]));

    let summary = run::execute_gold_queries(&ws.settings()).await.unwrap();

    // The skip line logged for this record carries the record error text.
    let err = QuestionRecord::from_value(&record).unwrap_err();
    assert_eq!(err.to_string(), "question q3 is missing db_id");

    assert_eq!(ws.read_output(), json!({}));
    assert_eq!(
        summary,
        RunSummary {
            processed: 0,
            succeeded: 0,
            failed: 0,
            skipped: 1
        }
    );
}

#[tokio::test]
async fn test_non_finite_floats_are_written_as_strings() {
    let ws = Workspace::new();
    ws.create_database("dbA", "CREATE TABLE t (id INTEGER);").await;
    ws.write_catalog(&json!([
        {"question_id": "q1", "db_id": "dbA", "gold_sql": "SELECT 1e999 AS hi, -1e999 AS lo"}
    ]));

    run::execute_gold_queries(&ws.settings()).await.unwrap();

    assert_eq!(
        ws.read_output(),
        json!({"q1": {"columns": ["hi", "lo"], "rows": [["Infinity", "-Infinity"]]}})
    );
}

#[tokio::test]
async fn test_empty_catalog_writes_empty_object() {
    let ws = Workspace::new();
    ws.write_catalog(&json!([]));

    run::execute_gold_queries(&ws.settings()).await.unwrap();

    assert_eq!(std::fs::read_to_string(ws.output()).unwrap(), "{}\n");
}

#[tokio::test]
async fn test_mixed_catalog_with_ukrainian_data() {
    let ws = Workspace::new();
    ws.create_database(
        "library",
        "CREATE TABLE книги (id INTEGER PRIMARY KEY, назва TEXT, ціна REAL, автор TEXT);
         INSERT INTO книги VALUES (1, 'Кобзар', 250.5, 'Тарас Шевченко');
         INSERT INTO книги VALUES (2, 'Лісова пісня', 180.0, NULL);",
    )
    .await;
    ws.write_catalog(&json!([
        {
            "question_id": "lib_1",
            "db_id": "library",
            "gold_sql": "SELECT назва, автор FROM книги ORDER BY id",
            "question": "Які книги є в бібліотеці?"
        },
        {"question_id": "lib_2", "db_id": "library", "gold_sql": "SELECT * FROM журнали"},
        {"question_id": "lib_3", "db_id": "library"},
        {
            "question_id": "lib_4",
            "db_id": "library",
            "gold_sql": "SELECT id, ціна FROM книги WHERE ціна > 1000"
        },
        {"question_id": "lib_5", "db_id": "library", "gold_sql": "CREATE TABLE журнали (id INTEGER)"}
    ]));

    let summary = run::execute_gold_queries(&ws.settings()).await.unwrap();

    assert_eq!(
        ws.read_output(),
        json!({
            "lib_1": {
                "columns": ["назва", "автор"],
                "rows": [["Кобзар", "Тарас Шевченко"], ["Лісова пісня", null]]
            },
            "lib_2": {"error": "Failed to execute query on database library"},
            "lib_4": {"columns": ["id", "ціна"], "rows": []},
            "lib_5": {"columns": [], "rows": []}
        })
    );
    assert_eq!(
        summary,
        RunSummary {
            processed: 4,
            succeeded: 3,
            failed: 1,
            skipped: 1
        }
    );

    let text = std::fs::read_to_string(ws.output()).unwrap();
    assert!(text.contains("\"Тарас Шевченко\""));
    assert!(!text.contains("\\u"));
    assert!(text.starts_with("{\n    \"lib_1\""));
}

#[tokio::test]
async fn test_output_keeps_catalog_order() {
    let ws = Workspace::new();
    ws.create_database("db", "CREATE TABLE t (id INTEGER);").await;
    ws.write_catalog(&json!([
        {"question_id": "z", "db_id": "db", "gold_sql": "SELECT 1 AS a"},
        {"question_id": "a", "db_id": "db", "gold_sql": "SELECT 2 AS b"},
        {"question_id": "m", "db_id": "db", "gold_sql": "SELECT 3 AS c"}
    ]));

    run::execute_gold_queries(&ws.settings()).await.unwrap();

    let text = std::fs::read_to_string(ws.output()).unwrap();
    let z = text.find("\"z\"").unwrap();
    let a = text.find("\"a\"").unwrap();
    let m = text.find("\"m\"").unwrap();
    assert!(z < a && a < m);
}

#[tokio::test]
async fn test_every_row_matches_column_count() {
    let ws = Workspace::new();
    ws.create_database(
        "shop",
        "CREATE TABLE orders (id INTEGER, client TEXT, total REAL);
         INSERT INTO orders VALUES (1, 'Олена', 10.0), (2, 'Петро', NULL), (3, NULL, 7.25);",
    )
    .await;
    ws.write_catalog(&json!([
        {"question_id": "s1", "db_id": "shop", "gold_sql": "SELECT * FROM orders ORDER BY id"}
    ]));

    run::execute_gold_queries(&ws.settings()).await.unwrap();

    let output = ws.read_output();
    let columns = output["s1"]["columns"].as_array().unwrap();
    let rows = output["s1"]["rows"].as_array().unwrap();
    assert_eq!(columns.len(), 3);
    assert_eq!(rows.len(), 3);
    for row in rows {
        assert_eq!(row.as_array().unwrap().len(), columns.len());
    }
}

#[tokio::test]
async fn test_missing_catalog_is_fatal() {
    let ws = Workspace::new();

    let err = run::execute_gold_queries(&ws.settings()).await.unwrap_err();

    assert!(matches!(err, GoldError::Catalog(_)));
    assert!(!ws.output().exists());
}

#[tokio::test]
async fn test_malformed_catalog_is_fatal() {
    let ws = Workspace::new();
    std::fs::write(ws.questions(), r#"{"question_id": "q1"}"#).unwrap();

    let err = run::execute_gold_queries(&ws.settings()).await.unwrap_err();
    assert!(matches!(err, GoldError::Catalog(_)));
}

#[tokio::test]
async fn test_unwritable_output_is_fatal() {
    let ws = Workspace::new();
    ws.write_catalog(&json!([]));

    let mut settings = ws.settings();
    settings.output = ws.dir.path().join("missing").join("gold_results.json");

    let err = run::execute_gold_queries(&settings).await.unwrap_err();
    assert!(matches!(err, GoldError::Output(_)));
}

#[tokio::test]
async fn test_written_file_round_trips() {
    let ws = Workspace::new();
    ws.create_database(
        "geo",
        "CREATE TABLE міста (назва TEXT, населення INTEGER);
         INSERT INTO міста VALUES ('Київ', 2952301), ('Львів', 717273);",
    )
    .await;
    ws.write_catalog(&json!([
        {"question_id": "g1", "db_id": "geo", "gold_sql": "SELECT назва, населення FROM міста ORDER BY назва"}
    ]));

    run::execute_gold_queries(&ws.settings()).await.unwrap();

    let first = read_json(&ws.output());
    assert_eq!(
        first["g1"]["rows"],
        json!([["Київ", 2952301], ["Львів", 717273]])
    );
}
