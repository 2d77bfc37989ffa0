//! Catalog combination tests.

use super::common::{read_json, Workspace};
use gold_runner::error::GoldError;
use gold_runner::run;
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn test_combine_then_execute() {
    let ws = Workspace::new();
    let questions_dir = ws.dir.path().join("questions");
    std::fs::create_dir(&questions_dir).unwrap();

    std::fs::write(
        questions_dir.join("zoo.json"),
        r#"[{"question_id": "zoo_1", "gold_sql": "SELECT count(*) AS n FROM тварини"}]"#,
    )
    .unwrap();
    std::fs::write(
        questions_dir.join("bank.json"),
        r#"[{"question_id": "bank_1", "gold_sql": "SELECT 1 AS one"}]"#,
    )
    .unwrap();

    ws.create_database("zoo", "CREATE TABLE тварини (імʼя TEXT); INSERT INTO тварини VALUES ('Лев');")
        .await;
    ws.create_database("bank", "CREATE TABLE t (id INTEGER);").await;

    let count = run::combine_catalog(&questions_dir, &ws.questions()).unwrap();
    assert_eq!(count, 2);
    assert_eq!(
        read_json(&ws.questions()),
        json!([
            {"question_id": "bank_1", "gold_sql": "SELECT 1 AS one", "db_id": "bank"},
            {"question_id": "zoo_1", "gold_sql": "SELECT count(*) AS n FROM тварини", "db_id": "zoo"}
        ])
    );

    run::execute_gold_queries(&ws.settings()).await.unwrap();

    assert_eq!(
        ws.read_output(),
        json!({
            "bank_1": {"columns": ["one"], "rows": [[1]]},
            "zoo_1": {"columns": ["n"], "rows": [[1]]}
        })
    );
}

#[test]
fn test_combine_empty_directory_fails() {
    let ws = Workspace::new();
    let questions_dir = ws.dir.path().join("questions");
    std::fs::create_dir(&questions_dir).unwrap();

    let err = run::combine_catalog(&questions_dir, &ws.questions()).unwrap_err();
    assert!(matches!(err, GoldError::Catalog(_)));
    assert!(!ws.questions().exists());
}
