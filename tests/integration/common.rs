//! Shared fixtures for integration tests.

use gold_runner::run::{BackendSettings, RunSettings};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::Connection;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A scratch workspace with a database directory, catalog and output paths.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("dbs")).unwrap();
        Self { dir }
    }

    pub fn db_dir(&self) -> PathBuf {
        self.dir.path().join("dbs")
    }

    pub fn questions(&self) -> PathBuf {
        self.dir.path().join("combined_questions.json")
    }

    pub fn output(&self) -> PathBuf {
        self.dir.path().join("gold_results.json")
    }

    /// Creates `<db_id>.sqlite` and runs `setup` against it.
    pub async fn create_database(&self, db_id: &str, setup: &str) {
        let path = self.db_dir().join(format!("{db_id}.sqlite"));
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);
        let mut conn = SqliteConnection::connect_with(&options).await.unwrap();
        sqlx::raw_sql(setup).execute(&mut conn).await.unwrap();
        conn.close().await.unwrap();
    }

    pub fn write_catalog(&self, catalog: &Value) {
        std::fs::write(self.questions(), serde_json::to_string(catalog).unwrap()).unwrap();
    }

    pub fn settings(&self) -> RunSettings {
        RunSettings {
            questions: self.questions(),
            output: self.output(),
            backend: BackendSettings::Sqlite { dir: self.db_dir() },
            query_timeout: None,
        }
    }

    pub fn read_output(&self) -> Value {
        read_json(&self.output())
    }
}

pub fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}
