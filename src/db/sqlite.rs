//! SQLite database client implementation.
//!
//! Each `db_id` names a `<db_id>.sqlite` file inside one directory. Missing
//! files are reported as connection failures; they are never created.

use crate::db::{Connector, DatabaseClient, Row, Value};
use crate::error::{GoldError, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Column as _, Connection as _, Executor as _, Row as _, Statement as _};
use sqlx::{TypeInfo as _, ValueRef as _};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File extension of database files in the SQLite directory.
pub const SQLITE_EXTENSION: &str = "sqlite";

/// Opens SQLite database files from one directory by `db_id`.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    dir: PathBuf,
}

impl SqliteConnector {
    /// Creates a connector for the database files in `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the database file for `db_id`.
    pub fn database_path(&self, db_id: &str) -> PathBuf {
        self.dir.join(format!("{db_id}.{SQLITE_EXTENSION}"))
    }
}

#[async_trait]
impl Connector for SqliteConnector {
    async fn connect(&self, db_id: &str) -> Result<Box<dyn DatabaseClient>> {
        if db_id.contains(['/', '\\']) || db_id == ".." || db_id == "." {
            return Err(GoldError::connection(format!(
                "Invalid database name '{db_id}'"
            )));
        }

        let client = SqliteClient::open(&self.database_path(db_id)).await?;
        Ok(Box::new(client))
    }
}

/// A single SQLite connection.
#[derive(Debug)]
pub struct SqliteClient {
    conn: Option<SqliteConnection>,
}

impl SqliteClient {
    /// Opens an existing database file.
    pub async fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(GoldError::connection(format!(
                "Database file '{}' does not exist.",
                path.display()
            )));
        }

        debug!("Opening {}", path.display());

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(false);

        let conn = SqliteConnection::connect_with(&options).await.map_err(|e| {
            GoldError::connection(format!("Cannot open {}: {e}", path.display()))
        })?;

        Ok(Self { conn: Some(conn) })
    }

    fn conn(&mut self) -> Result<&mut SqliteConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| GoldError::internal("connection already closed"))
    }
}

#[async_trait]
impl DatabaseClient for SqliteClient {
    async fn describe(&mut self, sql: &str) -> Result<Vec<String>> {
        let statement = self
            .conn()?
            .prepare(sql)
            .await
            .map_err(|e| GoldError::query(format_query_error(e)))?;

        Ok(statement
            .columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect())
    }

    async fn fetch_rows(&mut self, sql: &str) -> Result<Vec<Row>> {
        let rows: Vec<SqliteRow> = sqlx::query(sql)
            .fetch_all(self.conn()?)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => GoldError::NoResultSet,
                other => GoldError::query(format_query_error(other)),
            })?;

        rows.iter().map(convert_row).collect()
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        let done = sqlx::query(sql)
            .execute(self.conn()?)
            .await
            .map_err(|e| GoldError::query(format_query_error(e)))?;

        Ok(done.rows_affected())
    }

    async fn close(&mut self) -> Result<()> {
        match self.conn.take() {
            Some(conn) => conn
                .close()
                .await
                .map_err(|e| GoldError::connection(format!("Failed to close connection: {e}"))),
            None => Ok(()),
        }
    }
}

fn convert_row(row: &SqliteRow) -> Result<Row> {
    (0..row.columns().len())
        .map(|i| convert_value(row, i))
        .collect()
}

/// SQLite is dynamically typed, so values are decoded by their storage
/// class rather than the declared column type.
fn convert_value(row: &SqliteRow, index: usize) -> Result<Value> {
    let raw = row
        .try_get_raw(index)
        .map_err(|e| GoldError::query(format!("Cannot read column {index}: {e}")))?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let storage_class = raw.type_info().name().to_string();

    let decoded = match storage_class.as_str() {
        "INTEGER" => row.try_get::<i64, _>(index).map(Value::from),
        "REAL" => row.try_get::<f64, _>(index).map(Value::from),
        "BLOB" => row.try_get::<Vec<u8>, _>(index).map(Value::from),
        _ => row.try_get::<String, _>(index).map(Value::from),
    };

    decoded.map_err(|e| {
        GoldError::query(format!(
            "Cannot decode column {index} ({storage_class}): {e}"
        ))
    })
}

fn format_query_error(error: sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) => format!("ERROR: {}", db_error.message()),
        None => error.to_string(),
    }
}
