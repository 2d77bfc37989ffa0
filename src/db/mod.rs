//! Database abstraction layer for gold-runner.
//!
//! Provides a trait-based interface for database operations, allowing
//! different database backends to be used interchangeably. A [`Connector`]
//! opens one scoped [`DatabaseClient`] per target database; the engine never
//! touches a driver directly.

mod mock;
mod postgres;
mod sqlite;
mod types;

pub use mock::{MockConnector, MockStatement};
pub use postgres::{PostgresClient, PostgresConnector};
pub use sqlite::{SqliteClient, SqliteConnector};
pub use types::{QueryResult, Row, Value};

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    Postgres,
    Sqlite,
}

impl DatabaseBackend {
    /// Returns the backend as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
        }
    }

    /// Parses a backend from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Self::Postgres),
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            _ => None,
        }
    }
}

impl FromStr for DatabaseBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            format!("Invalid backend: {s}. Expected: postgres or sqlite")
        })
    }
}

impl fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live connection to one target database.
///
/// Implementations translate driver failures into `GoldError`. A driver
/// report that a statement has nothing to fetch must surface as
/// `GoldError::NoResultSet` so the engine can tell it apart from a failed
/// query.
#[async_trait]
pub trait DatabaseClient: Send {
    /// Prepares the statement and returns its ordered result column names.
    ///
    /// Returns an empty list for statements without a result set.
    async fn describe(&mut self, sql: &str) -> Result<Vec<String>>;

    /// Executes the statement and fetches every row.
    async fn fetch_rows(&mut self, sql: &str) -> Result<Vec<Row>>;

    /// Executes a statement for its side effects, returning the affected row count.
    async fn execute(&mut self, sql: &str) -> Result<u64>;

    /// Closes the connection. Later calls on a closed client fail.
    async fn close(&mut self) -> Result<()>;
}

/// Opens connections to target databases by name.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connects to the database identified by `db_id`.
    async fn connect(&self, db_id: &str) -> Result<Box<dyn DatabaseClient>>;
}

#[async_trait]
impl<C: Connector + ?Sized> Connector for Box<C> {
    async fn connect(&self, db_id: &str) -> Result<Box<dyn DatabaseClient>> {
        (**self).connect(db_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parse() {
        assert_eq!(DatabaseBackend::parse("postgres"), Some(DatabaseBackend::Postgres));
        assert_eq!(DatabaseBackend::parse("PostgreSQL"), Some(DatabaseBackend::Postgres));
        assert_eq!(DatabaseBackend::parse("sqlite"), Some(DatabaseBackend::Sqlite));
        assert_eq!(DatabaseBackend::parse("mysql"), None);
    }

    #[test]
    fn test_backend_from_str_error() {
        let err = "oracle".parse::<DatabaseBackend>().unwrap_err();
        assert!(err.contains("Expected: postgres or sqlite"));
    }

    #[test]
    fn test_backend_display() {
        assert_eq!(DatabaseBackend::Postgres.to_string(), "postgres");
        assert_eq!(DatabaseBackend::Sqlite.to_string(), "sqlite");
    }
}
