//! Mock database connector for testing.
//!
//! Provides scripted in-memory databases so the engine and run driver can be
//! exercised without a server, including driver behaviors that are hard to
//! provoke against a real database.

use super::{Connector, DatabaseClient, Row};
use crate::error::{GoldError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Scripted outcome of one SQL statement.
#[derive(Debug, Clone)]
pub enum MockStatement {
    /// A query returning the given columns and rows.
    Rows { columns: Vec<String>, rows: Vec<Row> },

    /// A statement without a result set.
    Command,

    /// A statement that reports columns but has nothing to fetch.
    NoResultSet { columns: Vec<String> },

    /// A statement that fails with the given database message.
    Fail(String),

    /// A statement that blocks for the given duration before returning no rows.
    Hang(Duration),
}

type Statements = HashMap<String, MockStatement>;

#[derive(Debug, Default)]
struct Counters {
    opened: AtomicUsize,
    closed: AtomicUsize,
}

/// A connector over scripted in-memory databases.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    databases: HashMap<String, Arc<Statements>>,
    counters: Arc<Counters>,
}

impl MockConnector {
    /// Creates a connector with no databases.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a scripted statement, creating the database if needed.
    pub fn with_statement(mut self, db_id: &str, sql: &str, statement: MockStatement) -> Self {
        let statements = self.databases.entry(db_id.to_string()).or_default();
        Arc::make_mut(statements).insert(sql.to_string(), statement);
        self
    }

    /// Number of connections opened so far.
    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    /// Number of connections closed so far.
    pub fn closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, db_id: &str) -> Result<Box<dyn DatabaseClient>> {
        let statements = self
            .databases
            .get(db_id)
            .cloned()
            .ok_or_else(|| GoldError::connection(format!("Database '{db_id}' does not exist.")))?;

        self.counters.opened.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MockClient {
            statements,
            counters: Arc::clone(&self.counters),
            open: true,
        }))
    }
}

struct MockClient {
    statements: Arc<Statements>,
    counters: Arc<Counters>,
    open: bool,
}

impl MockClient {
    fn statement(&self, sql: &str) -> Result<&MockStatement> {
        if !self.open {
            return Err(GoldError::internal("connection already closed"));
        }
        self.statements
            .get(sql)
            .ok_or_else(|| GoldError::query(format!("ERROR: syntax error at or near \"{sql}\"")))
    }
}

#[async_trait]
impl DatabaseClient for MockClient {
    async fn describe(&mut self, sql: &str) -> Result<Vec<String>> {
        match self.statement(sql)? {
            MockStatement::Rows { columns, .. } | MockStatement::NoResultSet { columns } => {
                Ok(columns.clone())
            }
            MockStatement::Command => Ok(Vec::new()),
            MockStatement::Fail(msg) => Err(GoldError::query(msg.clone())),
            MockStatement::Hang(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(Vec::new())
            }
        }
    }

    async fn fetch_rows(&mut self, sql: &str) -> Result<Vec<Row>> {
        match self.statement(sql)? {
            MockStatement::Rows { rows, .. } => Ok(rows.clone()),
            MockStatement::NoResultSet { .. } => Err(GoldError::NoResultSet),
            MockStatement::Command | MockStatement::Hang(_) => Ok(Vec::new()),
            MockStatement::Fail(msg) => Err(GoldError::query(msg.clone())),
        }
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        match self.statement(sql)? {
            MockStatement::Fail(msg) => Err(GoldError::query(msg.clone())),
            _ => Ok(0),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
