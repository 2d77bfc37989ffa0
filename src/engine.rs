//! Query execution engine.
//!
//! Runs one gold query against one database and turns the outcome into a
//! [`QueryResult`] or an error. A fresh connection is opened per call and
//! closed before returning, whatever the outcome.

use crate::db::{Connector, DatabaseClient, QueryResult};
use crate::error::{GoldError, Result};
use std::time::Duration;
use tracing::{debug, warn};

/// Executes gold SQL through a [`Connector`].
#[derive(Debug, Clone)]
pub struct QueryEngine<C> {
    connector: C,
    query_timeout: Option<Duration>,
}

impl<C: Connector> QueryEngine<C> {
    /// Creates an engine without a per-query deadline.
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            query_timeout: None,
        }
    }

    /// Sets a deadline covering connect and execution of each query.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Executes `gold_sql` on the database named `db_id`.
    ///
    /// Errors cover connection failures, query failures, malformed rows and
    /// an expired deadline. A statement that reports columns but has nothing
    /// to fetch yields the columns with no rows.
    pub async fn execute(&self, db_id: &str, gold_sql: &str) -> Result<QueryResult> {
        match self.query_timeout {
            Some(limit) => tokio::time::timeout(limit, self.execute_scoped(db_id, gold_sql))
                .await
                .map_err(|_| GoldError::Timeout(limit))?,
            None => self.execute_scoped(db_id, gold_sql).await,
        }
    }

    async fn execute_scoped(&self, db_id: &str, gold_sql: &str) -> Result<QueryResult> {
        let mut client = self.connector.connect(db_id).await?;

        let outcome = run_statement(client.as_mut(), gold_sql).await;

        // The client is also released on drop if closing fails or the
        // deadline cancels this future.
        if let Err(e) = client.close().await {
            warn!("Failed to close connection to {db_id}: {e}");
        }

        outcome
    }
}

async fn run_statement(client: &mut dyn DatabaseClient, sql: &str) -> Result<QueryResult> {
    let columns = client.describe(sql).await?;

    if columns.is_empty() {
        let affected = client.execute(sql).await?;
        debug!("Statement without result set affected {affected} rows");
        return Ok(QueryResult::empty());
    }

    let rows = match client.fetch_rows(sql).await {
        Ok(rows) => rows,
        Err(GoldError::NoResultSet) => {
            debug!("Statement reported columns but no rows to fetch");
            Vec::new()
        }
        Err(e) => return Err(e),
    };

    if let Some((i, row)) = rows
        .iter()
        .enumerate()
        .find(|(_, row)| row.len() != columns.len())
    {
        return Err(GoldError::internal(format!(
            "row {i} has {} values but the statement has {} columns",
            row.len(),
            columns.len()
        )));
    }

    Ok(QueryResult::with_data(columns, rows))
}
