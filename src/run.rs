//! Run driver.
//!
//! Walks the catalog in order, validates each record, hands valid ones to
//! the engine and records the outcome. The results artifact is written once,
//! after the whole catalog has been processed.

use crate::catalog::{self, QuestionRecord};
use crate::config::ServerConfig;
use crate::db::{Connector, DatabaseBackend, PostgresConnector, SqliteConnector};
use crate::engine::QueryEngine;
use crate::error::{GoldError, Result};
use crate::results::{self, GoldEntry, ResultsMapping};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

/// Default catalog path.
pub const DEFAULT_QUESTIONS_PATH: &str = "combined_questions.json";
/// Default results artifact path.
pub const DEFAULT_OUTPUT_PATH: &str = "gold_results.json";

/// Counts of how each record was handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Results of one pass over the catalog.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub results: ResultsMapping,
    pub summary: RunSummary,
}

/// Resolved settings for an `execute` run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub questions: PathBuf,
    pub output: PathBuf,
    pub backend: BackendSettings,
    pub query_timeout: Option<Duration>,
}

/// Backend selection with the settings it needs.
#[derive(Debug, Clone)]
pub enum BackendSettings {
    Postgres(ServerConfig),
    Sqlite { dir: PathBuf },
}

impl BackendSettings {
    pub fn kind(&self) -> DatabaseBackend {
        match self {
            Self::Postgres(_) => DatabaseBackend::Postgres,
            Self::Sqlite { .. } => DatabaseBackend::Sqlite,
        }
    }

    fn connector(&self) -> Box<dyn Connector> {
        match self {
            Self::Postgres(config) => Box::new(PostgresConnector::new(config.clone())),
            Self::Sqlite { dir } => Box::new(SqliteConnector::new(dir.clone())),
        }
    }
}

/// Processes every record in catalog order.
///
/// Records missing a required field are skipped without an entry. Records
/// whose query fails get an error entry. Nothing here aborts the run.
pub async fn run_catalog<C: Connector>(engine: &QueryEngine<C>, records: &[Value]) -> RunReport {
    let mut report = RunReport::default();
    let total = records.len();

    for (position, raw) in records.iter().enumerate() {
        let record = match QuestionRecord::from_value(raw) {
            Ok(record) => record,
            Err(e) => {
                warn!("[{}/{total}] Skipping record: {e}", position + 1);
                report.summary.skipped += 1;
                continue;
            }
        };

        report.summary.processed += 1;

        let entry = match engine.execute(&record.db_id, &record.gold_sql).await {
            Ok(result) => {
                info!(
                    "[{}/{total}] {} on {}: {} columns, {} rows",
                    position + 1,
                    record.question_id,
                    record.db_id,
                    result.columns.len(),
                    result.row_count()
                );
                report.summary.succeeded += 1;
                GoldEntry::Success(result)
            }
            Err(e) => {
                error!(
                    "[{}/{total}] {} on {} failed: {e}",
                    position + 1,
                    record.question_id,
                    record.db_id
                );
                report.summary.failed += 1;
                GoldEntry::failed_on(&record.db_id)
            }
        };

        if report.results.insert(record.question_id.clone(), entry).is_some() {
            warn!(
                "Duplicate question_id {}; keeping the latest result",
                record.question_id
            );
        }
    }

    report
}

/// Loads the catalog, executes every gold query and writes the artifact.
pub async fn execute_gold_queries(settings: &RunSettings) -> Result<RunSummary> {
    let records = catalog::load_catalog(&settings.questions)?;

    let engine =
        QueryEngine::new(settings.backend.connector()).with_timeout(settings.query_timeout);

    info!(
        "Executing {} gold queries ({} backend)",
        records.len(),
        settings.backend.kind()
    );

    let report = run_catalog(&engine, &records).await;
    let summary = report.summary;

    info!(
        "Processed {} questions: {} succeeded, {} failed, {} skipped",
        summary.processed, summary.succeeded, summary.failed, summary.skipped
    );

    results::write_json(&settings.output, &report.results)?;
    info!(
        "Wrote {} results to {}",
        report.results.len(),
        settings.output.display()
    );

    Ok(summary)
}

/// Combines per-database question files into one catalog file.
pub fn combine_catalog(input_dir: &std::path::Path, output: &std::path::Path) -> Result<usize> {
    let combined = catalog::combine_question_files(input_dir)?;
    if combined.is_empty() {
        return Err(GoldError::catalog(format!(
            "No question files found in {}",
            input_dir.display()
        )));
    }

    results::write_json(output, &combined)?;
    info!("Wrote {} questions to {}", combined.len(), output.display());
    Ok(combined.len())
}
