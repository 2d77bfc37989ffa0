//! Question catalog loading and validation.
//!
//! A catalog is a JSON array of question records. Only `question_id`,
//! `db_id` and `gold_sql` are read; other fields are ignored. Per-database
//! question files can be combined into a single catalog with
//! [`combine_question_files`].

use crate::error::{GoldError, Result};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Field holding the question identifier.
pub const QUESTION_ID: &str = "question_id";
/// Field naming the target database.
pub const DB_ID: &str = "db_id";
/// Field holding the gold SQL text.
pub const GOLD_SQL: &str = "gold_sql";

/// A validated benchmark question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionRecord {
    pub question_id: String,
    pub db_id: String,
    pub gold_sql: String,
}

/// A raw record that lacks one or more required fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordError {
    /// The record's question id, if it had a usable one.
    pub question_id: Option<String>,

    /// Names of the missing fields, in declaration order.
    pub missing: Vec<&'static str>,
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.question_id {
            Some(id) => write!(f, "question {id} is missing {}", self.missing.join(", ")),
            None => write!(f, "record is missing {}", self.missing.join(", ")),
        }
    }
}

impl std::error::Error for RecordError {}

impl QuestionRecord {
    /// Extracts a question from one catalog element.
    ///
    /// Absent, `null` and blank-string fields count as missing. A numeric
    /// `question_id` is accepted and rendered as text.
    pub fn from_value(value: &Value) -> std::result::Result<Self, RecordError> {
        let object = value.as_object();
        let field = |name: &str| object.and_then(|o| o.get(name));

        let question_id = field(QUESTION_ID).and_then(question_id_text);
        let db_id = field(DB_ID).and_then(non_empty_str);
        let gold_sql = field(GOLD_SQL).and_then(non_empty_str);

        match (question_id, db_id, gold_sql) {
            (Some(question_id), Some(db_id), Some(gold_sql)) => Ok(Self {
                question_id,
                db_id,
                gold_sql,
            }),
            (question_id, db_id, gold_sql) => {
                let mut missing = Vec::new();
                if question_id.is_none() {
                    missing.push(QUESTION_ID);
                }
                if db_id.is_none() {
                    missing.push(DB_ID);
                }
                if gold_sql.is_none() {
                    missing.push(GOLD_SQL);
                }
                Err(RecordError {
                    question_id,
                    missing,
                })
            }
        }
    }
}

fn question_id_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        other => non_empty_str(other),
    }
}

fn non_empty_str(value: &Value) -> Option<String> {
    value
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .map(String::from)
}

/// Reads the whole catalog file.
///
/// Fails if the file is absent, unreadable, not JSON, or not a JSON array.
pub fn load_catalog(path: &Path) -> Result<Vec<Value>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        GoldError::catalog(format!("Cannot read catalog {}: {e}", path.display()))
    })?;

    let records = parse_catalog(&content)
        .map_err(|e| GoldError::catalog(format!("{}: {e}", path.display())))?;

    info!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

fn parse_catalog(content: &str) -> std::result::Result<Vec<Value>, String> {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Array(records)) => Ok(records),
        Ok(other) => Err(format!(
            "expected a JSON array of question records, found {}",
            json_kind(&other)
        )),
        Err(e) => Err(format!("invalid JSON: {e}")),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Combines the per-database question files in `dir` into one catalog.
///
/// Every `*.json` file is read in file-name order and must hold an array of
/// records. Records without a `db_id` inherit the file stem, so a file named
/// `library.json` supplies questions for the `library` database.
pub fn combine_question_files(dir: &Path) -> Result<Vec<Value>> {
    let files = question_files(dir)?;
    let mut combined = Vec::new();

    for path in &files {
        let db_id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        let records = load_catalog(path)?;
        debug!("{} questions for {db_id}", records.len());

        combined.extend(records.into_iter().map(|record| with_default_db(record, &db_id)));
    }

    info!(
        "Combined {} questions from {} files",
        combined.len(),
        files.len()
    );
    Ok(combined)
}

fn question_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        GoldError::catalog(format!("Cannot read question directory {}: {e}", dir.display()))
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| GoldError::catalog(format!("{}: {e}", dir.display())))?
            .path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

fn with_default_db(record: Value, db_id: &str) -> Value {
    match record {
        Value::Object(mut object) => {
            let has_db = object.get(DB_ID).and_then(non_empty_str).is_some();
            if !has_db {
                object.insert(DB_ID.to_string(), Value::String(db_id.to_string()));
            }
            Value::Object(object)
        }
        other => other,
    }
}

/// Convenience for building catalog records in code.
pub fn record(question_id: &str, db_id: &str, gold_sql: &str) -> Value {
    let mut object = Map::new();
    object.insert(QUESTION_ID.to_string(), Value::from(question_id));
    object.insert(DB_ID.to_string(), Value::from(db_id));
    object.insert(GOLD_SQL.to_string(), Value::from(gold_sql));
    Value::Object(object)
}
