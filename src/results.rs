//! Results mapping and the JSON artifact writer.
//!
//! The mapping is keyed by question id and keeps first-insertion order so
//! that output files are deterministic and diffable between runs.

use crate::db::QueryResult;
use crate::error::{GoldError, Result};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Indentation used for every JSON artifact.
const INDENT: &[u8] = b"    ";

/// Outcome recorded for one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GoldEntry {
    /// The gold query ran; columns and rows were captured.
    Success(QueryResult),

    /// The gold query could not be executed.
    Failure { error: String },
}

impl GoldEntry {
    /// Builds the failure marker for a question whose query failed on `db_id`.
    pub fn failed_on(db_id: &str) -> Self {
        Self::Failure {
            error: format!("Failed to execute query on database {db_id}"),
        }
    }

    /// Returns true for failure markers.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }
}

/// Mapping from question id to its recorded outcome.
///
/// Inserting an existing id replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultsMapping {
    entries: Vec<(String, GoldEntry)>,
    index: HashMap<String, usize>,
}

impl ResultsMapping {
    /// Creates an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the entry for `question_id`.
    ///
    /// Returns the previous entry if the id was already present.
    pub fn insert(&mut self, question_id: impl Into<String>, entry: GoldEntry) -> Option<GoldEntry> {
        let question_id = question_id.into();
        match self.index.get(&question_id) {
            Some(&pos) => Some(std::mem::replace(&mut self.entries[pos].1, entry)),
            None => {
                self.index.insert(question_id.clone(), self.entries.len());
                self.entries.push((question_id, entry));
                None
            }
        }
    }

    /// Looks up the entry for `question_id`.
    pub fn get(&self, question_id: &str) -> Option<&GoldEntry> {
        self.index.get(question_id).map(|&pos| &self.entries[pos].1)
    }

    /// Returns true if `question_id` has an entry.
    pub fn contains_key(&self, question_id: &str) -> bool {
        self.index.contains_key(question_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &GoldEntry)> {
        self.entries.iter().map(|(id, entry)| (id.as_str(), entry))
    }
}

impl Serialize for ResultsMapping {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, entry) in &self.entries {
            map.serialize_entry(id, entry)?;
        }
        map.end()
    }
}

/// Renders `value` as indented JSON with non-ASCII text kept verbatim.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(INDENT);
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| GoldError::output(format!("Failed to serialize JSON: {e}")))?;
    buf.push(b'\n');
    Ok(buf)
}

/// Writes `value` to `path` in one pass. No retry is attempted on failure.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes = to_pretty_json(value)?;

    let file = File::create(path)
        .map_err(|e| GoldError::output(format!("Cannot create {}: {e}", path.display())))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(&bytes)
        .and_then(|_| writer.flush())
        .map_err(|e| GoldError::output(format!("Failed to write {}: {e}", path.display())))?;

    Ok(())
}
