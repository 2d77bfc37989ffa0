//! Error types for gold-runner.
//!
//! Defines the main error enum used throughout the application.

use std::time::Duration;
use thiserror::Error;

/// Main error type for gold-runner operations.
#[derive(Error, Debug)]
pub enum GoldError {
    /// Missing or invalid connection settings.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The question catalog is absent or malformed.
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Database connection errors (host unreachable, auth failed, unknown database, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution errors (syntax errors, missing relations, type mismatches, etc.)
    #[error("Query error: {0}")]
    Query(String),

    /// The driver reported that the statement has no result set to fetch.
    ///
    /// Only the engine interprets this variant; it is normalized to an empty row list.
    #[error("No result set to fetch")]
    NoResultSet,

    /// The per-query deadline expired.
    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    /// The results artifact could not be written.
    #[error("Output error: {0}")]
    Output(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GoldError {
    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a catalog error with the given message.
    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog(msg.into())
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates an output error with the given message.
    pub fn output(msg: impl Into<String>) -> Self {
        Self::Output(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "Configuration Error",
            Self::Catalog(_) => "Catalog Error",
            Self::Connection(_) => "Connection Error",
            Self::Query(_) | Self::NoResultSet => "Query Error",
            Self::Timeout(_) => "Timeout Error",
            Self::Output(_) => "Output Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using GoldError.
pub type Result<T> = std::result::Result<T, GoldError>;
