//! gold-runner - executes gold-standard SQL for text-to-SQL benchmark questions.
//!
//! This library exposes the core modules for use in integration tests.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod logging;
pub mod results;
pub mod run;
