//! Integration tests for gold-runner.

pub mod combine_test;
pub mod common;
pub mod execute_test;
pub mod postgres_test;
