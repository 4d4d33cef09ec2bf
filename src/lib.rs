//! db-sampler - turns custom SQL queries into labeled metric samples.
//!
//! This library exposes the core modules for use in integration tests.

pub mod collector;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod report;
pub mod sink;
