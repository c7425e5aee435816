//! Configuration management for the agent workbench.
//!
//! [`schema`] holds the typed configuration sections and [`loader`] reads them
//! from JSON files and `WORKBENCH_*` environment variables.

#![warn(missing_docs, clippy::pedantic)]

pub mod loader;
pub mod schema;

pub use schema::{InterpreterConfig, LogFormat, LoggingConfig, RuntimeConfig, SessionConfig};
