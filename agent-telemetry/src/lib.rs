//! Observability utilities for the agent workbench.

#![warn(missing_docs, clippy::pedantic)]

pub mod tracing_support;

pub use tracing_support::init;
