//! Agent workbench facade.
//!
//! Bundles the tool registry, execution sessions, configuration and logging
//! crates behind feature flags so downstream users only compile what they
//! need.

#![warn(missing_docs, clippy::pedantic)]

/// Crate version, as declared in its manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the semantic version of the workbench.
#[must_use]
pub const fn version() -> &'static str {
    VERSION
}

/// Re-export shared primitives for convenience.
pub use agent_primitives as primitives;

/// Tool discovery and parameter contracts (enabled by `tools` feature).
#[cfg(feature = "tools")]
pub use agent_tools as tools;

/// Persistent execution sessions (enabled by `repl` feature).
#[cfg(feature = "repl")]
pub use agent_repl as repl;

/// Structured logging setup (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use agent_telemetry as telemetry;

/// Configuration loading (enabled by `config` feature).
#[cfg(feature = "config")]
pub use agent_config as config;
