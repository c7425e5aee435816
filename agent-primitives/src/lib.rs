//! Core shared types for the agent workbench.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod ids;
mod manifest;
mod module;

/// Error type and result alias shared across the workbench.
pub use error::{Error, Result};
/// Unique identifier for execution sessions.
pub use ids::SessionId;
/// Environment description presented to agent drivers.
pub use manifest::{EnvironmentManifest, EnvironmentManifestBuilder};
/// Module keys grouping tool specifications.
pub use module::ModuleId;
