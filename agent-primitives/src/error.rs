//! Shared error definitions for agent primitives.

use thiserror::Error;
use uuid::Error as UuidError;

/// Result alias used throughout the workbench.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while manipulating primitive workbench types.
#[derive(Debug, Error)]
pub enum Error {
    /// The provided session identifier could not be parsed.
    #[error("invalid session id: {source}")]
    InvalidSessionId {
        /// Source parsing error from the UUID library.
        #[from]
        source: UuidError,
    },

    /// The nil UUID never names a live session.
    #[error("invalid session id: the nil uuid is reserved")]
    NilSessionId,

    /// Module identifier failed validation.
    #[error("invalid module id `{id}`: {reason}")]
    InvalidModuleId {
        /// The offending identifier string.
        id: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Environment manifest failed validation.
    #[error("invalid environment manifest: {reason}")]
    InvalidManifest {
        /// Human-readable reason for rejection.
        reason: String,
    },
}
