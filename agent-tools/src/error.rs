//! Errors produced while building the registry or checking tool calls.

use std::fmt::{self, Display, Formatter};

use thiserror::Error;

/// Result alias for registry construction.
pub type RegistrationResult<T> = Result<T, RegistrationError>;

/// Position of a record inside the catalog handed to the registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordLocation {
    module: String,
    index: usize,
    name: Option<String>,
}

impl RecordLocation {
    pub(crate) fn new(module: impl Into<String>, index: usize) -> Self {
        Self {
            module: module.into(),
            index,
            name: None,
        }
    }

    pub(crate) fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Module that owns the record.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Zero-based position of the record within its module.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Tool name, when the record got far enough to declare one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl Display for RecordLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "module `{}` record #{}", self.module, self.index)?;
        if let Some(name) = &self.name {
            write!(f, " (`{name}`)")?;
        }
        Ok(())
    }
}

/// Reasons a tool catalog is rejected. Construction is atomic: any of these
/// aborts the whole registry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// Module key failed validation.
    #[error("invalid module `{module}`: {reason}")]
    InvalidModule {
        /// The offending module key.
        module: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// The same module key appeared twice in the catalog.
    #[error("module `{module}` is declared more than once")]
    DuplicateModule {
        /// The repeated module key.
        module: String,
    },

    /// A record was not a JSON object.
    #[error("{location}: record must be an object")]
    NotAnObject {
        /// Where the record sits in the catalog.
        location: RecordLocation,
    },

    /// A record has no usable `name`.
    #[error("{location}: tool name must be a non-empty string")]
    MissingName {
        /// Where the record sits in the catalog.
        location: RecordLocation,
    },

    /// A field has the wrong shape.
    #[error("{location}: field `{field}` {reason}")]
    InvalidField {
        /// Where the record sits in the catalog.
        location: RecordLocation,
        /// Name of the malformed field.
        field: &'static str,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// A parameter is listed as both required and optional.
    #[error("{location}: parameter `{parameter}` is declared as both required and optional")]
    OverlappingParameter {
        /// Where the record sits in the catalog.
        location: RecordLocation,
        /// The overlapping parameter name.
        parameter: String,
    },

    /// Tool name collided with an earlier registration.
    #[error("tool `{name}` in module `{module}` is already registered by module `{existing_module}`")]
    DuplicateTool {
        /// Name of the offending tool.
        name: String,
        /// Module of the rejected record.
        module: String,
        /// Module that registered the name first.
        existing_module: String,
    },
}

impl RegistrationError {
    /// Module the error refers to.
    #[must_use]
    pub fn module(&self) -> &str {
        match self {
            Self::InvalidModule { module, .. }
            | Self::DuplicateModule { module }
            | Self::DuplicateTool { module, .. } => module,
            Self::NotAnObject { location }
            | Self::MissingName { location }
            | Self::InvalidField { location, .. }
            | Self::OverlappingParameter { location, .. } => location.module(),
        }
    }
}

/// Arguments that do not satisfy a tool's parameter contract.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    /// Arguments were not supplied as an object.
    #[error("arguments for tool `{tool}` must be an object")]
    NotAnObject {
        /// Tool being called.
        tool: String,
    },

    /// A required parameter was omitted.
    #[error("tool `{tool}` is missing required parameter `{parameter}`")]
    MissingRequired {
        /// Tool being called.
        tool: String,
        /// The absent parameter.
        parameter: String,
    },

    /// An argument does not match any declared parameter.
    #[error("tool `{tool}` does not declare parameter `{parameter}`")]
    Unknown {
        /// Tool being called.
        tool: String,
        /// The undeclared parameter.
        parameter: String,
    },
}

/// Failure to validate a call against the registry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CallError {
    /// Requested tool does not exist.
    #[error("tool `{name}` is not registered")]
    UnknownTool {
        /// Name of the missing tool.
        name: String,
    },

    /// Tool exists but the arguments violate its contract.
    #[error(transparent)]
    Arguments(#[from] ArgumentError),
}
