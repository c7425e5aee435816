//! Tool discovery and parameter contracts.
//!
//! A [`ToolRegistry`] is built once from a [`ToolCatalog`] (module key to
//! ordered tool records) and then answers lookups, listings and argument
//! checks. Crates contribute modules at link time through [`ToolModule`].

#![warn(missing_docs, clippy::pedantic)]

pub mod catalog;
pub mod error;
pub mod registry;
pub mod spec;

pub use catalog::{CatalogModule, ToolCatalog, ToolModule};
pub use error::{ArgumentError, CallError, RecordLocation, RegistrationError, RegistrationResult};
pub use registry::{ToolId, ToolRegistry};
pub use spec::{Parameter, ToolSpec};

#[doc(hidden)]
pub use inventory;
