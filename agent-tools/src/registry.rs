//! Immutable registry of tool specifications.

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::ops::Range;

use agent_primitives::ModuleId;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::catalog::ToolCatalog;
use crate::error::{CallError, RegistrationError, RegistrationResult};
use crate::spec::ToolSpec;

/// Position of a tool in registry order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ToolId(usize);

impl ToolId {
    /// Returns the zero-based index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl Display for ToolId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

#[derive(Clone, Debug)]
struct ModuleEntry {
    id: ModuleId,
    range: Range<usize>,
}

/// Registry that stores tool specifications keyed by name and grouped by module.
///
/// The registry is built once from a [`ToolCatalog`] and never mutated, so a
/// shared reference can be read from any number of threads.
#[derive(Clone, Debug, Default)]
pub struct ToolRegistry {
    specs: Vec<ToolSpec>,
    by_name: HashMap<String, usize>,
    modules: Vec<ModuleEntry>,
    by_module: HashMap<ModuleId, usize>,
}

impl ToolRegistry {
    /// Validates and indexes every record of `catalog`.
    ///
    /// # Errors
    ///
    /// Returns the first [`RegistrationError`] encountered; no registry is
    /// produced in that case.
    pub fn new(catalog: ToolCatalog) -> RegistrationResult<Self> {
        let mut registry = Self::default();

        for module in catalog.modules() {
            let id = ModuleId::new(module.name()).map_err(|err| RegistrationError::InvalidModule {
                module: module.name().to_owned(),
                reason: err.to_string(),
            })?;
            if registry.by_module.contains_key(&id) {
                return Err(RegistrationError::DuplicateModule {
                    module: module.name().to_owned(),
                });
            }

            let start = registry.specs.len();
            for (index, record) in module.records().iter().enumerate() {
                let spec = ToolSpec::from_record(&id, index, record)?;
                if let Some(&existing) = registry.by_name.get(spec.name()) {
                    return Err(RegistrationError::DuplicateTool {
                        name: spec.name().to_owned(),
                        module: id.to_string(),
                        existing_module: registry.specs[existing].module().to_string(),
                    });
                }
                registry
                    .by_name
                    .insert(spec.name().to_owned(), registry.specs.len());
                registry.specs.push(spec);
            }

            registry.by_module.insert(id.clone(), registry.modules.len());
            registry.modules.push(ModuleEntry {
                id,
                range: start..registry.specs.len(),
            });
        }

        debug!(
            tools = registry.specs.len(),
            modules = registry.modules.len(),
            "tool registry constructed"
        );
        Ok(registry)
    }

    /// Builds a registry from every module linked into the binary.
    ///
    /// # Errors
    ///
    /// Propagates [`RegistrationError`] from [`ToolRegistry::new`].
    pub fn from_linked_modules() -> RegistrationResult<Self> {
        Self::new(ToolCatalog::linked())
    }

    /// Returns the spec registered under `name`, matching case-sensitively.
    #[must_use]
    pub fn get_tool_by_name(&self, name: &str) -> Option<&ToolSpec> {
        self.by_name.get(name).map(|&index| &self.specs[index])
    }

    /// Returns the spec at `id`.
    #[must_use]
    pub fn get_tool_by_id(&self, id: ToolId) -> Option<&ToolSpec> {
        self.specs.get(id.0)
    }

    /// Returns the identifier of the tool registered under `name`.
    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<ToolId> {
        self.by_name.get(name).copied().map(ToolId)
    }

    /// Lists every spec: modules in catalog order, records in module order.
    #[must_use]
    pub fn list_tools(&self) -> &[ToolSpec] {
        &self.specs
    }

    /// Lists the specs owned by `module`; empty for unknown modules.
    #[must_use]
    pub fn list_tools_by_module(&self, module: &str) -> &[ToolSpec] {
        match self.by_module.get(module) {
            Some(&entry) => &self.specs[self.modules[entry].range.clone()],
            None => &[],
        }
    }

    /// Iterates module keys in catalog order, including modules without tools.
    pub fn modules(&self) -> impl Iterator<Item = &ModuleId> + '_ {
        self.modules.iter().map(|entry| &entry.id)
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Returns `true` when no tool is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Resolves `name` and checks `arguments` against its contract.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::UnknownTool`] when no such tool exists or
    /// [`CallError::Arguments`] when the arguments violate the contract.
    pub fn validate_call(&self, name: &str, arguments: &Value) -> Result<&ToolSpec, CallError> {
        let spec = self
            .get_tool_by_name(name)
            .ok_or_else(|| CallError::UnknownTool {
                name: name.to_owned(),
            })?;
        spec.validate_arguments(arguments)?;
        Ok(spec)
    }

    /// Re-emits an equivalent catalog.
    #[must_use]
    pub fn to_catalog(&self) -> ToolCatalog {
        let mut catalog = ToolCatalog::new();
        for entry in &self.modules {
            let records = self.specs[entry.range.clone()]
                .iter()
                .map(ToolSpec::to_record)
                .collect();
            catalog.push_module(entry.id.as_str(), records);
        }
        catalog
    }
}
