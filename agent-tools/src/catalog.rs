//! Registry input: module keys mapped to ordered tool records.
//!
//! A catalog can be parsed from a JSON object (document key order is kept),
//! assembled in code, or collected from [`ToolModule`] descriptors that crates
//! register at link time with [`inventory::submit!`].

use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Records owned by one module.
#[derive(Clone, Debug, PartialEq)]
pub struct CatalogModule {
    name: String,
    records: Vec<Value>,
}

impl CatalogModule {
    /// Module key.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw records in declaration order.
    #[must_use]
    pub fn records(&self) -> &[Value] {
        &self.records
    }
}

/// Ordered mapping from module key to raw tool records.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolCatalog {
    modules: Vec<CatalogModule>,
}

impl ToolCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a module with its records.
    #[must_use]
    pub fn with_module(mut self, name: impl Into<String>, records: Vec<Value>) -> Self {
        self.push_module(name, records);
        self
    }

    /// Appends a module with its records.
    pub fn push_module(&mut self, name: impl Into<String>, records: Vec<Value>) {
        self.modules.push(CatalogModule {
            name: name.into(),
            records,
        });
    }

    /// Appends every module of `other`, keeping its order.
    pub fn extend(&mut self, other: ToolCatalog) {
        self.modules.extend(other.modules);
    }

    /// Modules in insertion order.
    #[must_use]
    pub fn modules(&self) -> &[CatalogModule] {
        &self.modules
    }

    /// Total number of records across modules.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.modules.iter().map(|module| module.records.len()).sum()
    }

    /// Returns `true` when no module is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Parses a catalog from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] when the text is not an object whose
    /// values are arrays.
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Collects every [`ToolModule`] linked into the binary, ordered by module name.
    #[must_use]
    pub fn linked() -> Self {
        let mut descriptors: Vec<&ToolModule> = inventory::iter::<ToolModule>.into_iter().collect();
        descriptors.sort_by_key(|descriptor| descriptor.name);

        let mut catalog = Self::new();
        for descriptor in descriptors {
            catalog.push_module(descriptor.name, descriptor.records());
        }
        catalog
    }
}

impl Serialize for ToolCatalog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.modules.len()))?;
        for module in &self.modules {
            map.serialize_entry(&module.name, &module.records)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ToolCatalog {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CatalogVisitor;

        impl<'de> Visitor<'de> for CatalogVisitor {
            type Value = ToolCatalog;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map from module name to a sequence of tool records")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ToolCatalog, A::Error> {
                let mut catalog = ToolCatalog::new();
                while let Some((name, records)) = access.next_entry::<String, Value>()? {
                    let Value::Array(records) = records else {
                        return Err(de::Error::custom(format!(
                            "module `{name}` must map to a sequence of tool records"
                        )));
                    };
                    catalog.push_module(name, records);
                }
                Ok(catalog)
            }
        }

        deserializer.deserialize_map(CatalogVisitor)
    }
}

/// Link-time descriptor of a tool module.
///
/// ```ignore
/// inventory::submit! {
///     agent_tools::ToolModule::new("genomics", genomics_records)
/// }
/// ```
#[derive(Debug)]
pub struct ToolModule {
    name: &'static str,
    records: fn() -> Vec<Value>,
}

impl ToolModule {
    /// Creates a descriptor; `records` is evaluated when a catalog is collected.
    #[must_use]
    pub const fn new(name: &'static str, records: fn() -> Vec<Value>) -> Self {
        Self { name, records }
    }

    /// Module key.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Produces the module's raw records.
    #[must_use]
    pub fn records(&self) -> Vec<Value> {
        (self.records)()
    }
}

inventory::collect!(ToolModule);
