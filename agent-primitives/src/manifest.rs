//! Static description of the environment an agent driver presents as context.
//!
//! The manifest bundles the workbench version with two read-only lookup
//! tables: the datasets available to generated code and the libraries that
//! can be imported. Both tables are optional, but a table that is supplied
//! must carry at least one entry and every key and description must be
//! non-empty.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Version, dataset and library descriptions advertised to an agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawManifest")]
pub struct EnvironmentManifest {
    version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    datasets: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    libraries: Option<BTreeMap<String, String>>,
}

impl EnvironmentManifest {
    /// Starts building an [`EnvironmentManifest`].
    #[must_use]
    pub fn builder() -> EnvironmentManifestBuilder {
        EnvironmentManifestBuilder::default()
    }

    /// Returns the semantic version string of the workbench build.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the dataset description table, if one was supplied.
    #[must_use]
    pub fn datasets(&self) -> Option<&BTreeMap<String, String>> {
        self.datasets.as_ref()
    }

    /// Returns the library description table, if one was supplied.
    #[must_use]
    pub fn libraries(&self) -> Option<&BTreeMap<String, String>> {
        self.libraries.as_ref()
    }

    /// Looks up the description of a dataset.
    #[must_use]
    pub fn dataset(&self, key: &str) -> Option<&str> {
        self.datasets.as_ref()?.get(key).map(String::as_str)
    }

    /// Looks up the description of a library.
    #[must_use]
    pub fn library(&self, key: &str) -> Option<&str> {
        self.libraries.as_ref()?.get(key).map(String::as_str)
    }
}

#[derive(Deserialize)]
struct RawManifest {
    version: String,
    #[serde(default)]
    datasets: Option<BTreeMap<String, String>>,
    #[serde(default)]
    libraries: Option<BTreeMap<String, String>>,
}

impl TryFrom<RawManifest> for EnvironmentManifest {
    type Error = crate::Error;

    fn try_from(raw: RawManifest) -> crate::Result<Self> {
        let mut builder = EnvironmentManifest::builder().version(raw.version)?;
        if let Some(datasets) = raw.datasets {
            builder = builder.datasets(datasets)?;
        }
        if let Some(libraries) = raw.libraries {
            builder = builder.libraries(libraries)?;
        }
        builder.build()
    }
}

/// Builder for [`EnvironmentManifest`].
#[derive(Debug, Default)]
pub struct EnvironmentManifestBuilder {
    version: Option<String>,
    datasets: Option<BTreeMap<String, String>>,
    libraries: Option<BTreeMap<String, String>>,
}

impl EnvironmentManifestBuilder {
    /// Sets the semantic version string.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidManifest`] when the version string is empty.
    pub fn version(mut self, version: impl Into<String>) -> crate::Result<Self> {
        let version = version.into();
        if version.trim().is_empty() {
            return Err(crate::Error::InvalidManifest {
                reason: "manifest version cannot be empty".into(),
            });
        }
        self.version = Some(version);
        Ok(self)
    }

    /// Replaces the dataset description table.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidManifest`] when the table is empty or
    /// contains an empty key or description.
    pub fn datasets(mut self, datasets: BTreeMap<String, String>) -> crate::Result<Self> {
        validate_table("datasets", &datasets)?;
        self.datasets = Some(datasets);
        Ok(self)
    }

    /// Replaces the library description table.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidManifest`] when the table is empty or
    /// contains an empty key or description.
    pub fn libraries(mut self, libraries: BTreeMap<String, String>) -> crate::Result<Self> {
        validate_table("libraries", &libraries)?;
        self.libraries = Some(libraries);
        Ok(self)
    }

    /// Consumes the builder and returns the manifest.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidManifest`] if the version is missing.
    pub fn build(self) -> crate::Result<EnvironmentManifest> {
        let version = self.version.ok_or_else(|| crate::Error::InvalidManifest {
            reason: "manifest version must be provided".into(),
        })?;

        Ok(EnvironmentManifest {
            version,
            datasets: self.datasets,
            libraries: self.libraries,
        })
    }
}

fn validate_table(table: &str, entries: &BTreeMap<String, String>) -> crate::Result<()> {
    if entries.is_empty() {
        return Err(crate::Error::InvalidManifest {
            reason: format!("{table} table cannot be empty"),
        });
    }
    for (key, description) in entries {
        if key.trim().is_empty() {
            return Err(crate::Error::InvalidManifest {
                reason: format!("{table} table contains an empty key"),
            });
        }
        if description.trim().is_empty() {
            return Err(crate::Error::InvalidManifest {
                reason: format!("{table} entry `{key}` has an empty description"),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn builds_manifest() {
        let manifest = EnvironmentManifest::builder()
            .version("0.1.0")
            .unwrap()
            .datasets(table(&[("gene_info.parquet", "Gene annotations")]))
            .unwrap()
            .libraries(table(&[("numpy", "Numerical arrays"), ("pandas", "Data frames")]))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(manifest.version(), "0.1.0");
        assert_eq!(manifest.dataset("gene_info.parquet"), Some("Gene annotations"));
        assert_eq!(manifest.libraries().map(BTreeMap::len), Some(2));
        assert_eq!(manifest.library("scipy"), None);
    }

    #[test]
    fn version_is_required() {
        let result = EnvironmentManifest::builder().build();
        assert!(result.is_err());
    }

    #[test]
    fn supplied_tables_must_be_non_empty() {
        let err = EnvironmentManifest::builder()
            .datasets(BTreeMap::new())
            .expect_err("empty table");
        assert!(matches!(err, crate::Error::InvalidManifest { .. }));

        let err = EnvironmentManifest::builder()
            .libraries(table(&[("numpy", " ")]))
            .expect_err("blank description");
        assert!(matches!(err, crate::Error::InvalidManifest { ref reason } if reason.contains("numpy")));
    }
}
