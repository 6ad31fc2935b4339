//! The read-only option surface consumed during package configuration.
//!
//! Options are flat string key/value pairs handed over by the surrounding
//! build tooling, either built up programmatically or loaded from a TOML
//! table. An absent key and an empty value both read as "not set"; option
//! lookups never fail.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Build-global option: installer-facing product name.
pub const PACKAGE_NAME: &str = "PACKAGE_NAME";

/// Build-global option: product description.
pub const PACKAGE_DESCRIPTION: &str = "PACKAGE_DESCRIPTION";

/// Build-global option: product version.
pub const PACKAGE_VERSION: &str = "PACKAGE_VERSION";

/// Build-global option: name of the root package in single-package mode.
pub const ROOT_NAME: &str = "ROOT_NAME";

/// Errors that can occur when loading an options table.
#[derive(Error, Debug)]
pub enum OptionsError {
    #[error("failed to read options file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse options: {0}")]
    Parse(#[from] toml::de::Error),
}

/// A flat table of build options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options {
    values: BTreeMap<String, String>,
}

impl Options {
    /// Create an empty options table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from a TOML file of string key/value pairs.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, OptionsError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse options from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is not a flat string table.
    pub fn parse(content: &str) -> Result<Self, OptionsError> {
        Ok(toml::from_str(content)?)
    }

    /// Set an option value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Look up an option. An empty value reads as unset.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Whether an option holds a truthy value (`1`, `on`, `true`, `yes`,
    /// `y`, case-insensitive). Unset options are false.
    #[must_use]
    pub fn is_on(&self, key: &str) -> bool {
        self.get(key).is_some_and(|value| {
            matches!(
                value.to_ascii_lowercase().as_str(),
                "1" | "on" | "true" | "yes" | "y"
            )
        })
    }

    /// The option key for a per-component field, e.g.
    /// `component_key("app", "VERSION")` is `COMPONENT_APP_VERSION`.
    /// The name segment is case-insensitive.
    #[must_use]
    pub fn component_key(component: &str, field: &str) -> String {
        format!("COMPONENT_{}_{field}", component.to_uppercase())
    }

    /// The option key for a per-group field, e.g.
    /// `group_key("tools", "LICENSES")` is `GROUP_TOOLS_LICENSES`.
    #[must_use]
    pub fn group_key(group: &str, field: &str) -> String {
        format!("GROUP_{}_{field}", group.to_uppercase())
    }
}
