//! The installer package descriptor entity.
//!
//! A [`Package`] is constructed empty, fully configured by exactly one of
//! the registry's configuration entry points, then serialized once into
//! its on-disk descriptor. Dependency edges are stored as package names
//! and resolved through the owning registry at serialization time.

use std::collections::BTreeSet;
use std::path::PathBuf;
use thiserror::Error;

/// Version used when neither a scoped nor a global version option is set.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Errors that can occur during package configuration.
#[derive(Error, Debug)]
pub enum PackageError {
    /// No component was supplied to component configuration.
    #[error("no component supplied for package configuration")]
    MissingComponent,

    /// No group was supplied to group configuration.
    #[error("no group supplied for package configuration")]
    MissingGroup,

    /// A component dependency references a component that was never
    /// registered with the registry.
    #[error("component '{component}' depends on unregistered component '{dependency}'")]
    UnknownComponent {
        component: String,
        dependency: String,
    },
}

/// A three-valued installer flag: omitted from the descriptor when unset,
/// emitted as `true`/`false` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriState {
    /// Not configured; the descriptor element is not emitted.
    #[default]
    Unset,
    True,
    False,
}

impl TriState {
    /// Lift a boolean into an explicitly-set flag.
    #[must_use]
    pub fn from_bool(value: bool) -> Self {
        if value {
            Self::True
        } else {
            Self::False
        }
    }

    /// The descriptor text for the flag, `None` when unset.
    #[must_use]
    pub fn as_str(self) -> Option<&'static str> {
        match self {
            Self::Unset => None,
            Self::True => Some("true"),
            Self::False => Some("false"),
        }
    }

    /// Whether the flag carries an explicit value.
    #[must_use]
    pub fn is_set(self) -> bool {
        self != Self::Unset
    }
}

/// One license shown by the installer: a display name and the file that
/// backs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct License {
    /// Name shown on the license page.
    pub display_name: String,

    /// Path to the license file; staged into the package's `meta/`
    /// directory during serialization.
    pub path: PathBuf,
}

impl License {
    /// Pair up a flat `[name, file, name, file, ..]` list.
    ///
    /// Returns `None` for odd-length input: a malformed pair list is not
    /// partially honored.
    #[must_use]
    pub fn pairs_from_list(items: &[String]) -> Option<Vec<Self>> {
        if items.len() % 2 != 0 {
            return None;
        }
        Some(
            items
                .chunks_exact(2)
                .map(|pair| Self {
                    display_name: pair[0].clone(),
                    path: PathBuf::from(&pair[1]),
                })
                .collect(),
        )
    }
}

/// An installable package descriptor.
///
/// All descriptive fields start unset; [`Package::default_configuration`]
/// restores that state before any configuration path runs, so stale state
/// never leaks across re-configuration.
#[derive(Debug, Clone, Default)]
pub struct Package {
    /// Package name, unique within the registry.
    pub name: String,

    /// Human-readable name; always emitted, possibly empty.
    pub display_name: String,

    /// Description; always emitted, possibly empty.
    pub description: String,

    /// Version; always emitted, possibly empty.
    pub version: String,

    /// Release date; today's date is emitted when unset.
    pub release_date: Option<String>,

    /// Installer script staged alongside the descriptor.
    pub script: Option<PathBuf>,

    /// Sorting priority within the installer's component tree.
    pub sorting_priority: Option<String>,

    /// Whether the package starts selected.
    pub default: TriState,

    /// Whether the package may not be unselected once installed.
    pub essential: TriState,

    /// Whether the package is hidden from the installer. Takes precedence
    /// over `default` in the descriptor.
    pub is_virtual: TriState,

    /// Whether installation is forced.
    pub forced_installation: TriState,

    /// Licenses in configuration order.
    pub licenses: Vec<License>,

    /// Names of packages in the registry this package depends on.
    pub dependencies: BTreeSet<String>,

    /// Names into the registry's alien table: referenced packages that are
    /// not part of the current build.
    pub alien_dependencies: BTreeSet<String>,

    /// Staging directory, derived lazily from the installer root on first
    /// serialization unless set explicitly.
    pub staging_dir: Option<PathBuf>,
}

impl Package {
    /// Create an empty, unconfigured package.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Reset every configurable field to its default.
    ///
    /// The name and an explicitly targeted staging directory survive.
    pub fn default_configuration(&mut self) {
        self.display_name.clear();
        self.description.clear();
        self.version.clear();
        self.release_date = None;
        self.script = None;
        self.sorting_priority = None;
        self.default = TriState::Unset;
        self.essential = TriState::Unset;
        self.is_virtual = TriState::Unset;
        self.forced_installation = TriState::Unset;
        self.licenses.clear();
        self.dependencies.clear();
        self.alien_dependencies.clear();
    }
}
