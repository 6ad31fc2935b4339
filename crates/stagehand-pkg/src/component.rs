//! Build-system input model.
//!
//! Components and component groups are the units the surrounding build
//! system hands to the packaging pass. Each one may map to at most one
//! installer package.

/// A single piece of installable content.
#[derive(Debug, Clone, Default)]
pub struct Component {
    /// Component identity within the build.
    pub name: String,

    /// Human-readable name shown by the installer.
    pub display_name: String,

    /// Longer description shown by the installer.
    pub description: String,

    /// Names of other components this one depends on. Every referenced
    /// component must be registered before this one is configured.
    pub dependencies: Vec<String>,

    /// Whether the component starts unchecked in the installer.
    pub disabled_by_default: bool,

    /// Whether the component is hidden from the installer page.
    pub hidden: bool,

    /// Whether the component cannot be deselected.
    pub required: bool,
}

/// A named collection of components.
///
/// Also serves as the transient value object synthesized by
/// group-by-name configuration; it is filled from options and discarded
/// once the package is configured.
#[derive(Debug, Clone, Default)]
pub struct ComponentGroup {
    /// Group identity within the build.
    pub name: String,

    /// Human-readable name shown by the installer.
    pub display_name: String,

    /// Longer description shown by the installer.
    pub description: String,

    /// Whether the group title is rendered bold.
    pub bold_title: bool,

    /// Whether the group starts expanded in the component tree.
    pub expanded_by_default: bool,
}

/// Split a multi-valued option into its entries.
///
/// Entries are separated by commas or semicolons; surrounding whitespace
/// is trimmed and empty entries are dropped.
#[must_use]
pub fn expand_list(value: &str) -> Vec<String> {
    value
        .split([',', ';'])
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}
