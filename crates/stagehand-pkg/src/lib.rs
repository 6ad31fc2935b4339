//! Package descriptor generation for the Stagehand installer toolkit.
//!
//! This crate provides:
//! - Parsing and formatting of version-constrained dependency expressions
//! - A per-run package registry tracking real packages and alien
//!   (externally referenced, locally undefined) dependency placeholders
//! - Package configuration from build components, component groups, or
//!   the build-global options in single-package mode
//! - Serialization of each package into its on-disk `package.xml`
//!   descriptor, with content-aware staging of script and license files

mod component;
mod constraint;
mod descriptor;
mod options;
mod package;
mod registry;

pub use component::{expand_list, Component, ComponentGroup};
pub use constraint::{Comparison, VersionConstraint};
pub use descriptor::{
    copy_if_different, DescriptorError, DESCRIPTOR_FILE, META_DIR, PACKAGES_DIR,
};
pub use options::{
    Options, OptionsError, PACKAGE_DESCRIPTION, PACKAGE_NAME, PACKAGE_VERSION, ROOT_NAME,
};
pub use package::{License, Package, PackageError, TriState, DEFAULT_VERSION};
pub use registry::PackageRegistry;
