//! Descriptor serialization and auxiliary file staging.
//!
//! Writes each package's `meta/package.xml` descriptor and copies the
//! referenced script and license files into the staging directory. File
//! copies compare content first, so re-running generation against a stale
//! output tree does not rewrite unchanged files.

use crate::constraint::VersionConstraint;
use crate::package::Package;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use sxd_document::dom::{Document, Element};
use sxd_document::writer::format_document;
use sxd_document::Package as XmlPackage;
use thiserror::Error;

/// Directory under the install root holding all staged packages.
pub const PACKAGES_DIR: &str = "packages";

/// Metadata directory within a package's staging directory.
pub const META_DIR: &str = "meta";

/// Descriptor filename within the metadata directory.
pub const DESCRIPTOR_FILE: &str = "package.xml";

/// Errors that can occur during descriptor generation.
#[derive(Error, Debug)]
pub enum DescriptorError {
    /// The named package is not in the registry.
    #[error("package '{0}' is not registered")]
    UnknownPackage(String),

    /// The package has no staging directory and none could be derived.
    #[error("package '{0}' has no staging directory")]
    NoStagingDir(String),

    /// Writing the descriptor document failed.
    #[error("failed to write descriptor '{path}': {source}")]
    WriteDescriptor { path: PathBuf, source: io::Error },

    /// Copying a script or license file failed.
    #[error("failed to stage file '{path}': {source}")]
    StageFile { path: PathBuf, source: io::Error },
}

/// Write one package's descriptor and stage its auxiliary files.
///
/// Returns the path of the written descriptor. Element order is fixed:
/// `DisplayName`, `Description`, `Name`, `Version`, `ReleaseDate`, then
/// the optional `Script`, `Dependencies`, `Licenses`,
/// `ForcedInstallation`, `Virtual` or `Default`, `Essential` and
/// `SortingPriority`. Unset optional fields emit no element.
///
/// # Errors
///
/// Any I/O failure is fatal for this package's generation and is
/// propagated without retry.
pub fn write_package_descriptor(
    pkg: &Package,
    aliens: &BTreeMap<String, VersionConstraint>,
) -> Result<PathBuf, DescriptorError> {
    let staging = pkg
        .staging_dir
        .as_ref()
        .ok_or_else(|| DescriptorError::NoStagingDir(pkg.name.clone()))?;
    let meta = staging.join(META_DIR);
    fs::create_dir_all(&meta).map_err(|source| DescriptorError::StageFile {
        path: meta.clone(),
        source,
    })?;

    let dom = XmlPackage::new();
    let doc = dom.as_document();
    let root = doc.create_element("Package");
    doc.root().append_child(root);

    element(&doc, root, "DisplayName", &pkg.display_name);
    element(&doc, root, "Description", &pkg.description);
    element(&doc, root, "Name", &pkg.name);
    element(&doc, root, "Version", &pkg.version);
    match &pkg.release_date {
        Some(date) => element(&doc, root, "ReleaseDate", date),
        None => element(
            &doc,
            root,
            "ReleaseDate",
            &Utc::now().format("%Y-%m-%d").to_string(),
        ),
    }

    if let Some(script) = &pkg.script {
        let basename = file_name(script);
        copy_if_different(script, &meta.join(&basename))?;
        element(&doc, root, "Script", &basename);
    }

    let dependencies = dependency_closure(pkg, aliens);
    if !dependencies.is_empty() {
        let joined = dependencies
            .values()
            .cloned()
            .collect::<Vec<_>>()
            .join(",");
        element(&doc, root, "Dependencies", &joined);
    }

    if !pkg.licenses.is_empty() {
        let container = doc.create_element("Licenses");
        root.append_child(container);
        for license in &pkg.licenses {
            let basename = file_name(&license.path);
            copy_if_different(&license.path, &meta.join(&basename))?;
            let entry = doc.create_element("License");
            entry.set_attribute_value("name", &license.display_name);
            entry.set_attribute_value("file", &basename);
            container.append_child(entry);
        }
    }

    if let Some(value) = pkg.forced_installation.as_str() {
        element(&doc, root, "ForcedInstallation", value);
    }
    // Virtual takes precedence over Default; at most one is emitted.
    if let Some(value) = pkg.is_virtual.as_str() {
        element(&doc, root, "Virtual", value);
    } else if let Some(value) = pkg.default.as_str() {
        element(&doc, root, "Default", value);
    }
    if let Some(value) = pkg.essential.as_str() {
        element(&doc, root, "Essential", value);
    }
    if let Some(value) = &pkg.sorting_priority {
        element(&doc, root, "SortingPriority", value);
    }

    let path = meta.join(DESCRIPTOR_FILE);
    let mut file = fs::File::create(&path).map_err(|source| DescriptorError::WriteDescriptor {
        path: path.clone(),
        source,
    })?;
    format_document(&doc, &mut file).map_err(|source| DescriptorError::WriteDescriptor {
        path: path.clone(),
        source,
    })?;

    Ok(path)
}

/// The deduplicated, name-ordered dependency set for a package: alien
/// constraints first, then unversioned constraints synthesized from real
/// dependency names. The first entry per name wins, so an alien's
/// recorded operator and value are preserved. Map values are the
/// formatted expressions.
fn dependency_closure(
    pkg: &Package,
    aliens: &BTreeMap<String, VersionConstraint>,
) -> BTreeMap<String, String> {
    let mut closure = BTreeMap::new();
    for name in &pkg.alien_dependencies {
        let formatted = aliens
            .get(name)
            .map_or_else(|| name.clone(), ToString::to_string);
        closure.entry(name.clone()).or_insert(formatted);
    }
    for name in &pkg.dependencies {
        closure.entry(name.clone()).or_insert_with(|| name.clone());
    }
    closure
}

/// Copy `src` to `dst` only when the destination is missing or its
/// content differs. Returns whether a write happened.
///
/// # Errors
///
/// Returns an error if the source cannot be read or the destination
/// cannot be written.
pub fn copy_if_different(src: &Path, dst: &Path) -> Result<bool, DescriptorError> {
    let data = fs::read(src).map_err(|source| DescriptorError::StageFile {
        path: src.to_path_buf(),
        source,
    })?;

    if let Ok(existing) = fs::read(dst) {
        if Sha256::digest(&existing) == Sha256::digest(&data) {
            return Ok(false);
        }
    }

    fs::write(dst, &data).map_err(|source| DescriptorError::StageFile {
        path: dst.to_path_buf(),
        source,
    })?;
    Ok(true)
}

/// Append a text-valued child element.
fn element<'d>(doc: &Document<'d>, parent: Element<'d>, name: &str, value: &str) {
    let child = doc.create_element(name);
    child.append_child(doc.create_text(value));
    parent.append_child(child);
}

/// Final path component as a string; falls back to the whole path when
/// there is no filename component.
fn file_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.to_string_lossy().into_owned(),
        |name| name.to_string_lossy().into_owned(),
    )
}
