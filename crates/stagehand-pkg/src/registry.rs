//! The package registry: owning table of all packages in a generation run.
//!
//! One registry exists per generation pass. It owns every [`Package`],
//! the side table of alien dependency placeholders, and the mapping from
//! build components to their packages. It is passed explicitly into every
//! configuration and serialization call; there is no ambient global state,
//! so independent runs can coexist and be tested in isolation.

use crate::component::{expand_list, Component, ComponentGroup};
use crate::constraint::VersionConstraint;
use crate::descriptor::{self, DescriptorError};
use crate::options::{
    Options, PACKAGE_DESCRIPTION, PACKAGE_NAME, PACKAGE_VERSION, ROOT_NAME,
};
use crate::package::{License, Package, PackageError, TriState, DEFAULT_VERSION};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Registry of all packages produced by one generation pass.
#[derive(Debug)]
pub struct PackageRegistry {
    options: Options,
    install_root: PathBuf,
    root_name: String,
    packages: BTreeMap<String, Package>,
    aliens: BTreeMap<String, VersionConstraint>,
    component_packages: BTreeMap<String, String>,
    warnings: Vec<String>,
}

impl PackageRegistry {
    /// Create a registry for one generation pass.
    ///
    /// `install_root` is the top-level output directory; every package
    /// without an explicit staging directory is staged under
    /// `<install_root>/packages/<name>`.
    #[must_use]
    pub fn new(options: Options, install_root: impl Into<PathBuf>) -> Self {
        let root_name = options.get(ROOT_NAME).unwrap_or("root").to_string();
        Self {
            options,
            install_root: install_root.into(),
            root_name,
            packages: BTreeMap::new(),
            aliens: BTreeMap::new(),
            component_packages: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    /// The option table this registry configures packages from.
    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The top-level output directory.
    #[must_use]
    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    /// Name of the root package used in single-package mode.
    #[must_use]
    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    /// Look up a package by name.
    #[must_use]
    pub fn package(&self, name: &str) -> Option<&Package> {
        self.packages.get(name)
    }

    /// Mutable access to a package, e.g. to re-target its staging
    /// directory before generation.
    pub fn package_mut(&mut self, name: &str) -> Option<&mut Package> {
        self.packages.get_mut(name)
    }

    /// Iterate over all packages in name order.
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    /// Number of registered packages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Returns true if no packages are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Look up an alien dependency placeholder by package name.
    #[must_use]
    pub fn alien(&self, name: &str) -> Option<&VersionConstraint> {
        self.aliens.get(name)
    }

    /// The alien dependency table.
    #[must_use]
    pub fn aliens(&self) -> &BTreeMap<String, VersionConstraint> {
        &self.aliens
    }

    /// Warnings recorded during configuration.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// The package a component maps to, once registered.
    #[must_use]
    pub fn component_package(&self, component: &str) -> Option<&str> {
        self.component_packages.get(component).map(String::as_str)
    }

    /// Package name for a component: the `COMPONENT_<NAME>_NAME` option
    /// override if set, else the component name.
    #[must_use]
    pub fn component_package_name(&self, component: &Component) -> String {
        self.options
            .get(&Options::component_key(&component.name, "NAME"))
            .unwrap_or(&component.name)
            .to_string()
    }

    /// Package name for a group: the `GROUP_<NAME>_NAME` option override
    /// if set, else the group name.
    #[must_use]
    pub fn group_package_name(&self, group: &ComponentGroup) -> String {
        self.options
            .get(&Options::group_key(&group.name, "NAME"))
            .unwrap_or(&group.name)
            .to_string()
    }

    /// Register an empty package for a component and record the
    /// component-to-package association.
    ///
    /// Registration must complete for every component before any
    /// component is configured, so that build-level dependency edges can
    /// be resolved.
    pub fn add_component(&mut self, component: &Component) -> String {
        let name = self.component_package_name(component);
        self.packages
            .entry(name.clone())
            .or_insert_with(|| Package::new(&name));
        self.component_packages
            .insert(component.name.clone(), name.clone());
        name
    }

    /// Register an empty package for a group.
    pub fn add_group(&mut self, group: &ComponentGroup) -> String {
        let name = self.group_package_name(group);
        self.packages
            .entry(name.clone())
            .or_insert_with(|| Package::new(&name));
        name
    }

    /// Configure the root package for single-package mode.
    ///
    /// Display name, description and version come from the build-global
    /// options, with literal fallbacks when absent; installation is
    /// always forced. Returns the root package name.
    pub fn configure_root(&mut self) -> String {
        let name = self.root_name.clone();
        let mut pkg = self.take_for_configuration(&name);

        pkg.display_name = self
            .options
            .get(PACKAGE_NAME)
            .unwrap_or("Your package")
            .to_string();
        pkg.description = self
            .options
            .get(PACKAGE_DESCRIPTION)
            .unwrap_or("Your package description")
            .to_string();
        pkg.version = self
            .options
            .get(PACKAGE_VERSION)
            .unwrap_or(DEFAULT_VERSION)
            .to_string();
        pkg.forced_installation = TriState::True;

        self.install(pkg)
    }

    /// Configure a package from a build component.
    ///
    /// # Errors
    ///
    /// Returns an error, with no registry mutation, when no component is
    /// supplied or when a build-level dependency names a component that
    /// was never registered.
    pub fn configure_component(
        &mut self,
        component: Option<&Component>,
    ) -> Result<String, PackageError> {
        let component = component.ok_or(PackageError::MissingComponent)?;
        let name = self.component_package_name(component);

        // Resolve build-level dependency edges up front: failure here must
        // leave the registry untouched.
        let mut dependencies = BTreeSet::new();
        for dep in &component.dependencies {
            let target = self.component_packages.get(dep).cloned().ok_or_else(|| {
                PackageError::UnknownComponent {
                    component: component.name.clone(),
                    dependency: dep.clone(),
                }
            })?;
            dependencies.insert(target);
        }

        let mut pkg = self.take_for_configuration(&name);
        pkg.display_name = component.display_name.clone();
        pkg.description = component.description.clone();
        pkg.version = self.scoped_version(&Options::component_key(&component.name, "VERSION"));
        pkg.script = self
            .options
            .get(&Options::component_key(&component.name, "SCRIPT"))
            .map(PathBuf::from);
        pkg.dependencies = dependencies;

        // Installer-level dependency expressions. Entries naming a real
        // package are dropped: the real edge supersedes the expression.
        let depends = self
            .options
            .get(&Options::component_key(&component.name, "DEPENDS"))
            .map(expand_list);
        if let Some(entries) = depends {
            for entry in entries {
                let constraint = VersionConstraint::parse(&entry);
                if constraint.name == name || self.packages.contains_key(&constraint.name) {
                    continue;
                }
                let alien = constraint.name.clone();
                // First writer wins: a later constraint on the same alien
                // package does not replace the recorded one.
                self.aliens.entry(alien.clone()).or_insert(constraint);
                pkg.alien_dependencies.insert(alien);
            }
        }

        pkg.licenses = self.scoped_licenses(&Options::component_key(&component.name, "LICENSES"));
        pkg.sorting_priority = self
            .options
            .get(&Options::component_key(&component.name, "PRIORITY"))
            .map(str::to_string);
        pkg.default = TriState::from_bool(!component.disabled_by_default);
        if self
            .options
            .is_on(&Options::component_key(&component.name, "ESSENTIAL"))
        {
            pkg.essential = TriState::True;
        }
        if component.hidden {
            pkg.is_virtual = TriState::True;
        }
        pkg.forced_installation = TriState::from_bool(component.required);

        self.component_packages
            .insert(component.name.clone(), name.clone());
        Ok(self.install(pkg))
    }

    /// Configure a package from a component group.
    ///
    /// Narrower than component configuration: groups carry no dependency,
    /// essential, hidden or required semantics.
    ///
    /// # Errors
    ///
    /// Returns an error, with no registry mutation, when no group is
    /// supplied.
    pub fn configure_group(
        &mut self,
        group: Option<&ComponentGroup>,
    ) -> Result<String, PackageError> {
        let group = group.ok_or(PackageError::MissingGroup)?;
        let name = self.group_package_name(group);

        let mut pkg = self.take_for_configuration(&name);
        pkg.display_name = group.display_name.clone();
        pkg.description = group.description.clone();
        pkg.version = self.scoped_version(&Options::group_key(&group.name, "VERSION"));
        pkg.script = self
            .options
            .get(&Options::group_key(&group.name, "SCRIPT"))
            .map(PathBuf::from);
        pkg.licenses = self.scoped_licenses(&Options::group_key(&group.name, "LICENSES"));
        pkg.sorting_priority = self
            .options
            .get(&Options::group_key(&group.name, "PRIORITY"))
            .map(str::to_string);

        Ok(self.install(pkg))
    }

    /// Configure a package from a group known only by name.
    ///
    /// Synthesizes a transient [`ComponentGroup`] from the group-scoped
    /// display name, description, bold-title and expanded options, then
    /// delegates to [`PackageRegistry::configure_group`].
    ///
    /// # Errors
    ///
    /// Propagates errors from group configuration.
    pub fn configure_group_by_name(&mut self, group_name: &str) -> Result<String, PackageError> {
        let group = ComponentGroup {
            name: group_name.to_string(),
            display_name: self
                .options
                .get(&Options::group_key(group_name, "DISPLAY_NAME"))
                .unwrap_or(group_name)
                .to_string(),
            description: self
                .options
                .get(&Options::group_key(group_name, "DESCRIPTION"))
                .unwrap_or_default()
                .to_string(),
            bold_title: self
                .options
                .is_on(&Options::group_key(group_name, "BOLD_TITLE")),
            expanded_by_default: self.options.is_on(&Options::group_key(group_name, "EXPANDED")),
        };
        self.configure_group(Some(&group))
    }

    /// Serialize one package into its on-disk descriptor.
    ///
    /// The staging directory is derived from the install root on first
    /// use unless the package was explicitly re-targeted beforehand.
    ///
    /// # Errors
    ///
    /// Returns an error if the package is unknown or any file operation
    /// fails; a failed package is not retried.
    pub fn generate_package_file(&mut self, name: &str) -> Result<PathBuf, DescriptorError> {
        let pkg = self
            .packages
            .get_mut(name)
            .ok_or_else(|| DescriptorError::UnknownPackage(name.to_string()))?;

        if pkg.staging_dir.is_none() {
            pkg.staging_dir = Some(
                self.install_root
                    .join(descriptor::PACKAGES_DIR)
                    .join(&pkg.name),
            );
        }

        debug!(package = %name, "generating package descriptor");
        descriptor::write_package_descriptor(pkg, &self.aliens)
    }

    /// Serialize every registered package, in name order, once each.
    ///
    /// # Errors
    ///
    /// Stops at the first package whose generation fails.
    pub fn generate_package_files(&mut self) -> Result<(), DescriptorError> {
        let names: Vec<String> = self.packages.keys().cloned().collect();
        for name in &names {
            self.generate_package_file(name)?;
        }
        Ok(())
    }

    /// Take a package out of the table for re-configuration, resetting
    /// every configurable field first.
    fn take_for_configuration(&mut self, name: &str) -> Package {
        let mut pkg = self
            .packages
            .remove(name)
            .unwrap_or_else(|| Package::new(name));
        pkg.default_configuration();
        pkg
    }

    /// Put a configured package (back) into the table.
    fn install(&mut self, pkg: Package) -> String {
        let name = pkg.name.clone();
        self.packages.insert(name.clone(), pkg);
        name
    }

    /// Version for a scoped key, falling back to the build-global version
    /// and then to [`DEFAULT_VERSION`].
    fn scoped_version(&self, key: &str) -> String {
        self.options
            .get(key)
            .or_else(|| self.options.get(PACKAGE_VERSION))
            .unwrap_or(DEFAULT_VERSION)
            .to_string()
    }

    /// Licenses for a scoped key. An odd-length list is discarded whole
    /// and a warning recorded.
    fn scoped_licenses(&mut self, key: &str) -> Vec<License> {
        let Some(items) = self.options.get(key).map(expand_list) else {
            return Vec::new();
        };
        match License::pairs_from_list(&items) {
            Some(licenses) => licenses,
            None => {
                self.warn(format!(
                    "{key} should contain pairs of <display_name> and <file_path>"
                ));
                Vec::new()
            }
        }
    }

    fn warn(&mut self, message: String) {
        tracing::warn!("{message}");
        self.warnings.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::Comparison;

    fn component(name: &str) -> Component {
        Component {
            name: name.to_string(),
            display_name: format!("{name} display"),
            description: format!("{name} description"),
            ..Component::default()
        }
    }

    fn registry(options: Options) -> PackageRegistry {
        PackageRegistry::new(options, "/tmp/installer")
    }

    #[test]
    fn root_configuration_defaults() {
        let mut reg = registry(Options::new());
        let name = reg.configure_root();

        assert_eq!(name, "root");
        let pkg = reg.package("root").unwrap();
        assert_eq!(pkg.display_name, "Your package");
        assert_eq!(pkg.description, "Your package description");
        assert_eq!(pkg.version, "1.0.0");
        assert_eq!(pkg.forced_installation, TriState::True);
        assert!(pkg.dependencies.is_empty());
        assert!(pkg.licenses.is_empty());
    }

    #[test]
    fn root_configuration_from_options() {
        let mut options = Options::new();
        options.set(ROOT_NAME, "myapp");
        options.set(PACKAGE_NAME, "My App");
        options.set(PACKAGE_DESCRIPTION, "Does things");
        options.set(PACKAGE_VERSION, "2.5.0");

        let mut reg = registry(options);
        let name = reg.configure_root();

        assert_eq!(name, "myapp");
        let pkg = reg.package("myapp").unwrap();
        assert_eq!(pkg.display_name, "My App");
        assert_eq!(pkg.description, "Does things");
        assert_eq!(pkg.version, "2.5.0");
    }

    #[test]
    fn missing_component_is_an_error_without_mutation() {
        let mut reg = registry(Options::new());
        let err = reg.configure_component(None).unwrap_err();
        assert!(matches!(err, PackageError::MissingComponent));
        assert!(reg.is_empty());

        let err = reg.configure_group(None).unwrap_err();
        assert!(matches!(err, PackageError::MissingGroup));
        assert!(reg.is_empty());
    }

    #[test]
    fn component_configuration_copies_fields_and_flags() {
        let mut options = Options::new();
        options.set("COMPONENT_APP_ESSENTIAL", "1");
        options.set("COMPONENT_APP_PRIORITY", "10");
        options.set("COMPONENT_APP_SCRIPT", "install.qs");

        let mut reg = registry(options);
        let comp = Component {
            hidden: true,
            required: true,
            ..component("app")
        };
        reg.add_component(&comp);
        let name = reg.configure_component(Some(&comp)).unwrap();

        let pkg = reg.package(&name).unwrap();
        assert_eq!(pkg.display_name, "app display");
        assert_eq!(pkg.description, "app description");
        assert_eq!(pkg.script.as_deref(), Some(std::path::Path::new("install.qs")));
        assert_eq!(pkg.sorting_priority.as_deref(), Some("10"));
        assert_eq!(pkg.default, TriState::True);
        assert_eq!(pkg.essential, TriState::True);
        assert_eq!(pkg.is_virtual, TriState::True);
        assert_eq!(pkg.forced_installation, TriState::True);
    }

    #[test]
    fn disabled_component_defaults_to_false() {
        let mut reg = registry(Options::new());
        let comp = Component {
            disabled_by_default: true,
            ..component("app")
        };
        reg.add_component(&comp);
        reg.configure_component(Some(&comp)).unwrap();

        let pkg = reg.package("app").unwrap();
        assert_eq!(pkg.default, TriState::False);
        assert_eq!(pkg.is_virtual, TriState::Unset);
        assert_eq!(pkg.essential, TriState::Unset);
        assert_eq!(pkg.forced_installation, TriState::False);
    }

    #[test]
    fn version_fallback_chain() {
        // Component-scoped option wins.
        let mut options = Options::new();
        options.set("COMPONENT_APP_VERSION", "3.1.4");
        options.set(PACKAGE_VERSION, "2.0.0");
        let mut reg = registry(options);
        let comp = component("app");
        reg.add_component(&comp);
        reg.configure_component(Some(&comp)).unwrap();
        assert_eq!(reg.package("app").unwrap().version, "3.1.4");

        // Global version next.
        let mut options = Options::new();
        options.set(PACKAGE_VERSION, "2.0.0");
        let mut reg = registry(options);
        reg.add_component(&comp);
        reg.configure_component(Some(&comp)).unwrap();
        assert_eq!(reg.package("app").unwrap().version, "2.0.0");

        // Literal fallback last.
        let mut reg = registry(Options::new());
        reg.add_component(&comp);
        reg.configure_component(Some(&comp)).unwrap();
        assert_eq!(reg.package("app").unwrap().version, "1.0.0");
    }

    #[test]
    fn build_level_dependencies_resolve_through_component_map() {
        let mut options = Options::new();
        options.set("COMPONENT_BASE_NAME", "base-pkg");
        let mut reg = registry(options);

        let base = component("base");
        let app = Component {
            dependencies: vec!["base".to_string()],
            ..component("app")
        };
        reg.add_component(&base);
        reg.add_component(&app);
        reg.configure_component(Some(&base)).unwrap();
        reg.configure_component(Some(&app)).unwrap();

        // The renamed package, not the component identity, is the edge.
        let pkg = reg.package("app").unwrap();
        assert!(pkg.dependencies.contains("base-pkg"));
        assert_eq!(reg.component_package("base"), Some("base-pkg"));
    }

    #[test]
    fn unknown_component_dependency_is_an_error() {
        let mut reg = registry(Options::new());
        let app = Component {
            dependencies: vec!["ghost".to_string()],
            ..component("app")
        };
        reg.add_component(&app);
        let err = reg.configure_component(Some(&app)).unwrap_err();
        assert!(matches!(err, PackageError::UnknownComponent { .. }));
    }

    #[test]
    fn alien_dependencies_first_writer_wins() {
        let mut options = Options::new();
        options.set("COMPONENT_A_DEPENDS", "extlib>=2.0");
        options.set("COMPONENT_B_DEPENDS", "extlib>=3.0");
        let mut reg = registry(options);

        let a = component("a");
        let b = component("b");
        reg.add_component(&a);
        reg.add_component(&b);
        reg.configure_component(Some(&a)).unwrap();
        reg.configure_component(Some(&b)).unwrap();

        // Both packages reference the one recorded constraint.
        assert!(reg.package("a").unwrap().alien_dependencies.contains("extlib"));
        assert!(reg.package("b").unwrap().alien_dependencies.contains("extlib"));

        let alien = reg.alien("extlib").unwrap();
        assert_eq!(alien.comparison, Comparison::GreaterOrEqual);
        assert_eq!(alien.value, "2.0");
        assert_eq!(reg.aliens().len(), 1);
    }

    #[test]
    fn depends_on_real_package_is_dropped() {
        let mut options = Options::new();
        options.set("COMPONENT_APP_DEPENDS", "base>=9.9");
        let mut reg = registry(options);

        let base = component("base");
        let app = Component {
            dependencies: vec!["base".to_string()],
            ..component("app")
        };
        reg.add_component(&base);
        reg.add_component(&app);
        reg.configure_component(Some(&base)).unwrap();
        reg.configure_component(Some(&app)).unwrap();

        // The real edge supersedes the constrained expression; no alien
        // placeholder is created.
        let pkg = reg.package("app").unwrap();
        assert!(pkg.dependencies.contains("base"));
        assert!(pkg.alien_dependencies.is_empty());
        assert!(reg.alien("base").is_none());
    }

    #[test]
    fn odd_license_list_is_discarded_with_warning() {
        let mut options = Options::new();
        options.set("COMPONENT_APP_LICENSES", "A,a.txt,B");
        let mut reg = registry(options);
        let comp = component("app");
        reg.add_component(&comp);
        reg.configure_component(Some(&comp)).unwrap();

        assert!(reg.package("app").unwrap().licenses.is_empty());
        assert_eq!(reg.warnings().len(), 1);
        assert!(reg.warnings()[0].contains("COMPONENT_APP_LICENSES"));
    }

    #[test]
    fn even_license_list_is_retained() {
        let mut options = Options::new();
        options.set("COMPONENT_APP_LICENSES", "A,a.txt,B,b.txt");
        let mut reg = registry(options);
        let comp = component("app");
        reg.add_component(&comp);
        reg.configure_component(Some(&comp)).unwrap();

        let licenses = &reg.package("app").unwrap().licenses;
        assert_eq!(licenses.len(), 2);
        assert_eq!(licenses[0].display_name, "A");
        assert_eq!(licenses[1].display_name, "B");
        assert!(reg.warnings().is_empty());
    }

    #[test]
    fn group_configuration_is_narrow() {
        let mut options = Options::new();
        options.set("GROUP_TOOLS_VERSION", "0.9");
        options.set("GROUP_TOOLS_PRIORITY", "5");
        let mut reg = registry(options);

        let group = ComponentGroup {
            name: "tools".to_string(),
            display_name: "Tools".to_string(),
            description: "Extra tools".to_string(),
            ..ComponentGroup::default()
        };
        let name = reg.configure_group(Some(&group)).unwrap();

        let pkg = reg.package(&name).unwrap();
        assert_eq!(pkg.display_name, "Tools");
        assert_eq!(pkg.version, "0.9");
        assert_eq!(pkg.sorting_priority.as_deref(), Some("5"));
        // No dependency or flag handling for groups.
        assert!(pkg.dependencies.is_empty());
        assert_eq!(pkg.default, TriState::Unset);
        assert_eq!(pkg.forced_installation, TriState::Unset);
    }

    #[test]
    fn group_by_name_synthesizes_from_options() {
        let mut options = Options::new();
        options.set("GROUP_TOOLS_DISPLAY_NAME", "Tooling");
        options.set("GROUP_TOOLS_DESCRIPTION", "All the tools");
        options.set("GROUP_TOOLS_BOLD_TITLE", "on");
        let mut reg = registry(options);

        let name = reg.configure_group_by_name("tools").unwrap();
        assert_eq!(name, "tools");
        let pkg = reg.package("tools").unwrap();
        assert_eq!(pkg.display_name, "Tooling");
        assert_eq!(pkg.description, "All the tools");
    }

    #[test]
    fn group_by_name_falls_back_to_group_name() {
        let mut reg = registry(Options::new());
        reg.configure_group_by_name("tools").unwrap();
        assert_eq!(reg.package("tools").unwrap().display_name, "tools");
    }

    #[test]
    fn reconfiguration_resets_stale_state() {
        let mut options = Options::new();
        options.set("COMPONENT_APP_DEPENDS", "extlib>=2.0");
        options.set("COMPONENT_APP_PRIORITY", "7");
        let mut reg = registry(options);
        let comp = component("app");
        reg.add_component(&comp);
        reg.configure_component(Some(&comp)).unwrap();
        assert!(!reg.package("app").unwrap().alien_dependencies.is_empty());

        // Re-configuring as a group must not leak component state.
        let group = ComponentGroup {
            name: "app".to_string(),
            display_name: "App Group".to_string(),
            ..ComponentGroup::default()
        };
        reg.configure_group(Some(&group)).unwrap();
        let pkg = reg.package("app").unwrap();
        assert!(pkg.alien_dependencies.is_empty());
        assert!(pkg.sorting_priority.is_none());
        assert_eq!(pkg.display_name, "App Group");
    }
}
