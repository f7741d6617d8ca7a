// src/spec/mod.rs

//! Package groups and packages derived from `spec` and `defines` files
//!
//! A group directory such as `base-devel/gcc` holds one `spec` file with
//! shared declarations and any number of `defines` files, each describing
//! one concrete package. Values are obtained with [`crate::bashvar`].

pub mod dependency;

pub use dependency::{Dependency, Relationship, parse_dependencies};

use crate::bashvar::{self, ShellEvaluator, Variables};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Category prefixes used when a tree does not configure its own
pub const DEFAULT_CATEGORIES: &[&str] = &["core-", "base-", "extra-"];

/// Where a package group lives in a tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupLocation {
    pub tree: String,
    /// First path segment, e.g. `base-devel`
    pub secpath: String,
    pub category: Option<String>,
    pub section: String,
    pub directory: String,
}

impl GroupLocation {
    /// Split `secpath` using the given category prefixes (`"base-"` etc.)
    pub fn new<S: AsRef<str>>(tree: &str, secpath: &str, directory: &str, categories: &[S]) -> Self {
        let prefix = categories
            .iter()
            .map(|c| c.as_ref())
            .find(|prefix| secpath.starts_with(*prefix));

        let (category, section) = match prefix {
            Some(prefix) => (
                Some(prefix.trim_end_matches('-').to_string()),
                secpath[prefix.len()..].to_string(),
            ),
            None => (None, secpath.to_string()),
        };

        Self {
            tree: tree.to_string(),
            secpath: secpath.to_string(),
            category,
            section,
            directory: directory.to_string(),
        }
    }

    /// Rebuild a location from catalog columns, where no category is `""`
    pub fn from_columns(tree: &str, category: &str, section: &str, directory: &str) -> Self {
        let (category, secpath) = if category.is_empty() {
            (None, section.to_string())
        } else {
            (Some(category.to_string()), format!("{}-{}", category, section))
        };
        Self {
            tree: tree.to_string(),
            secpath,
            category,
            section: section.to_string(),
            directory: directory.to_string(),
        }
    }

    /// Category as stored in the catalog
    pub fn category_column(&self) -> &str {
        self.category.as_deref().unwrap_or("")
    }

    /// `secpath/directory`, relative to the tree root
    pub fn path(&self) -> String {
        format!("{}/{}", self.secpath, self.directory)
    }

    pub fn spec_path(&self) -> String {
        format!("{}/spec", self.path())
    }
}

impl std::fmt::Display for GroupLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.tree, self.path())
    }
}

/// Effective `(version, release, epoch)` for one architecture
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Version {
    pub version: Option<String>,
    pub release: Option<String>,
    pub epoch: Option<String>,
}

impl Version {
    /// `epoch:version-release`, omitting absent parts
    pub fn full(&self) -> Option<String> {
        let version = self.version.as_deref()?;
        let mut full = String::new();
        if let Some(epoch) = self.epoch.as_deref().filter(|e| !e.is_empty()) {
            full.push_str(epoch);
            full.push(':');
        }
        full.push_str(version);
        if let Some(release) = self.release.as_deref().filter(|r| !r.is_empty()) {
            full.push('-');
            full.push_str(release);
        }
        Some(full)
    }
}

/// Decode file contents, noting when bytes had to be replaced
fn decode(bytes: &[u8], filename: &str) -> (String, Option<String>) {
    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), None),
        Err(_) => (
            String::from_utf8_lossy(bytes).into_owned(),
            Some(format!("{}: invalid UTF-8 replaced", filename)),
        ),
    }
}

fn join_diagnostics(parts: impl IntoIterator<Item = Option<String>>) -> Option<String> {
    let parts: Vec<String> = parts.into_iter().flatten().collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}

/// Remove `KEY` and every `KEY__<arch>` from `vars`
fn take_arch_keyed(vars: &mut Variables, key: &str) -> (Option<String>, BTreeMap<String, String>) {
    let base = vars.shift_remove(key);
    let prefix = format!("{}__", key);
    let arch_keys: Vec<String> = vars
        .keys()
        .filter(|k| k.starts_with(&prefix) && k.len() > prefix.len())
        .cloned()
        .collect();

    let mut by_arch = BTreeMap::new();
    for k in arch_keys {
        if let Some(value) = vars.shift_remove(&k) {
            by_arch.insert(k[prefix.len()..].to_lowercase(), value);
        }
    }
    (base, by_arch)
}

/// Shared declarations of one `spec` file
#[derive(Debug, Clone, PartialEq)]
pub struct PackageGroup {
    pub location: GroupLocation,
    pub version: Option<String>,
    pub release: Option<String>,
    pub arch_versions: BTreeMap<String, String>,
    pub arch_releases: BTreeMap<String, String>,
    /// Remaining keys after version fields have been taken out
    pub spec: Variables,
    /// Commit (or modification) time of the group's newest content
    pub commit_time: i64,
    pub diagnostic: Option<String>,
}

impl PackageGroup {
    pub fn new(location: GroupLocation) -> Self {
        Self {
            location,
            version: None,
            release: None,
            arch_versions: BTreeMap::new(),
            arch_releases: BTreeMap::new(),
            spec: Variables::new(),
            commit_time: 0,
            diagnostic: None,
        }
    }

    /// Evaluate a `spec` file, replacing everything loaded before
    pub fn load_spec(&mut self, contents: &[u8], filename: &str, shell: &ShellEvaluator) {
        let (source, decode_note) = decode(contents, filename);
        let evaluation = bashvar::eval_bashvar(&source, filename, shell);

        let mut spec = evaluation.variables.clone();
        let (version, arch_versions) = take_arch_keyed(&mut spec, "VER");
        let (release, arch_releases) = take_arch_keyed(&mut spec, "REL");

        self.version = version;
        self.release = release;
        self.arch_versions = arch_versions;
        self.arch_releases = arch_releases;
        self.spec = spec;
        self.diagnostic = join_diagnostics([decode_note, evaluation.diagnostic()]);
    }

    /// Derive the package described by a `defines` file.
    ///
    /// Returns `None` when the file has no `PKGNAME`.
    pub fn package(
        &self,
        contents: &[u8],
        filename: &str,
        shell: &ShellEvaluator,
    ) -> Option<Package> {
        let (source, decode_note) = decode(contents, filename);
        let evaluation = bashvar::eval_bashvar(&source, filename, shell);

        // package keys are taken from the group keys overlaid by the defines
        let mut spec = self.spec.clone();
        spec.extend(evaluation.variables.clone());

        let name = spec.shift_remove("PKGNAME").filter(|n| !n.is_empty())?;
        let pkg_section = spec.shift_remove("PKGSEC");
        let description = spec.shift_remove("PKGDES");
        let (epoch, arch_epochs) = take_arch_keyed(&mut spec, "PKGEPOCH");

        let mut dependencies = Vec::new();
        let keys: Vec<String> = spec.keys().cloned().collect();
        for key in keys {
            let (base, arch) = match key.split_once("__") {
                Some((base, arch)) if !arch.is_empty() => (base, arch.to_lowercase()),
                Some(_) => continue,
                None => (key.as_str(), String::new()),
            };
            let Ok(relationship) = Relationship::from_str(base) else {
                continue;
            };
            if let Some(value) = spec.shift_remove(&key) {
                dependencies.extend(parse_dependencies(&name, &value, &arch, relationship));
            }
        }

        Some(Package {
            name,
            location: self.location.clone(),
            pkg_section,
            description,
            version: self.version.clone(),
            release: self.release.clone(),
            epoch,
            arch_versions: self.arch_versions.clone(),
            arch_releases: self.arch_releases.clone(),
            arch_epochs,
            spec,
            dependencies: dependency::dedup(dependencies),
            commit_time: self.commit_time,
            diagnostic: join_diagnostics([decode_note, evaluation.diagnostic()]),
        })
    }
}

/// One concrete package from a `defines` file
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    pub name: String,
    pub location: GroupLocation,
    pub pkg_section: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub release: Option<String>,
    pub epoch: Option<String>,
    pub arch_versions: BTreeMap<String, String>,
    pub arch_releases: BTreeMap<String, String>,
    pub arch_epochs: BTreeMap<String, String>,
    /// Group keys overlaid by the package's own keys
    pub spec: Variables,
    pub dependencies: Vec<Dependency>,
    pub commit_time: i64,
    pub diagnostic: Option<String>,
}

impl Package {
    /// Version for the architecture-independent default (`""`) and every
    /// architecture with an override of any component
    pub fn versions(&self) -> Vec<(String, Version)> {
        let mut arches: Vec<&String> = self
            .arch_versions
            .keys()
            .chain(self.arch_releases.keys())
            .chain(self.arch_epochs.keys())
            .collect();
        arches.sort();
        arches.dedup();

        let mut versions = vec![(
            String::new(),
            Version {
                version: self.version.clone(),
                release: self.release.clone(),
                epoch: self.epoch.clone(),
            },
        )];
        for arch in arches {
            versions.push((
                arch.clone(),
                Version {
                    version: self.arch_versions.get(arch).or(self.version.as_ref()).cloned(),
                    release: self.arch_releases.get(arch).or(self.release.as_ref()).cloned(),
                    epoch: self.arch_epochs.get(arch).or(self.epoch.as_ref()).cloned(),
                },
            ));
        }
        versions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell() -> ShellEvaluator {
        // grammar-only inputs; bash must never be needed
        ShellEvaluator::new().with_bash("/nonexistent/bash")
    }

    fn group(spec: &str) -> PackageGroup {
        let location = GroupLocation::new("aosc-os-abbs", "extra-devel", "gcc", DEFAULT_CATEGORIES);
        let mut group = PackageGroup::new(location);
        group.load_spec(spec.as_bytes(), "extra-devel/gcc/spec", &shell());
        group
    }

    #[test]
    fn test_location_split() {
        let loc = GroupLocation::new("t", "base-devel", "gcc", DEFAULT_CATEGORIES);
        assert_eq!(loc.category.as_deref(), Some("base"));
        assert_eq!(loc.section, "devel");
        assert_eq!(loc.spec_path(), "base-devel/gcc/spec");

        let loc = GroupLocation::new("t", "lang-python", "pip", DEFAULT_CATEGORIES);
        assert_eq!(loc.category, None);
        assert_eq!(loc.category_column(), "");
        assert_eq!(loc.section, "lang-python");
    }

    #[test]
    fn test_location_from_columns() {
        let loc = GroupLocation::new("t", "core-libs", "zlib", DEFAULT_CATEGORIES);
        let back = GroupLocation::from_columns("t", "core", "libs", "zlib");
        assert_eq!(loc, back);

        let loc = GroupLocation::new("t", "misc", "x", DEFAULT_CATEGORIES);
        assert_eq!(GroupLocation::from_columns("t", "", "misc", "x"), loc);
    }

    #[test]
    fn test_load_spec_extracts_versions() {
        let group = group("VER=8.2.0\nREL=3\nVER__ARM64=8.1.0\nSRCTBL=\"gcc-$VER.tar.xz\"\n");
        assert_eq!(group.version.as_deref(), Some("8.2.0"));
        assert_eq!(group.release.as_deref(), Some("3"));
        assert_eq!(group.arch_versions.get("arm64").map(String::as_str), Some("8.1.0"));
        assert_eq!(group.spec.keys().collect::<Vec<_>>(), vec!["SRCTBL"]);
        assert_eq!(group.spec["SRCTBL"], "gcc-8.2.0.tar.xz");
        assert_eq!(group.diagnostic, None);
    }

    #[test]
    fn test_package_without_name() {
        let group = group("VER=1");
        assert!(group.package(b"PKGSEC=devel\n", "defines", &shell()).is_none());
        assert!(group.package(b"PKGNAME=\n", "defines", &shell()).is_none());
    }

    #[test]
    fn test_package_fields_and_dependencies() {
        let group = group("VER=1.0\nREL=2\nPKGEPOCH=9\n");
        let defines = b"PKGNAME=baz\nPKGSEC=devel\nPKGDES='Baz tool'\n\
                        PKGDEP=\"foo>=1.0 bar\"\nPKGDEP__AMD64=\"libfoo\"\n\
                        BUILDDEP=\"cmake bar\"\nPKGDEP__=ignored\nABTYPE=cmake\n";
        let pkg = group.package(defines, "defines", &shell()).unwrap();

        assert_eq!(pkg.name, "baz");
        assert_eq!(pkg.pkg_section.as_deref(), Some("devel"));
        assert_eq!(pkg.description.as_deref(), Some("Baz tool"));
        // group-level PKGEPOCH applies to every package of the group
        assert_eq!(pkg.epoch.as_deref(), Some("9"));
        assert!(!pkg.spec.contains_key("PKGEPOCH"));
        assert_eq!(pkg.spec["ABTYPE"], "cmake");

        let deps: Vec<_> = pkg
            .dependencies
            .iter()
            .map(|d| {
                (
                    d.dependency.as_str(),
                    d.relop.as_deref(),
                    d.architecture.as_str(),
                    d.relationship,
                )
            })
            .collect();
        assert_eq!(
            deps,
            vec![
                ("foo", Some(">="), "", Relationship::Depends),
                ("bar", None, "", Relationship::Depends),
                ("libfoo", None, "amd64", Relationship::Depends),
                ("cmake", None, "", Relationship::BuildDepends),
                ("bar", None, "", Relationship::BuildDepends),
            ]
        );
        assert!(!pkg.spec.contains_key("PKGDEP"));
    }

    #[test]
    fn test_group_keys_feed_package_fields() {
        let group = group("VER=1\nPKGDEP=\"glibc\"\nPKGSEC=libs\nPKGEPOCH__AMD64=2\n");
        let pkg = group
            .package(b"PKGNAME=zlib\nPKGSEC=base\n", "defines", &shell())
            .unwrap();

        assert_eq!(pkg.pkg_section.as_deref(), Some("base"));
        assert_eq!(pkg.arch_epochs.get("amd64").map(String::as_str), Some("2"));
        assert_eq!(pkg.dependencies.len(), 1);
        assert_eq!(pkg.dependencies[0].dependency, "glibc");
        for key in ["PKGDEP", "PKGSEC", "PKGEPOCH__AMD64", "PKGNAME"] {
            assert!(!pkg.spec.contains_key(key), "{key}");
        }
    }

    #[test]
    fn test_package_versions_fall_back_per_component() {
        let group = group("VER=2.0\nREL=1\nREL__ARMEL=0\n");
        let pkg = group
            .package(b"PKGNAME=x\nPKGEPOCH=1\nPKGEPOCH__PPC64=3\n", "defines", &shell())
            .unwrap();
        let versions = pkg.versions();
        assert_eq!(versions.len(), 3);
        assert_eq!(versions[0].0, "");
        assert_eq!(versions[0].1.full().as_deref(), Some("1:2.0-1"));
        assert_eq!(versions[1].0, "armel");
        assert_eq!(versions[1].1.full().as_deref(), Some("1:2.0-0"));
        assert_eq!(versions[2].0, "ppc64");
        assert_eq!(versions[2].1.full().as_deref(), Some("3:2.0-1"));
    }

    #[test]
    fn test_version_full() {
        let v = Version {
            version: Some("1.2".into()),
            release: None,
            epoch: Some(String::new()),
        };
        assert_eq!(v.full().as_deref(), Some("1.2"));
        assert_eq!(Version::default().full(), None);
    }

    #[test]
    fn test_invalid_utf8_is_noted() {
        let location = GroupLocation::new("t", "base-x", "y", DEFAULT_CATEGORIES);
        let mut group = PackageGroup::new(location);
        group.load_spec(b"VER=1\nX='\xff'\n", "spec", &shell());
        assert_eq!(group.version.as_deref(), Some("1"));
        assert!(group.diagnostic.unwrap().contains("invalid UTF-8"));
    }

    #[test]
    fn test_shell_failure_becomes_diagnostic() {
        let group = group("VER=$(cat VERSION)\n");
        assert!(group.version.is_none());
        assert!(group.diagnostic.is_some());
    }
}
