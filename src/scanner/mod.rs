// src/scanner/mod.rs

//! Tree scanning
//!
//! Turns revisions (or a checkout on disk) into the list of package groups
//! that need to be reconciled, and reads group files for the reconciler.

pub mod cache;
pub mod layout;
pub mod local;
pub mod memory;
pub mod source;

pub use cache::ManifestCache;
pub use layout::Layout;
pub use local::LocalTree;
pub use memory::{Edit, MemoryHistory};
pub use source::{ChangeStatus, FileChange, Manifest, ManifestEntry, Revision, RevisionSource};

use crate::bashvar::ShellEvaluator;
use crate::error::Result;
use crate::spec::{GroupLocation, Package, PackageGroup};
use indexmap::IndexSet;
use std::sync::Arc;
use tracing::debug;

/// State of a group after a revision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The group has a regular `spec` file
    Present,
    /// The group is gone, or its `spec` is missing or a symlink
    Absent,
}

/// A group touched by a revision or local pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupChange {
    pub location: GroupLocation,
    pub kind: ChangeKind,
}

/// Raw files of one group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupFiles {
    pub spec: Vec<u8>,
    /// `(path, contents)` of every `defines` file below the group, by path
    pub defines: Vec<(String, Vec<u8>)>,
    pub commit_time: i64,
}

/// Access to group files in one revision or snapshot
pub trait GroupReader {
    /// Whether the group has a `spec` file that is not a symlink
    fn has_spec(&self, location: &GroupLocation) -> Result<bool>;

    /// Files of the group, or `None` if it has no usable `spec`
    fn read_group(&self, location: &GroupLocation) -> Result<Option<GroupFiles>>;
}

/// A parsed group and the packages its `defines` files describe
#[derive(Debug, Clone)]
pub struct LoadedGroup {
    pub group: PackageGroup,
    pub packages: Vec<Package>,
}

/// Read and evaluate a group through `reader`
pub fn load_group<R: GroupReader + ?Sized>(
    reader: &R,
    location: &GroupLocation,
    shell: &ShellEvaluator,
) -> Result<Option<LoadedGroup>> {
    let Some(files) = reader.read_group(location)? else {
        return Ok(None);
    };
    Ok(Some(parse_group(location, &files, shell)))
}

/// Evaluate already-read group files
pub fn parse_group(location: &GroupLocation, files: &GroupFiles, shell: &ShellEvaluator) -> LoadedGroup {
    let mut group = PackageGroup::new(location.clone());
    group.load_spec(&files.spec, &format!("{}/spec", location), shell);
    group.commit_time = files.commit_time;

    let packages = files
        .defines
        .iter()
        .filter_map(|(path, contents)| {
            let label = format!("{}:{}", location.tree, path);
            let package = group.package(contents, &label, shell);
            if package.is_none() {
                debug!("{}: no PKGNAME, skipped", label);
            }
            package
        })
        .collect();

    LoadedGroup { group, packages }
}

fn is_defines(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest == "defines" || rest.ends_with("/defines"))
}

/// Group reader over one revision of a [`RevisionSource`]
pub struct RevisionView<'a, S: RevisionSource + ?Sized> {
    source: &'a S,
    revision: &'a Revision,
    manifest: Arc<Manifest>,
}

impl<'a, S: RevisionSource + ?Sized> RevisionView<'a, S> {
    pub fn new(source: &'a S, revision: &'a Revision, cache: &mut ManifestCache) -> Result<Self> {
        let manifest = cache.manifest(source, revision)?;
        Ok(Self {
            source,
            revision,
            manifest,
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }
}

impl<S: RevisionSource + ?Sized> GroupReader for RevisionView<'_, S> {
    fn has_spec(&self, location: &GroupLocation) -> Result<bool> {
        Ok(self
            .manifest
            .get(&location.spec_path())
            .is_some_and(|entry| !entry.is_symlink))
    }

    fn read_group(&self, location: &GroupLocation) -> Result<Option<GroupFiles>> {
        let spec_path = location.spec_path();
        let Some(spec_entry) = self.manifest.get(&spec_path).filter(|e| !e.is_symlink) else {
            return Ok(None);
        };

        let spec = self.source.read(&spec_entry.content_id)?;
        let commit_time = self
            .source
            .content_time(self.revision, &spec_path)?
            .unwrap_or(self.revision.timestamp);

        let prefix = format!("{}/", location.path());
        let mut defines = Vec::new();
        for (path, entry) in self.manifest.range(prefix.clone()..) {
            if !path.starts_with(&prefix) {
                break;
            }
            if entry.is_symlink || !is_defines(path, &prefix) {
                continue;
            }
            defines.push((path.clone(), self.source.read(&entry.content_id)?));
        }

        Ok(Some(GroupFiles {
            spec,
            defines,
            commit_time,
        }))
    }
}

/// Groups touched by `revision`, each once, in first-touch order.
///
/// With `full` set every file of the revision counts as added, which is
/// how a tree's first revision is scanned.
pub fn list_update<S: RevisionSource + ?Sized>(
    source: &S,
    cache: &mut ManifestCache,
    layout: &Layout,
    tree: &str,
    revision: &Revision,
    full: bool,
) -> Result<Vec<GroupChange>> {
    let manifest = cache.manifest(source, revision)?;
    let paths: Vec<String> = if full {
        manifest.keys().cloned().collect()
    } else {
        source
            .changes(revision)?
            .into_iter()
            .map(|change| change.path)
            .collect()
    };

    let mut touched: IndexSet<(&str, &str)> = IndexSet::new();
    for path in &paths {
        if let Some(group) = layout.group_of(path) {
            touched.insert(group);
        }
    }

    Ok(touched
        .into_iter()
        .map(|(secpath, directory)| {
            let location = layout.location(tree, secpath, directory);
            let kind = match manifest.get(&location.spec_path()) {
                Some(entry) if !entry.is_symlink => ChangeKind::Present,
                _ => ChangeKind::Absent,
            };
            GroupChange { location, kind }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changes_of(history: &MemoryHistory, rev: &Revision, full: bool) -> Vec<(String, ChangeKind)> {
        let mut cache = ManifestCache::default();
        list_update(history, &mut cache, &Layout::default(), "t", rev, full)
            .unwrap()
            .into_iter()
            .map(|c| (c.location.path(), c.kind))
            .collect()
    }

    #[test]
    fn test_list_update_collapses_and_classifies() {
        let mut history = MemoryHistory::new();
        let r1 = history.commit(
            1,
            &["stable"],
            "init",
            vec![
                Edit::write("base-libs/zlib/spec", "VER=1"),
                Edit::write("base-libs/zlib/autobuild/defines", "PKGNAME=zlib"),
                Edit::write("base-libs/nospec/autobuild/defines", "PKGNAME=x"),
                Edit::write("groups/base", "zlib"),
                Edit::write("README.md", "hi"),
            ],
        );
        assert_eq!(
            changes_of(&history, &r1, false),
            vec![
                ("base-libs/zlib".to_string(), ChangeKind::Present),
                ("base-libs/nospec".to_string(), ChangeKind::Absent),
            ]
        );
    }

    #[test]
    fn test_list_update_removed_file_with_spec_is_present() {
        let mut history = MemoryHistory::new();
        history.commit(
            1,
            &["stable"],
            "init",
            vec![
                Edit::write("base-libs/zlib/spec", "VER=1"),
                Edit::write("base-libs/zlib/autobuild/patch", "p"),
            ],
        );
        let r2 = history.commit(
            2,
            &["stable"],
            "drop patch",
            vec![Edit::remove("base-libs/zlib/autobuild/patch")],
        );
        let r3 = history.commit(
            3,
            &["stable"],
            "symlink",
            vec![Edit::symlink("base-libs/zlib/spec", "../other/spec")],
        );
        assert_eq!(
            changes_of(&history, &r2, false),
            vec![("base-libs/zlib".to_string(), ChangeKind::Present)]
        );
        assert_eq!(
            changes_of(&history, &r3, false),
            vec![("base-libs/zlib".to_string(), ChangeKind::Absent)]
        );
    }

    #[test]
    fn test_list_update_full_scan() {
        let mut history = MemoryHistory::new();
        history.commit(1, &["stable"], "a", vec![Edit::write("extra-x/a/spec", "")]);
        let r2 = history.commit(2, &["stable"], "b", vec![Edit::write("extra-x/b/spec", "")]);
        assert_eq!(changes_of(&history, &r2, false).len(), 1);
        assert_eq!(changes_of(&history, &r2, true).len(), 2);
    }

    #[test]
    fn test_revision_view_reads_group() {
        let mut history = MemoryHistory::new();
        let rev = history.commit(
            42,
            &["stable"],
            "init",
            vec![
                Edit::write("base-devel/gcc/spec", "VER=8"),
                Edit::write("base-devel/gcc/01-gcc/defines", "PKGNAME=gcc"),
                Edit::write("base-devel/gcc/02-runtime/defines", "PKGNAME=gcc-runtime"),
                Edit::write("base-devel/gcc/01-gcc/patches/x.patch", ""),
                Edit::write("base-devel/gcc-doc/spec", "VER=8"),
                Edit::write("base-devel/gcc-doc/autobuild/defines", "PKGNAME=gcc-doc"),
            ],
        );
        let mut cache = ManifestCache::default();
        let view = RevisionView::new(&history, &rev, &mut cache).unwrap();
        let location = Layout::default().location("t", "base-devel", "gcc");

        assert!(view.has_spec(&location).unwrap());
        let files = view.read_group(&location).unwrap().unwrap();
        let paths: Vec<_> = files.defines.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "base-devel/gcc/01-gcc/defines",
                "base-devel/gcc/02-runtime/defines"
            ]
        );
        assert_eq!(files.commit_time, 42);

        let shell = ShellEvaluator::new().with_bash("/nonexistent/bash");
        let loaded = load_group(&view, &location, &shell).unwrap().unwrap();
        let names: Vec<_> = loaded.packages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["gcc", "gcc-runtime"]);
        assert_eq!(loaded.packages[1].version.as_deref(), Some("8"));
    }
}
