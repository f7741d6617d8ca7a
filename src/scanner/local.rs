// src/scanner/local.rs

//! Snapshot scanning of a checkout on disk
//!
//! Without history, a group needs reconciling when its newest file is newer
//! than the time recorded for it in the catalog. Groups the catalog knows
//! about but the checkout no longer has are reported absent.

use super::{ChangeKind, GroupChange, GroupFiles, GroupReader, Layout};
use crate::error::Result;
use crate::spec::GroupLocation;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::debug;
use walkdir::WalkDir;

/// A tree checked out at `root`
#[derive(Debug, Clone)]
pub struct LocalTree {
    pub name: String,
    pub root: PathBuf,
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

fn modified_secs(metadata: &fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl LocalTree {
    pub fn new(name: &str, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            root: root.into(),
        }
    }

    fn group_dir(&self, location: &GroupLocation) -> PathBuf {
        self.root.join(&location.secpath).join(&location.directory)
    }

    /// Newest modification time of any file in the group
    fn newest_mtime(&self, dir: &Path) -> Result<i64> {
        let mut newest = 0;
        for entry in WalkDir::new(dir).into_iter().filter_entry(|e| !is_hidden(e)) {
            let entry = entry?;
            if entry.file_type().is_dir() {
                continue;
            }
            newest = newest.max(modified_secs(&entry.metadata()?));
        }
        Ok(newest)
    }

    /// Candidate group directories, in path order
    fn candidates(&self, layout: &Layout) -> Result<Vec<GroupLocation>> {
        let mut candidates = Vec::new();
        for secpath in sorted_dirs(&self.root)? {
            if !layout.accepts_secpath(&secpath) {
                continue;
            }
            for directory in sorted_dirs(&self.root.join(&secpath))? {
                if layout.accepts_directory(&directory) {
                    candidates.push(layout.location(&self.name, &secpath, &directory));
                }
            }
        }
        Ok(candidates)
    }

    /// Groups that changed since the times in `known`
    pub fn scan(&self, layout: &Layout, known: &HashMap<GroupLocation, i64>) -> Result<Vec<GroupChange>> {
        let candidates = self.candidates(layout)?;
        debug!("{}: {} candidate groups", self.name, candidates.len());

        let probed: Vec<(GroupLocation, bool, i64)> = candidates
            .into_par_iter()
            .map(|location| -> Result<(GroupLocation, bool, i64)> {
                let has_spec = self.has_spec(&location)?;
                let mtime = if has_spec {
                    self.newest_mtime(&self.group_dir(&location))?
                } else {
                    0
                };
                Ok((location, has_spec, mtime))
            })
            .collect::<Result<_>>()?;

        let mut on_disk = HashSet::new();
        let mut changes = Vec::new();
        for (location, has_spec, mtime) in probed {
            if !has_spec {
                continue;
            }
            if known.get(&location).is_none_or(|recorded| mtime > *recorded) {
                changes.push(GroupChange {
                    location: location.clone(),
                    kind: ChangeKind::Present,
                });
            }
            on_disk.insert(location);
        }

        let mut gone: Vec<&GroupLocation> = known
            .keys()
            .filter(|location| location.tree == self.name && !on_disk.contains(*location))
            .collect();
        gone.sort();
        changes.extend(gone.into_iter().map(|location| GroupChange {
            location: location.clone(),
            kind: ChangeKind::Absent,
        }));

        Ok(changes)
    }
}

fn sorted_dirs(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

impl GroupReader for LocalTree {
    fn has_spec(&self, location: &GroupLocation) -> Result<bool> {
        let path = self.group_dir(location).join("spec");
        Ok(fs::symlink_metadata(path).is_ok_and(|m| m.is_file()))
    }

    fn read_group(&self, location: &GroupLocation) -> Result<Option<GroupFiles>> {
        if !self.has_spec(location)? {
            return Ok(None);
        }
        let dir = self.group_dir(location);
        let spec = fs::read(dir.join("spec"))?;

        let mut defines = Vec::new();
        let walker = WalkDir::new(&dir)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e));
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() || entry.file_name() != "defines" {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");
            defines.push((relative, fs::read(entry.path())?));
        }

        Ok(Some(GroupFiles {
            spec,
            defines,
            commit_time: self.newest_mtime(&dir)?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, path: &str, contents: &str) {
        let path = root.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_scan_reports_new_groups() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "base-libs/zlib/spec", "VER=1");
        write(temp.path(), "base-libs/zlib/autobuild/defines", "PKGNAME=zlib");
        write(temp.path(), "base-libs/nospec/autobuild/defines", "PKGNAME=x");
        write(temp.path(), "groups/base/x/spec", "");
        write(temp.path(), ".git/objects/aa/spec", "");

        let tree = LocalTree::new("t", temp.path());
        let changes = tree.scan(&Layout::default(), &HashMap::new()).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].location.path(), "base-libs/zlib");
        assert_eq!(changes[0].kind, ChangeKind::Present);
    }

    #[test]
    fn test_scan_skips_unchanged_and_reports_gone() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "base-libs/zlib/spec", "VER=1");
        let layout = Layout::default();
        let tree = LocalTree::new("t", temp.path());

        let zlib = layout.location("t", "base-libs", "zlib");
        let gone = layout.location("t", "base-libs", "gone");
        let other_tree = layout.location("u", "base-libs", "elsewhere");
        let known = HashMap::from([(zlib, i64::MAX), (gone.clone(), 5), (other_tree, 5)]);

        let changes = tree.scan(&layout, &known).unwrap();
        assert_eq!(
            changes,
            vec![GroupChange {
                location: gone,
                kind: ChangeKind::Absent
            }]
        );
    }

    #[test]
    fn test_read_group_finds_nested_defines() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "extra-libs/qt/spec", "VER=5");
        write(temp.path(), "extra-libs/qt/02-doc/defines", "PKGNAME=qt-doc");
        write(temp.path(), "extra-libs/qt/01-base/defines", "PKGNAME=qt");
        write(temp.path(), "extra-libs/qt/defines.bak", "");

        let tree = LocalTree::new("t", temp.path());
        let location = Layout::default().location("t", "extra-libs", "qt");
        let files = tree.read_group(&location).unwrap().unwrap();
        let paths: Vec<_> = files.defines.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(
            paths,
            vec!["extra-libs/qt/01-base/defines", "extra-libs/qt/02-doc/defines"]
        );
        assert_eq!(files.spec, b"VER=5");
        assert!(files.commit_time > 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_spec_is_not_a_group() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "base-libs/real/spec", "VER=1");
        fs::create_dir_all(temp.path().join("base-libs/link")).unwrap();
        std::os::unix::fs::symlink("../real/spec", temp.path().join("base-libs/link/spec")).unwrap();

        let tree = LocalTree::new("t", temp.path());
        let location = Layout::default().location("t", "base-libs", "link");
        assert!(!tree.has_spec(&location).unwrap());
        assert!(tree.read_group(&location).unwrap().is_none());
    }
}
