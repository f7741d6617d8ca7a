// src/scanner/memory.rs

//! In-process revision history
//!
//! Builds a linear history commit by commit. Content is addressed by its
//! SHA-256, so identical files share one blob.

use super::source::{
    ChangeStatus, FileChange, Manifest, ManifestEntry, Revision, RevisionSource,
};
use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// One modification made by a commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Write { path: String, contents: Vec<u8> },
    Symlink { path: String, target: String },
    Remove { path: String },
    Rename { from: String, to: String },
}

impl Edit {
    pub fn write(path: &str, contents: impl AsRef<[u8]>) -> Self {
        Edit::Write {
            path: path.to_string(),
            contents: contents.as_ref().to_vec(),
        }
    }

    pub fn symlink(path: &str, target: &str) -> Self {
        Edit::Symlink {
            path: path.to_string(),
            target: target.to_string(),
        }
    }

    pub fn remove(path: &str) -> Self {
        Edit::Remove {
            path: path.to_string(),
        }
    }

    pub fn rename(from: &str, to: &str) -> Self {
        Edit::Rename {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

struct Commit {
    revision: Revision,
    message: String,
    manifest: Manifest,
    changes: Vec<FileChange>,
}

#[derive(Default)]
pub struct MemoryHistory {
    commits: Vec<Commit>,
    blobs: HashMap<String, Vec<u8>>,
}

fn content_id(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&mut self, bytes: Vec<u8>) -> String {
        let id = content_id(&bytes);
        self.blobs.entry(id.clone()).or_insert(bytes);
        id
    }

    /// Append a commit on top of the previous one
    pub fn commit(
        &mut self,
        timestamp: i64,
        branches: &[&str],
        message: &str,
        edits: Vec<Edit>,
    ) -> Revision {
        let mut manifest = self
            .commits
            .last()
            .map(|c| c.manifest.clone())
            .unwrap_or_default();
        let mut changes = Vec::new();

        for edit in edits {
            match edit {
                Edit::Write { path, contents } => {
                    let id = self.store(contents);
                    add(&mut manifest, &mut changes, path, id, false);
                }
                Edit::Symlink { path, target } => {
                    let id = self.store(target.into_bytes());
                    add(&mut manifest, &mut changes, path, id, true);
                }
                Edit::Remove { path } => {
                    remove(&mut manifest, &mut changes, &path);
                }
                Edit::Rename { from, to } => {
                    if let Some(entry) = remove(&mut manifest, &mut changes, &from) {
                        add(&mut manifest, &mut changes, to, entry.content_id, entry.is_symlink);
                    }
                }
            }
        }

        let seq = self.commits.len() as i64 + 1;
        let revision = Revision {
            seq,
            id: content_id(format!("{}:{}:{}", seq, timestamp, message).as_bytes()),
            timestamp,
            branches: branches.iter().map(|b| b.to_string()).collect(),
        };
        self.commits.push(Commit {
            revision: revision.clone(),
            message: message.to_string(),
            manifest,
            changes,
        });
        revision
    }

    fn find(&self, rev: &Revision) -> Result<&Commit> {
        self.commits
            .iter()
            .find(|c| c.revision.seq == rev.seq)
            .ok_or_else(|| Error::NotFound(format!("revision {}", rev.id)))
    }
}

fn add(
    manifest: &mut Manifest,
    changes: &mut Vec<FileChange>,
    path: String,
    content_id: String,
    is_symlink: bool,
) {
    let entry = ManifestEntry {
        content_id: content_id.clone(),
        is_symlink,
    };
    if manifest.get(&path) == Some(&entry) {
        return;
    }
    manifest.insert(path.clone(), entry);
    changes.push(FileChange {
        status: ChangeStatus::Added,
        path,
        content_id,
        is_symlink,
    });
}

fn remove(manifest: &mut Manifest, changes: &mut Vec<FileChange>, path: &str) -> Option<ManifestEntry> {
    let entry = manifest.remove(path)?;
    changes.push(FileChange {
        status: ChangeStatus::Removed,
        path: path.to_string(),
        content_id: entry.content_id.clone(),
        is_symlink: entry.is_symlink,
    });
    Some(entry)
}

impl RevisionSource for MemoryHistory {
    fn revisions(&self) -> Result<Vec<Revision>> {
        Ok(self.commits.iter().map(|c| c.revision.clone()).collect())
    }

    fn manifest(&self, rev: &Revision) -> Result<Manifest> {
        Ok(self.find(rev)?.manifest.clone())
    }

    fn changes(&self, rev: &Revision) -> Result<Vec<FileChange>> {
        Ok(self.find(rev)?.changes.clone())
    }

    fn read(&self, content_id: &str) -> Result<Vec<u8>> {
        self.blobs
            .get(content_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("content {}", content_id)))
    }

    fn content_time(&self, rev: &Revision, path: &str) -> Result<Option<i64>> {
        let Some(current) = self.find(rev)?.manifest.get(path) else {
            return Ok(None);
        };
        let mut history: Vec<&Commit> = self
            .commits
            .iter()
            .filter(|c| c.revision.order_key() <= rev.order_key())
            .collect();
        history.sort_by_key(|c| c.revision.order_key());

        Ok(history
            .into_iter()
            .find(|c| {
                c.manifest
                    .get(path)
                    .is_some_and(|e| e.content_id == current.content_id)
            })
            .map(|c| c.revision.timestamp))
    }

    fn message(&self, rev: &Revision) -> Result<String> {
        Ok(self.find(rev)?.message.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_tracks_changes() {
        let mut history = MemoryHistory::new();
        let r1 = history.commit(
            10,
            &["stable"],
            "init",
            vec![Edit::write("a/b/spec", "VER=1"), Edit::write("a/b/x", "x")],
        );
        let r2 = history.commit(
            20,
            &["stable"],
            "move",
            vec![
                Edit::write("a/b/x", "x"),
                Edit::rename("a/b/spec", "a/c/spec"),
                Edit::symlink("a/d/spec", "../c/spec"),
            ],
        );

        assert_eq!(history.changes(&r1).unwrap().len(), 2);
        let changes = history.changes(&r2).unwrap();
        let summary: Vec<_> = changes
            .iter()
            .map(|c| (c.status, c.path.as_str(), c.is_symlink))
            .collect();
        assert_eq!(
            summary,
            vec![
                (ChangeStatus::Removed, "a/b/spec", false),
                (ChangeStatus::Added, "a/c/spec", false),
                (ChangeStatus::Added, "a/d/spec", true),
            ]
        );

        let manifest = history.manifest(&r2).unwrap();
        assert_eq!(manifest.len(), 3);
        let id = &manifest["a/c/spec"].content_id;
        assert_eq!(history.read(id).unwrap(), b"VER=1");
        assert_eq!(history.message(&r2).unwrap(), "move");
    }

    #[test]
    fn test_remove_edits() {
        let mut history = MemoryHistory::new();
        history.commit(10, &["stable"], "add", vec![Edit::write("a/b/spec", "VER=1")]);
        let r2 = history.commit(
            20,
            &["stable"],
            "drop",
            vec![Edit::remove("a/b/spec"), Edit::remove("a/b/missing")],
        );

        let changes = history.changes(&r2).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].status, ChangeStatus::Removed);
        assert!(history.manifest(&r2).unwrap().is_empty());
    }

    #[test]
    fn test_content_time_follows_content() {
        let mut history = MemoryHistory::new();
        history.commit(10, &["stable"], "1", vec![Edit::write("p/q/spec", "VER=1")]);
        let r2 = history.commit(20, &["stable"], "2", vec![Edit::write("p/q/other", "y")]);
        let r3 = history.commit(30, &["stable"], "3", vec![Edit::write("p/q/spec", "VER=2")]);

        assert_eq!(history.content_time(&r2, "p/q/spec").unwrap(), Some(10));
        assert_eq!(history.content_time(&r3, "p/q/spec").unwrap(), Some(30));
        assert_eq!(history.content_time(&r3, "p/q/none").unwrap(), None);
    }
}
