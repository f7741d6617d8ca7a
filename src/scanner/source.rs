// src/scanner/source.rs

//! Version-control backend interface
//!
//! The catalog never talks to git directly. A backend exposes the tree's
//! history through [`RevisionSource`]; [`super::memory::MemoryHistory`] is
//! the in-process implementation.

use crate::error::Result;
use std::collections::BTreeMap;

/// One commit of a tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    /// Backend-local sequence number, unique and increasing within a tree
    pub seq: i64,
    /// Stable identifier such as a commit hash
    pub id: String,
    /// Commit time in seconds since the epoch
    pub timestamp: i64,
    /// Branches this revision is reachable from
    pub branches: Vec<String>,
}

impl Revision {
    /// Key that orders revisions for replay
    pub fn order_key(&self) -> (i64, i64) {
        (self.timestamp, self.seq)
    }

    /// Abbreviated id for log lines
    pub fn short_id(&self) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(16)
            .map(|(i, _)| i)
            .unwrap_or(self.id.len());
        &self.id[..end]
    }
}

/// A file as recorded in a revision's manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub content_id: String,
    pub is_symlink: bool,
}

/// Every file of a revision, keyed by path
pub type Manifest = BTreeMap<String, ManifestEntry>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    /// Added or modified
    Added,
    Removed,
}

/// A file touched by a revision. Renames appear as removal plus addition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub status: ChangeStatus,
    pub path: String,
    pub content_id: String,
    pub is_symlink: bool,
}

pub trait RevisionSource {
    /// All revisions, in any order
    fn revisions(&self) -> Result<Vec<Revision>>;

    fn manifest(&self, rev: &Revision) -> Result<Manifest>;

    /// Files changed relative to the previous revision
    fn changes(&self, rev: &Revision) -> Result<Vec<FileChange>>;

    /// Content for a manifest entry's `content_id`
    fn read(&self, content_id: &str) -> Result<Vec<u8>>;

    /// Commit time of the revision that introduced the content `path`
    /// has at `rev`
    fn content_time(&self, rev: &Revision, path: &str) -> Result<Option<i64>>;

    fn message(&self, rev: &Revision) -> Result<String>;
}
