// src/scanner/layout.rs

//! Which paths of a tree belong to package groups

use crate::spec::{DEFAULT_CATEGORIES, GroupLocation};

/// Top-level names that never hold package groups
pub const DEFAULT_IGNORE: &[&str] = &[
    ".git",
    ".githubwiki",
    ".abbs-repo",
    "repo-spec",
    "groups",
    "newpak",
    "assets",
];

/// Directory conventions of an abbs tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Prefixes such as `base-` that split a section path into category and section
    pub categories: Vec<String>,
    pub ignore: Vec<String>,
    /// Only accept top-level directories that start with a category prefix
    pub require_category: bool,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            categories: DEFAULT_CATEGORIES.iter().map(|s| s.to_string()).collect(),
            ignore: DEFAULT_IGNORE.iter().map(|s| s.to_string()).collect(),
            require_category: false,
        }
    }
}

impl Layout {
    /// Whether a top-level directory can contain groups
    pub fn accepts_secpath(&self, secpath: &str) -> bool {
        if secpath.is_empty() || secpath.starts_with('.') {
            return false;
        }
        if self.ignore.iter().any(|name| name == secpath) {
            return false;
        }
        !self.require_category || self.categories.iter().any(|c| secpath.starts_with(c.as_str()))
    }

    /// Whether a second-level directory can be a group
    pub fn accepts_directory(&self, directory: &str) -> bool {
        !directory.is_empty() && !directory.starts_with('.')
    }

    /// `(secpath, directory)` of the group a file path belongs to.
    ///
    /// Files directly inside a section directory are not part of any group.
    pub fn group_of<'a>(&self, path: &'a str) -> Option<(&'a str, &'a str)> {
        let mut parts = path.splitn(3, '/');
        let secpath = parts.next()?;
        let directory = parts.next()?;
        let rest = parts.next()?;
        if rest.is_empty() || !self.accepts_secpath(secpath) || !self.accepts_directory(directory) {
            return None;
        }
        if rest.split('/').any(|segment| segment.starts_with('.')) {
            return None;
        }
        Some((secpath, directory))
    }

    pub fn location(&self, tree: &str, secpath: &str, directory: &str) -> GroupLocation {
        GroupLocation::new(tree, secpath, directory, &self.categories)
    }
}
