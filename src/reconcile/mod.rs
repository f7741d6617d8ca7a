// src/reconcile/mod.rs

//! Incremental catalog reconciliation
//!
//! A [`Reconciler`] replays a tree's revisions (or a local snapshot) against
//! the catalog. Every revision is applied in one transaction that also
//! advances the tree's marker, so an interrupted run resumes at the first
//! revision that was not committed.
//!
//! Per touched group the previous rows at that location are removed first,
//! then the group's current packages are written. A package name that is
//! already owned by another location is recorded in `package_duplicate`;
//! across trees the higher priority keeps the name.

pub mod changelog;

pub use changelog::parse_commit_msg;

use crate::bashvar::ShellEvaluator;
use crate::config::TreeConfig;
use crate::db;
use crate::db::models::{
    DependencyEntry, Duplicate, GroupEntry, PackageChange, PackageEntry, PackageVersion, SpecEntry,
    Tree, TreeMark,
};
use crate::error::{Error, Result};
use crate::scanner::{
    self, ChangeKind, GroupChange, GroupReader, Layout, LoadedGroup, LocalTree, ManifestCache,
    Revision, RevisionSource, RevisionView,
};
use crate::spec::{GroupLocation, Package};
use rayon::prelude::*;
use rusqlite::Connection;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Counters for one reconciliation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateStats {
    /// Revisions committed, including skipped-branch revisions
    pub revisions: usize,
    pub groups: usize,
    pub added: usize,
    pub removed: usize,
    pub duplicates: usize,
    /// Requirements left pointing at a removed package
    pub unresolved: usize,
    /// Catalog rows inserted, updated or deleted
    pub rows: usize,
}

impl UpdateStats {
    fn merge(&mut self, other: UpdateStats) {
        self.revisions += other.revisions;
        self.groups += other.groups;
        self.added += other.added;
        self.removed += other.removed;
        self.duplicates += other.duplicates;
        self.unresolved += other.unresolved;
        self.rows += other.rows;
    }
}

/// Commit a revision brings to the changelog
struct CommitInfo<'m> {
    revision: &'m str,
    message: &'m str,
    timestamp: i64,
}

/// Everything a pass needs besides the transaction
struct Pass<'p> {
    tree: &'p TreeConfig,
    shell: &'p ShellEvaluator,
    cancel: &'p AtomicBool,
    branches: &'p [String],
    commit: Option<CommitInfo<'p>>,
}

/// Applies scanner output for one tree to the catalog
pub struct Reconciler<'c> {
    conn: &'c mut Connection,
    tree: TreeConfig,
    layout: Layout,
    shell: ShellEvaluator,
    cancel: Arc<AtomicBool>,
}

impl<'c> Reconciler<'c> {
    pub fn new(conn: &'c mut Connection, tree: TreeConfig, layout: Layout, shell: ShellEvaluator) -> Self {
        Self {
            conn,
            tree,
            layout,
            shell,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a cancellation token; setting it stops the run between groups
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn tree(&self) -> &TreeConfig {
        &self.tree
    }

    fn register_tree(&mut self) -> Result<()> {
        let tree = Tree {
            name: self.tree.name.clone(),
            category: Some(self.tree.category.clone()),
            url: self.tree.url.clone(),
            priority: self.tree.priority,
            mainbranch: self.tree.mainbranch.clone(),
        };
        tree.upsert(self.conn)
    }

    /// Configured branches that `revision` is reachable from, main branch first
    fn active_branches(&self, revision: &Revision) -> Vec<String> {
        let mut branches: Vec<String> = revision
            .branches
            .iter()
            .filter(|b| self.tree.branches.is_empty() || self.tree.branches.contains(b))
            .cloned()
            .collect();
        branches.sort_by_key(|b| *b != self.tree.mainbranch);
        branches.dedup();
        branches
    }

    /// Replay every revision of `source` newer than the tree's marker
    pub fn update<S: RevisionSource + ?Sized>(
        &mut self,
        source: &S,
        cache: &mut ManifestCache,
    ) -> Result<UpdateStats> {
        self.register_tree()?;

        let mut revisions = source.revisions()?;
        revisions.sort_by_key(Revision::order_key);

        let mut mark = TreeMark::find(self.conn, &self.tree.name)?;
        let mut stats = UpdateStats::default();

        for revision in &revisions {
            if mark.as_ref().is_some_and(|m| m.covers(revision)) {
                continue;
            }
            check_cancelled(&self.cancel)?;

            let committed = self.apply_revision(source, cache, revision, mark.is_none())?;
            stats.merge(committed);
            mark = Some(TreeMark::new(&self.tree.name, revision));
        }

        info!(
            "{}: {} revisions, {} added, {} removed, {} duplicates",
            self.tree.name, stats.revisions, stats.added, stats.removed, stats.duplicates
        );
        Ok(stats)
    }

    fn apply_revision<S: RevisionSource + ?Sized>(
        &mut self,
        source: &S,
        cache: &mut ManifestCache,
        revision: &Revision,
        full: bool,
    ) -> Result<UpdateStats> {
        let tree_mark = TreeMark::new(&self.tree.name, revision);
        let branches = self.active_branches(revision);
        if branches.is_empty() {
            debug!("{}: {} not on a tracked branch", self.tree.name, revision.short_id());
            db::transaction(self.conn, |tx| tree_mark.save(tx))?;
            return Ok(UpdateStats {
                revisions: 1,
                ..UpdateStats::default()
            });
        }

        let date = chrono::DateTime::from_timestamp(revision.timestamp, 0)
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        info!("{}: {} {} [{}]", self.tree.name, revision.short_id(), date, branches.join(","));

        let changes = scanner::list_update(source, cache, &self.layout, &self.tree.name, revision, full)?;
        let view = RevisionView::new(source, revision, cache)?;
        let mut loaded = Vec::with_capacity(changes.len());
        for change in changes {
            check_cancelled(&self.cancel)?;
            let group = match change.kind {
                ChangeKind::Present => scanner::load_group(&view, &change.location, &self.shell)?,
                ChangeKind::Absent => None,
            };
            loaded.push((change, group));
        }
        let message = source.message(revision)?;

        let pass = Pass {
            tree: &self.tree,
            shell: &self.shell,
            cancel: &self.cancel,
            branches: &branches,
            commit: Some(CommitInfo {
                revision: &revision.id,
                message: &message,
                timestamp: revision.timestamp,
            }),
        };
        let mut stats = db::transaction(self.conn, |tx| {
            let stats = pass.apply(tx, &view, loaded)?;
            tree_mark.save(tx)?;
            Ok(stats)
        })?;
        stats.revisions = 1;
        Ok(stats)
    }

    /// Reconcile a checkout on disk against the main branch
    pub fn scan_local(&mut self, local: &LocalTree) -> Result<UpdateStats> {
        self.register_tree()?;

        let known = GroupEntry::commit_times(self.conn, &self.tree.name)?;
        let changes = local.scan(&self.layout, &known)?;
        info!("{}: {} groups changed on disk", self.tree.name, changes.len());

        let shell = &self.shell;
        let loaded: Vec<(GroupChange, Option<LoadedGroup>)> = changes
            .into_par_iter()
            .map(|change| -> Result<(GroupChange, Option<LoadedGroup>)> {
                let group = match change.kind {
                    ChangeKind::Present => scanner::load_group(local, &change.location, shell)?,
                    ChangeKind::Absent => None,
                };
                Ok((change, group))
            })
            .collect::<Result<_>>()?;
        check_cancelled(&self.cancel)?;

        let branches = vec![self.tree.mainbranch.clone()];
        let pass = Pass {
            tree: &self.tree,
            shell: &self.shell,
            cancel: &self.cancel,
            branches: &branches,
            commit: None,
        };
        let stats = db::transaction(self.conn, |tx| pass.apply(tx, local, loaded))?;

        info!(
            "{}: {} added, {} removed, {} duplicates",
            self.tree.name, stats.added, stats.removed, stats.duplicates
        );
        Ok(stats)
    }

    /// Forget this tree's history so the next run replays it from the start
    pub fn reset(&mut self) -> Result<usize> {
        let name = self.tree.name.clone();
        let rows = db::transaction(self.conn, |tx| {
            let mut rows = PackageVersion::delete_for_tree(tx, &name)?;
            for package in PackageEntry::find_by_tree(tx, &name)? {
                rows += PackageEntry::delete(tx, &package.name)?;
            }
            rows += Duplicate::delete_for_tree(tx, &name)?;
            rows += GroupEntry::delete_for_tree(tx, &name)?;
            rows += PackageChange::delete_for_tree(tx, &name)?;
            rows += TreeMark::delete(tx, &name)?;
            rows += Duplicate::delete_singletons(tx)?;
            Ok(rows)
        })?;
        info!("{}: reset, {} rows cleared", name, rows);
        Ok(rows)
    }
}

fn check_cancelled(cancel: &AtomicBool) -> Result<()> {
    if cancel.load(Ordering::Relaxed) {
        return Err(Error::Interrupted);
    }
    Ok(())
}

fn same_place(entry: &PackageEntry, location: &GroupLocation) -> bool {
    entry.tree == location.tree
        && entry.category == location.category_column()
        && entry.section == location.section
        && entry.directory == location.directory
}

impl Pass<'_> {
    fn apply<R: GroupReader + ?Sized>(
        &self,
        tx: &Connection,
        reader: &R,
        loaded: Vec<(GroupChange, Option<LoadedGroup>)>,
    ) -> Result<UpdateStats> {
        let mut stats = UpdateStats::default();

        for (change, group) in loaded {
            check_cancelled(self.cancel)?;
            stats.groups += 1;
            self.remove_group(tx, &change, &mut stats)?;
            if let Some(loaded) = group {
                self.write_group(tx, &loaded, &mut stats)?;
            }
        }

        self.recover_orphans(tx, reader, &mut stats)?;
        stats.rows += Duplicate::delete_singletons(tx)?;
        Ok(stats)
    }

    /// Drop what the catalog holds for a location on the active branches
    fn remove_group(&self, tx: &Connection, change: &GroupChange, stats: &mut UpdateStats) -> Result<()> {
        let location = &change.location;
        let mut removed = Vec::new();
        for name in PackageEntry::names_at(tx, location)? {
            for branch in self.branches {
                stats.rows += PackageVersion::delete_for_branch(tx, &name, branch)?;
            }
            if PackageVersion::exists_for(tx, &name)? {
                continue;
            }

            stats.rows += SpecEntry::delete_for_package(tx, &name)?;
            stats.rows += DependencyEntry::delete_for_package(tx, &name)?;
            stats.rows += Duplicate::delete_at(tx, &name, location)?;
            stats.rows += PackageEntry::delete(tx, &name)?;
            match change.kind {
                ChangeKind::Absent => {
                    info!("removed: {} ({})", name, location);
                    stats.removed += 1;
                    removed.push(name);
                }
                ChangeKind::Present => debug!("{}: cleared before rewrite", name),
            }
        }

        for name in &removed {
            let mut dependents: Vec<String> = DependencyEntry::find_dependents(tx, name)?
                .into_iter()
                .filter(DependencyEntry::is_requirement)
                .map(|dep| dep.package)
                .collect();
            dependents.dedup();
            if !dependents.is_empty() {
                warn!("{} is still required by {}", name, dependents.join(", "));
                stats.unresolved += dependents.len();
            }
        }

        stats.rows += Duplicate::delete_for_location(tx, location)?;
        if change.kind == ChangeKind::Absent {
            stats.rows += GroupEntry::delete(tx, location)?;
        }
        Ok(())
    }

    fn write_group(&self, tx: &Connection, loaded: &LoadedGroup, stats: &mut UpdateStats) -> Result<()> {
        let group = &loaded.group;
        for package in &loaded.packages {
            self.write_package(tx, package, stats)?;
        }

        let message = std::iter::once(group.diagnostic.clone())
            .chain(loaded.packages.iter().map(|p| p.diagnostic.clone()))
            .flatten()
            .collect::<Vec<_>>();
        let message = (!message.is_empty()).then(|| message.join("\n"));
        stats.rows += GroupEntry::new(group.location.clone(), group.commit_time, message).upsert(tx)?;
        Ok(())
    }

    /// Whether this tree's definition replaces the one owned by `other`
    fn outranks(&self, tx: &Connection, other: &str) -> Result<bool> {
        let other_priority = Tree::priority_of(tx, other)?;
        Ok(self.tree.priority > other_priority
            || (self.tree.priority == other_priority && self.tree.name.as_str() < other))
    }

    fn write_package(&self, tx: &Connection, package: &Package, stats: &mut UpdateStats) -> Result<()> {
        let name = &package.name;
        let location = &package.location;

        let take = match PackageEntry::find_by_name(tx, name)? {
            None => {
                if Duplicate::seen_elsewhere(tx, name, location)? {
                    stats.rows += Duplicate::record(tx, name, location)?;
                }
                true
            }
            Some(existing) if same_place(&existing, location) => true,
            Some(existing) => {
                let owner = existing.location();
                stats.rows += Duplicate::record(tx, name, &owner)?;
                stats.rows += Duplicate::record(tx, name, location)?;
                stats.duplicates += 1;
                warn!("duplicate package {}: {} and {}", name, owner, location);

                if existing.tree == self.tree.name {
                    true
                } else if self.outranks(tx, &existing.tree)? {
                    stats.rows += PackageVersion::delete_for_package(tx, name)?;
                    true
                } else {
                    false
                }
            }
        };
        if !take {
            return Ok(());
        }

        stats.rows += PackageEntry::from_package(package).upsert(tx)?;
        for branch in self.branches {
            stats.rows += PackageVersion::delete_for_branch(tx, name, branch)?;
            for (architecture, version) in package.versions() {
                stats.rows +=
                    PackageVersion::new(name, branch, &architecture, &version, package.commit_time)
                        .insert(tx)?;
            }
        }
        if self.branches.contains(&self.tree.mainbranch) {
            stats.rows += SpecEntry::replace_all(tx, name, &package.spec)?;
            stats.rows += DependencyEntry::replace_all(tx, name, &package.dependencies)?;
        }

        let default_version = package
            .versions()
            .into_iter()
            .next()
            .map(|(_, version)| version)
            .unwrap_or_default();
        info!(
            "added: {} {}",
            name,
            default_version.full().unwrap_or_else(|| "(no version)".to_string())
        );
        stats.added += 1;

        if let Some(commit) = &self.commit
            && let Some(text) = parse_commit_msg(name, commit.message)
        {
            let change = PackageChange {
                tree: self.tree.name.clone(),
                revision: commit.revision.to_string(),
                package: name.clone(),
                version: default_version.version,
                release: default_version.release,
                epoch: default_version.epoch,
                message: text,
                commit_time: commit.timestamp,
            };
            stats.rows += change.insert(tx)?;
        }
        Ok(())
    }

    /// Re-derive packages whose owner went away but which survive at a
    /// duplicate location of this tree
    fn recover_orphans<R: GroupReader + ?Sized>(
        &self,
        tx: &Connection,
        reader: &R,
        stats: &mut UpdateStats,
    ) -> Result<()> {
        for location in Duplicate::orphaned_locations(tx, &self.tree.name)? {
            if !reader.has_spec(&location)? {
                continue;
            }
            let Some(loaded) = scanner::load_group(reader, &location, self.shell)? else {
                continue;
            };
            for package in &loaded.packages {
                if PackageEntry::exists(tx, &package.name)? {
                    continue;
                }
                debug!("recovering {} from {}", package.name, location);
                self.write_package(tx, package, stats)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{Edit, MemoryHistory};

    fn shell() -> ShellEvaluator {
        ShellEvaluator::new().with_bash("/nonexistent/bash")
    }

    fn run(conn: &mut Connection, tree: TreeConfig, history: &MemoryHistory) -> UpdateStats {
        let mut cache = ManifestCache::default();
        Reconciler::new(conn, tree, Layout::default(), shell())
            .update(history, &mut cache)
            .unwrap()
    }

    fn zlib(version: &str) -> Vec<Edit> {
        vec![
            Edit::write("base-libs/zlib/spec", &format!("VER={}\nREL=1\n", version)),
            Edit::write(
                "base-libs/zlib/autobuild/defines",
                "PKGNAME=zlib\nPKGSEC=libs\nPKGDES=\"compression\"\nPKGDEP=\"glibc\"\n",
            ),
        ]
    }

    #[test]
    fn test_active_branches_main_first() {
        let mut conn = db::open_in_memory().unwrap();
        let tree = TreeConfig::new("t", "stable").with_branches(&["testing", "stable"]);
        let reconciler = Reconciler::new(&mut conn, tree, Layout::default(), shell());
        let revision = Revision {
            seq: 1,
            id: "r".to_string(),
            timestamp: 0,
            branches: vec!["testing".to_string(), "stable".to_string(), "wip".to_string()],
        };
        assert_eq!(reconciler.active_branches(&revision), vec!["stable", "testing"]);
    }

    #[test]
    fn test_update_writes_changelog() {
        let mut conn = db::open_in_memory().unwrap();
        let mut history = MemoryHistory::new();
        history.commit(10, &["stable"], "zlib: new, 1.2", zlib("1.2"));
        history.commit(20, &["stable"], "zlib: update to 1.3", zlib("1.3"));
        history.commit(30, &["stable"], "Merge branch 'x'", vec![Edit::write("base-libs/zlib/spec", "VER=1.3\nREL=2\n")]);

        let stats = run(&mut conn, TreeConfig::new("t", "stable"), &history);
        assert_eq!(stats.revisions, 3);

        let changes = PackageChange::find_by_package(&conn, "zlib").unwrap();
        let messages: Vec<&str> = changes.iter().map(|c| c.message.as_str()).collect();
        assert_eq!(messages, vec!["update to 1.3", "new, 1.2"]);

        let versions = PackageVersion::find_by_package(&conn, "zlib").unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].release.as_deref(), Some("2"));
    }

    #[test]
    fn test_untracked_branch_only_moves_marker() {
        let mut conn = db::open_in_memory().unwrap();
        let mut history = MemoryHistory::new();
        history.commit(10, &["wip"], "zlib: wip", zlib("9.9"));

        let tree = TreeConfig::new("t", "stable").with_branches(&["stable"]);
        let stats = run(&mut conn, tree, &history);
        assert_eq!(stats.revisions, 1);
        assert_eq!(stats.added, 0);
        assert!(PackageEntry::find_by_name(&conn, "zlib").unwrap().is_none());
        assert_eq!(TreeMark::find(&conn, "t").unwrap().unwrap().revision_seq, 1);
    }

    #[test]
    fn test_secondary_branch_keeps_spec_rows() {
        let mut conn = db::open_in_memory().unwrap();
        let mut history = MemoryHistory::new();
        history.commit(10, &["stable", "testing"], "init", zlib("1.2"));
        history.commit(
            20,
            &["testing"],
            "zlib: drop dependency",
            vec![Edit::write("base-libs/zlib/autobuild/defines", "PKGNAME=zlib\nPKGSEC=libs\n")],
        );

        run(&mut conn, TreeConfig::new("t", "stable"), &history);

        let versions = PackageVersion::find_by_package(&conn, "zlib").unwrap();
        let branches: Vec<&str> = versions.iter().map(|v| v.branch.as_str()).collect();
        assert_eq!(branches, vec!["stable", "testing"]);
        // Main branch rows are untouched by a testing-only revision
        assert_eq!(DependencyEntry::find_by_package(&conn, "zlib").unwrap().len(), 1);
    }

    #[test]
    fn test_cancel_rolls_back() {
        let mut conn = db::open_in_memory().unwrap();
        let mut history = MemoryHistory::new();
        history.commit(10, &["stable"], "init", zlib("1.2"));

        let cancel = Arc::new(AtomicBool::new(true));
        let mut cache = ManifestCache::default();
        let result = Reconciler::new(&mut conn, TreeConfig::new("t", "stable"), Layout::default(), shell())
            .with_cancel(cancel)
            .update(&history, &mut cache);
        assert!(matches!(result, Err(Error::Interrupted)));
        assert!(TreeMark::find(&conn, "t").unwrap().is_none());
        assert!(!PackageEntry::exists(&conn, "zlib").unwrap());
    }
}
