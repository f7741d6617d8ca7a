// src/db/models/change.rs

//! PackageChange model - per-package changelog derived from commit messages

use crate::error::Result;
use rusqlite::{Connection, Row, params};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageChange {
    pub tree: String,
    /// Revision id
    pub revision: String,
    pub package: String,
    pub version: Option<String>,
    pub release: Option<String>,
    pub epoch: Option<String>,
    pub message: String,
    pub commit_time: i64,
}

impl PackageChange {
    pub fn insert(&self, conn: &Connection) -> Result<usize> {
        Ok(conn.execute(
            "INSERT OR REPLACE INTO package_changes
                (tree, revision, package, version, release, epoch, message, commit_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                &self.tree,
                &self.revision,
                &self.package,
                &self.version,
                &self.release,
                &self.epoch,
                &self.message,
                &self.commit_time,
            ],
        )?)
    }

    /// Changelog of a package, newest first
    pub fn find_by_package(conn: &Connection, package: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT tree, revision, package, version, release, epoch, message, commit_time
             FROM package_changes WHERE package = ?1
             ORDER BY commit_time DESC, revision",
        )?;
        let changes = stmt
            .query_map([package], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(changes)
    }

    pub fn delete_for_tree(conn: &Connection, tree: &str) -> Result<usize> {
        Ok(conn.execute("DELETE FROM package_changes WHERE tree = ?1", [tree])?)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            tree: row.get(0)?,
            revision: row.get(1)?,
            package: row.get(2)?,
            version: row.get(3)?,
            release: row.get(4)?,
            epoch: row.get(5)?,
            message: row.get(6)?,
            commit_time: row.get(7)?,
        })
    }
}
