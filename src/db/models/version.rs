// src/db/models/version.rs

//! PackageVersion model - one row per package, branch and architecture

use crate::error::Result;
use crate::spec::Version;
use rusqlite::{Connection, Row, params};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageVersion {
    pub package: String,
    pub branch: String,
    /// Empty for the architecture-independent default
    pub architecture: String,
    pub version: Option<String>,
    pub release: Option<String>,
    pub epoch: Option<String>,
    pub commit_time: i64,
}

impl PackageVersion {
    pub fn new(package: &str, branch: &str, architecture: &str, version: &Version, commit_time: i64) -> Self {
        Self {
            package: package.to_string(),
            branch: branch.to_string(),
            architecture: architecture.to_string(),
            version: version.version.clone(),
            release: version.release.clone(),
            epoch: version.epoch.clone(),
            commit_time,
        }
    }

    pub fn insert(&self, conn: &Connection) -> Result<usize> {
        let changed = conn.execute(
            "INSERT OR REPLACE INTO package_versions
                (package, branch, architecture, version, release, epoch, commit_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                &self.package,
                &self.branch,
                &self.architecture,
                &self.version,
                &self.release,
                &self.epoch,
                &self.commit_time,
            ],
        )?;
        Ok(changed)
    }

    pub fn find_by_package(conn: &Connection, package: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT package, branch, architecture, version, release, epoch, commit_time
             FROM package_versions WHERE package = ?1 ORDER BY branch, architecture",
        )?;
        let versions = stmt
            .query_map([package], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(versions)
    }

    pub fn exists_for(conn: &Connection, package: &str) -> Result<bool> {
        let count: i64 = conn.query_row(
            "SELECT count(*) FROM package_versions WHERE package = ?1",
            [package],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Remove a package's rows on one branch
    pub fn delete_for_branch(conn: &Connection, package: &str, branch: &str) -> Result<usize> {
        Ok(conn.execute(
            "DELETE FROM package_versions WHERE package = ?1 AND branch = ?2",
            [package, branch],
        )?)
    }

    pub fn delete_for_package(conn: &Connection, package: &str) -> Result<usize> {
        Ok(conn.execute(
            "DELETE FROM package_versions WHERE package = ?1",
            [package],
        )?)
    }

    /// Remove every version row of packages owned by `tree`
    pub fn delete_for_tree(conn: &Connection, tree: &str) -> Result<usize> {
        Ok(conn.execute(
            "DELETE FROM package_versions WHERE package IN
                (SELECT name FROM packages WHERE tree = ?1)",
            [tree],
        )?)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            package: row.get(0)?,
            branch: row.get(1)?,
            architecture: row.get(2)?,
            version: row.get(3)?,
            release: row.get(4)?,
            epoch: row.get(5)?,
            commit_time: row.get(6)?,
        })
    }
}
