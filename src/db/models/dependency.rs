// src/db/models/dependency.rs

//! DependencyEntry model - declared relationships of a package

use crate::error::Result;
use crate::spec::{Dependency, Relationship};
use rusqlite::{Connection, Row, params};
use std::str::FromStr;

/// Stored dependency row. `relationship` keeps the declaring key verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEntry {
    pub package: String,
    pub dependency: String,
    pub relop: Option<String>,
    pub version: Option<String>,
    pub architecture: String,
    pub relationship: String,
}

impl From<&Dependency> for DependencyEntry {
    fn from(dep: &Dependency) -> Self {
        Self {
            package: dep.package.clone(),
            dependency: dep.dependency.clone(),
            relop: dep.relop.clone(),
            version: dep.version.clone(),
            architecture: dep.architecture.clone(),
            relationship: dep.relationship.to_string(),
        }
    }
}

impl DependencyEntry {
    /// Whether the row is a runtime or build requirement
    pub fn is_requirement(&self) -> bool {
        Relationship::from_str(&self.relationship).is_ok_and(Relationship::is_requirement)
    }

    /// Replace every dependency row of `package`.
    ///
    /// Rows sharing `(dependency, architecture, relationship)` collapse to
    /// the last one declared.
    pub fn replace_all(conn: &Connection, package: &str, dependencies: &[Dependency]) -> Result<usize> {
        let mut changed = Self::delete_for_package(conn, package)?;
        let mut stmt = conn.prepare(
            "INSERT OR REPLACE INTO package_dependencies
                (package, dependency, relop, version, architecture, relationship)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for dep in dependencies {
            let entry = Self::from(dep);
            changed += stmt.execute(params![
                package,
                &entry.dependency,
                &entry.relop,
                &entry.version,
                &entry.architecture,
                &entry.relationship,
            ])?;
        }
        Ok(changed)
    }

    pub fn find_by_package(conn: &Connection, package: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT package, dependency, relop, version, architecture, relationship
             FROM package_dependencies WHERE package = ?1
             ORDER BY relationship, architecture, dependency",
        )?;
        let deps = stmt
            .query_map([package], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(deps)
    }

    /// Packages that declare any relationship to `dependency`
    pub fn find_dependents(conn: &Connection, dependency: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT package, dependency, relop, version, architecture, relationship
             FROM package_dependencies WHERE dependency = ?1 ORDER BY package",
        )?;
        let deps = stmt
            .query_map([dependency], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(deps)
    }

    pub fn delete_for_package(conn: &Connection, package: &str) -> Result<usize> {
        Ok(conn.execute(
            "DELETE FROM package_dependencies WHERE package = ?1",
            [package],
        )?)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            package: row.get(0)?,
            dependency: row.get(1)?,
            relop: row.get(2)?,
            version: row.get(3)?,
            architecture: row.get(4)?,
            relationship: row.get(5)?,
        })
    }
}
