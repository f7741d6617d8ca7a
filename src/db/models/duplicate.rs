// src/db/models/duplicate.rs

//! Duplicate model - every location of a package name defined more than once

use crate::error::Result;
use crate::spec::GroupLocation;
use rusqlite::{Connection, params};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duplicate {
    pub package: String,
    pub location: GroupLocation,
}

impl Duplicate {
    /// Record that `package` is defined at `location`
    pub fn record(conn: &Connection, package: &str, location: &GroupLocation) -> Result<usize> {
        Ok(conn.execute(
            "INSERT OR IGNORE INTO package_duplicate (package, tree, category, section, directory)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                package,
                &location.tree,
                location.category_column(),
                &location.section,
                &location.directory
            ],
        )?)
    }

    pub fn find_by_package(conn: &Connection, package: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT package, tree, category, section, directory FROM package_duplicate
             WHERE package = ?1 ORDER BY tree, category, section, directory",
        )?;
        let rows = stmt
            .query_map([package], |row| {
                let tree: String = row.get(1)?;
                let category: String = row.get(2)?;
                let section: String = row.get(3)?;
                let directory: String = row.get(4)?;
                Ok(Self {
                    package: row.get(0)?,
                    location: GroupLocation::from_columns(&tree, &category, &section, &directory),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Locations of `tree` whose package currently has no catalog row
    pub fn orphaned_locations(conn: &Connection, tree: &str) -> Result<Vec<GroupLocation>> {
        let mut stmt = conn.prepare(
            "SELECT DISTINCT category, section, directory FROM package_duplicate
             WHERE tree = ?1 AND package NOT IN (SELECT name FROM packages)
             ORDER BY category, section, directory",
        )?;
        let locations = stmt
            .query_map([tree], |row| {
                let category: String = row.get(0)?;
                let section: String = row.get(1)?;
                let directory: String = row.get(2)?;
                Ok(GroupLocation::from_columns(tree, &category, &section, &directory))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(locations)
    }

    pub fn delete_at(conn: &Connection, package: &str, location: &GroupLocation) -> Result<usize> {
        Ok(conn.execute(
            "DELETE FROM package_duplicate
             WHERE package = ?1 AND tree = ?2 AND category = ?3 AND section = ?4 AND directory = ?5",
            params![
                package,
                &location.tree,
                location.category_column(),
                &location.section,
                &location.directory
            ],
        )?)
    }

    /// Remove every row keyed by a location
    pub fn delete_for_location(conn: &Connection, location: &GroupLocation) -> Result<usize> {
        Ok(conn.execute(
            "DELETE FROM package_duplicate
             WHERE tree = ?1 AND category = ?2 AND section = ?3 AND directory = ?4",
            params![
                &location.tree,
                location.category_column(),
                &location.section,
                &location.directory
            ],
        )?)
    }

    /// Drop rows of names that are left with a single location.
    ///
    /// Rows whose package has no catalog row are kept so the owning tree's
    /// next pass can recover the package from that location.
    pub fn delete_singletons(conn: &Connection) -> Result<usize> {
        Ok(conn.execute(
            "DELETE FROM package_duplicate WHERE package IN
                (SELECT package FROM package_duplicate
                 GROUP BY package HAVING count(package) = 1)
             AND package IN (SELECT name FROM packages)",
            [],
        )?)
    }

    /// Whether `package` is recorded at a location other than `location`
    pub fn seen_elsewhere(conn: &Connection, package: &str, location: &GroupLocation) -> Result<bool> {
        let count: i64 = conn.query_row(
            "SELECT count(*) FROM package_duplicate
             WHERE package = ?1
             AND NOT (tree = ?2 AND category = ?3 AND section = ?4 AND directory = ?5)",
            params![
                package,
                &location.tree,
                location.category_column(),
                &location.section,
                &location.directory
            ],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn delete_for_tree(conn: &Connection, tree: &str) -> Result<usize> {
        Ok(conn.execute("DELETE FROM package_duplicate WHERE tree = ?1", [tree])?)
    }
}
