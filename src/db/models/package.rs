// src/db/models/package.rs

//! Package model - the authoritative location of each package name

use crate::error::Result;
use crate::spec::{GroupLocation, Package};
use rusqlite::{Connection, OptionalExtension, Row, params};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntry {
    pub name: String,
    pub tree: String,
    /// Empty when the section path has no category prefix
    pub category: String,
    pub section: String,
    /// `PKGSEC` from the defines file
    pub pkg_section: Option<String>,
    pub directory: String,
    pub description: Option<String>,
}

impl PackageEntry {
    pub fn from_package(package: &Package) -> Self {
        let location = &package.location;
        Self {
            name: package.name.clone(),
            tree: location.tree.clone(),
            category: location.category_column().to_string(),
            section: location.section.clone(),
            pkg_section: package.pkg_section.clone(),
            directory: location.directory.clone(),
            description: package.description.clone(),
        }
    }

    pub fn location(&self) -> GroupLocation {
        GroupLocation::from_columns(&self.tree, &self.category, &self.section, &self.directory)
    }

    /// Write this row, updating in place so dependent rows survive
    pub fn upsert(&self, conn: &Connection) -> Result<usize> {
        let changed = conn.execute(
            "INSERT INTO packages (name, tree, category, section, pkg_section, directory, description)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(name) DO UPDATE SET
                tree = excluded.tree, category = excluded.category,
                section = excluded.section, pkg_section = excluded.pkg_section,
                directory = excluded.directory, description = excluded.description",
            params![
                &self.name,
                &self.tree,
                &self.category,
                &self.section,
                &self.pkg_section,
                &self.directory,
                &self.description,
            ],
        )?;
        Ok(changed)
    }

    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Self>> {
        let entry = conn
            .query_row(
                "SELECT name, tree, category, section, pkg_section, directory, description
                 FROM packages WHERE name = ?1",
                [name],
                Self::from_row,
            )
            .optional()?;
        Ok(entry)
    }

    /// Names of packages recorded at a location
    pub fn names_at(conn: &Connection, location: &GroupLocation) -> Result<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT name FROM packages
             WHERE tree = ?1 AND category = ?2 AND section = ?3 AND directory = ?4
             ORDER BY name",
        )?;
        let names = stmt
            .query_map(
                params![
                    &location.tree,
                    location.category_column(),
                    &location.section,
                    &location.directory
                ],
                |row| row.get(0),
            )?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    pub fn find_by_tree(conn: &Connection, tree: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT name, tree, category, section, pkg_section, directory, description
             FROM packages WHERE tree = ?1 ORDER BY name",
        )?;
        let entries = stmt
            .query_map([tree], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    pub fn exists(conn: &Connection, name: &str) -> Result<bool> {
        let found: Option<i64> = conn
            .query_row("SELECT 1 FROM packages WHERE name = ?1", [name], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    pub fn delete(conn: &Connection, name: &str) -> Result<usize> {
        Ok(conn.execute("DELETE FROM packages WHERE name = ?1", [name])?)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get(0)?,
            tree: row.get(1)?,
            category: row.get(2)?,
            section: row.get(3)?,
            pkg_section: row.get(4)?,
            directory: row.get(5)?,
            description: row.get(6)?,
        })
    }
}
