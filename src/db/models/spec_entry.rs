// src/db/models/spec_entry.rs

//! SpecEntry model - remaining spec and defines keys of a package

use crate::bashvar::Variables;
use crate::error::Result;
use rusqlite::{Connection, params};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecEntry {
    pub package: String,
    pub key: String,
    pub value: String,
}

impl SpecEntry {
    /// Replace every key of `package` with `spec`
    pub fn replace_all(conn: &Connection, package: &str, spec: &Variables) -> Result<usize> {
        let mut changed = Self::delete_for_package(conn, package)?;
        let mut stmt =
            conn.prepare("INSERT OR REPLACE INTO package_spec (package, key, value) VALUES (?1, ?2, ?3)")?;
        for (key, value) in spec {
            changed += stmt.execute(params![package, key, value])?;
        }
        Ok(changed)
    }

    pub fn find_by_package(conn: &Connection, package: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT package, key, value FROM package_spec WHERE package = ?1 ORDER BY key",
        )?;
        let entries = stmt
            .query_map([package], |row| {
                Ok(Self {
                    package: row.get(0)?,
                    key: row.get(1)?,
                    value: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    pub fn delete_for_package(conn: &Connection, package: &str) -> Result<usize> {
        Ok(conn.execute("DELETE FROM package_spec WHERE package = ?1", [package])?)
    }
}
