// src/db/models/group.rs

//! GroupEntry model - scan state of each group directory

use crate::error::Result;
use crate::spec::GroupLocation;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEntry {
    pub location: GroupLocation,
    pub commit_time: i64,
    /// Evaluation diagnostic of the group's spec file
    pub message: Option<String>,
}

impl GroupEntry {
    pub fn new(location: GroupLocation, commit_time: i64, message: Option<String>) -> Self {
        Self {
            location,
            commit_time,
            message,
        }
    }

    pub fn upsert(&self, conn: &Connection) -> Result<usize> {
        let loc = &self.location;
        Ok(conn.execute(
            "INSERT OR REPLACE INTO package_groups
                (tree, category, section, directory, commit_time, message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &loc.tree,
                loc.category_column(),
                &loc.section,
                &loc.directory,
                &self.commit_time,
                &self.message
            ],
        )?)
    }

    pub fn find(conn: &Connection, location: &GroupLocation) -> Result<Option<Self>> {
        let entry = conn
            .query_row(
                "SELECT commit_time, message FROM package_groups
                 WHERE tree = ?1 AND category = ?2 AND section = ?3 AND directory = ?4",
                params![
                    &location.tree,
                    location.category_column(),
                    &location.section,
                    &location.directory
                ],
                |row| Ok(Self::new(location.clone(), row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(entry)
    }

    /// Recorded commit time of every group of `tree`
    pub fn commit_times(conn: &Connection, tree: &str) -> Result<HashMap<GroupLocation, i64>> {
        let mut stmt = conn.prepare(
            "SELECT category, section, directory, commit_time FROM package_groups WHERE tree = ?1",
        )?;
        let times = stmt
            .query_map([tree], |row| {
                let category: String = row.get(0)?;
                let section: String = row.get(1)?;
                let directory: String = row.get(2)?;
                Ok((
                    GroupLocation::from_columns(tree, &category, &section, &directory),
                    row.get(3)?,
                ))
            })?
            .collect::<rusqlite::Result<HashMap<_, _>>>()?;
        Ok(times)
    }

    pub fn delete(conn: &Connection, location: &GroupLocation) -> Result<usize> {
        Ok(conn.execute(
            "DELETE FROM package_groups
             WHERE tree = ?1 AND category = ?2 AND section = ?3 AND directory = ?4",
            params![
                &location.tree,
                location.category_column(),
                &location.section,
                &location.directory
            ],
        )?)
    }

    pub fn delete_for_tree(conn: &Connection, tree: &str) -> Result<usize> {
        Ok(conn.execute("DELETE FROM package_groups WHERE tree = ?1", [tree])?)
    }
}
