// src/db/models/tree.rs

//! Tree model - one row per configured abbs tree

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    pub name: String,
    /// `base`, `bsp`, ...
    pub category: Option<String>,
    pub url: Option<String>,
    /// Higher wins when two trees define the same package
    pub priority: i64,
    pub mainbranch: String,
}

impl Tree {
    pub fn new(name: &str, mainbranch: &str) -> Self {
        Self {
            name: name.to_string(),
            category: None,
            url: None,
            priority: 0,
            mainbranch: mainbranch.to_string(),
        }
    }

    /// Insert or update this tree's row
    pub fn upsert(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO trees (name, category, url, priority, mainbranch)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(name) DO UPDATE SET
                category = excluded.category, url = excluded.url,
                priority = excluded.priority, mainbranch = excluded.mainbranch",
            params![
                &self.name,
                &self.category,
                &self.url,
                &self.priority,
                &self.mainbranch
            ],
        )?;
        Ok(())
    }

    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Self>> {
        let tree = conn
            .query_row(
                "SELECT name, category, url, priority, mainbranch FROM trees WHERE name = ?1",
                [name],
                Self::from_row,
            )
            .optional()?;
        Ok(tree)
    }

    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT name, category, url, priority, mainbranch FROM trees ORDER BY name",
        )?;
        let trees = stmt
            .query_map([], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(trees)
    }

    /// Priority of a tree, 0 for trees without a row
    pub fn priority_of(conn: &Connection, name: &str) -> Result<i64> {
        Ok(Self::find_by_name(conn, name)?.map_or(0, |t| t.priority))
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get(0)?,
            category: row.get(1)?,
            url: row.get(2)?,
            priority: row.get(3)?,
            mainbranch: row.get(4)?,
        })
    }
}
