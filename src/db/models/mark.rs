// src/db/models/mark.rs

//! TreeMark model - the last revision reconciled for a tree

use crate::error::Result;
use crate::scanner::Revision;
use rusqlite::{Connection, OptionalExtension, params};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeMark {
    pub tree: String,
    pub revision_seq: i64,
    pub revision_id: String,
    pub commit_time: i64,
}

impl TreeMark {
    pub fn new(tree: &str, revision: &Revision) -> Self {
        Self {
            tree: tree.to_string(),
            revision_seq: revision.seq,
            revision_id: revision.id.clone(),
            commit_time: revision.timestamp,
        }
    }

    pub fn find(conn: &Connection, tree: &str) -> Result<Option<Self>> {
        let mark = conn
            .query_row(
                "SELECT tree, revision_seq, revision_id, commit_time FROM tree_marks WHERE tree = ?1",
                [tree],
                |row| {
                    Ok(Self {
                        tree: row.get(0)?,
                        revision_seq: row.get(1)?,
                        revision_id: row.get(2)?,
                        commit_time: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(mark)
    }

    pub fn save(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO tree_marks (tree, revision_seq, revision_id, commit_time)
             VALUES (?1, ?2, ?3, ?4)",
            params![&self.tree, &self.revision_seq, &self.revision_id, &self.commit_time],
        )?;
        Ok(())
    }

    /// Whether `revision` was already reconciled
    pub fn covers(&self, revision: &Revision) -> bool {
        revision.order_key() <= (self.commit_time, self.revision_seq)
    }

    pub fn delete(conn: &Connection, tree: &str) -> Result<usize> {
        Ok(conn.execute("DELETE FROM tree_marks WHERE tree = ?1", [tree])?)
    }
}
