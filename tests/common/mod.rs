// tests/common/mod.rs

//! Shared helpers for catalog integration tests.

#![allow(dead_code)]

use abbs_meta::bashvar::ShellEvaluator;
use abbs_meta::db;
use abbs_meta::scanner::{Edit, Layout, ManifestCache, RevisionSource};
use abbs_meta::{Reconciler, TreeConfig, UpdateStats};
use rusqlite::Connection;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Create a catalog in a temporary directory.
///
/// Returns (TempDir, Connection) - keep the TempDir alive to prevent cleanup.
pub fn setup_catalog() -> (TempDir, Connection) {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("abbs.db");
    db::init(&db_path).unwrap();
    let conn = db::open(&db_path).unwrap();
    (temp_dir, conn)
}

/// Evaluator that never finds bash, for inputs the grammar accepts
pub fn grammar_only() -> ShellEvaluator {
    ShellEvaluator::new().with_bash("/nonexistent/bash")
}

pub fn update<S: RevisionSource>(conn: &mut Connection, tree: &TreeConfig, source: &S) -> UpdateStats {
    let mut cache = ManifestCache::default();
    Reconciler::new(conn, tree.clone(), Layout::default(), grammar_only())
        .update(source, &mut cache)
        .unwrap()
}

/// Edits creating a one-package group at `secpath/directory`
pub fn package_group(secpath: &str, directory: &str, name: &str, version: &str, deps: &str) -> Vec<Edit> {
    vec![
        Edit::write(
            &format!("{}/{}/spec", secpath, directory),
            format!("VER={}\nREL=1\nSRCS=\"tbl::https://example.org/{}-$VER.tar.gz\"\n", version, name),
        ),
        Edit::write(
            &format!("{}/{}/autobuild/defines", secpath, directory),
            format!(
                "PKGNAME={}\nPKGSEC=libs\nPKGDES=\"{} library\"\nPKGDEP=\"{}\"\n",
                name, name, deps
            ),
        ),
    ]
}

pub fn remove_group(secpath: &str, directory: &str) -> Vec<Edit> {
    vec![
        Edit::remove(&format!("{}/{}/spec", secpath, directory)),
        Edit::remove(&format!("{}/{}/autobuild/defines", secpath, directory)),
    ]
}

pub fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT count(*) FROM {}", table), [], |row| row.get(0))
        .unwrap()
}

pub fn write_file(root: &Path, path: &str, contents: &str) {
    let path = root.join(path);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}
