// src/db/schema.rs

//! Catalog schema and migrations
//!
//! Tables come from the metadata catalog layout used by the abbs package
//! site: package rows keyed by name, version rows per branch and
//! architecture, spec key/value rows and declared dependencies. Bookkeeping
//! tables record duplicates, per-group scan state, per-package changelog
//! entries and each tree's replay marker.

use crate::error::{Error, Result};
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version = conn
        .query_row(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Apply all pending migrations to bring the database up to date
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;
    debug!("Current schema version: {}", current_version);

    if current_version >= SCHEMA_VERSION {
        return Ok(());
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("Applying migration to version {}", version);
        apply_migration(conn, version)?;
        set_schema_version(conn, version)?;
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        _ => Err(Error::DatabaseError(format!(
            "Unknown migration version: {}",
            version
        ))),
    }
}

/// Initial schema - Version 1
fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        -- Trees: one per configured abbs source tree
        CREATE TABLE trees (
            name TEXT PRIMARY KEY,
            category TEXT,
            url TEXT,
            priority INTEGER NOT NULL DEFAULT 0,
            mainbranch TEXT NOT NULL
        );

        -- Packages: the authoritative location of each package name
        CREATE TABLE packages (
            name TEXT PRIMARY KEY,
            tree TEXT NOT NULL,
            category TEXT NOT NULL,
            section TEXT NOT NULL,
            pkg_section TEXT,
            directory TEXT NOT NULL,
            description TEXT
        );

        CREATE INDEX idx_packages_location ON packages(tree, category, section, directory);

        -- Every location a name was seen at while it had more than one
        CREATE TABLE package_duplicate (
            package TEXT NOT NULL,
            tree TEXT NOT NULL,
            category TEXT NOT NULL,
            section TEXT NOT NULL,
            directory TEXT NOT NULL,
            UNIQUE (package, tree, category, section, directory)
        );

        CREATE INDEX idx_package_duplicate ON package_duplicate(package);

        CREATE TABLE package_versions (
            package TEXT NOT NULL,
            branch TEXT NOT NULL,
            architecture TEXT NOT NULL DEFAULT '',
            version TEXT,
            release TEXT,
            epoch TEXT,
            commit_time INTEGER,
            PRIMARY KEY (package, branch, architecture)
        );

        CREATE INDEX idx_package_versions ON package_versions(package, branch);

        CREATE TABLE package_spec (
            package TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT,
            PRIMARY KEY (package, key),
            FOREIGN KEY (package) REFERENCES packages(name) ON DELETE CASCADE
        );

        CREATE INDEX idx_package_spec ON package_spec(package);

        -- Dependency names are not required to exist in packages
        CREATE TABLE package_dependencies (
            package TEXT NOT NULL,
            dependency TEXT NOT NULL,
            relop TEXT,
            version TEXT,
            architecture TEXT NOT NULL DEFAULT '',
            relationship TEXT NOT NULL,
            PRIMARY KEY (package, dependency, architecture, relationship),
            FOREIGN KEY (package) REFERENCES packages(name) ON DELETE CASCADE
        );

        CREATE INDEX idx_package_dependencies ON package_dependencies(package);
        CREATE INDEX idx_package_dependencies_dep ON package_dependencies(dependency);

        -- Scan state of each group directory
        CREATE TABLE package_groups (
            tree TEXT NOT NULL,
            category TEXT NOT NULL,
            section TEXT NOT NULL,
            directory TEXT NOT NULL,
            commit_time INTEGER NOT NULL,
            message TEXT,
            PRIMARY KEY (tree, category, section, directory)
        );

        -- Changelog: one entry per package per revision that touched it
        CREATE TABLE package_changes (
            tree TEXT NOT NULL,
            revision TEXT NOT NULL,
            package TEXT NOT NULL,
            version TEXT,
            release TEXT,
            epoch TEXT,
            message TEXT NOT NULL,
            commit_time INTEGER NOT NULL,
            PRIMARY KEY (tree, revision, package)
        );

        CREATE INDEX idx_package_changes_package ON package_changes(package, commit_time);

        -- Last revision reconciled for each tree
        CREATE TABLE tree_marks (
            tree TEXT PRIMARY KEY,
            revision_seq INTEGER NOT NULL,
            revision_id TEXT NOT NULL,
            commit_time INTEGER NOT NULL
        );

        CREATE VIEW v_packages AS
        SELECT p.name name, p.tree tree, t.category tree_category,
            pv.branch branch, p.category category, p.section section,
            p.pkg_section pkg_section, p.directory directory,
            p.description description,
            ((CASE WHEN ifnull(pv.epoch, '') = '' THEN ''
                ELSE pv.epoch || ':' END) || pv.version ||
             (CASE WHEN ifnull(pv.release, '') = '' THEN ''
                ELSE '-' || pv.release END)) full_version,
            pv.commit_time commit_time
        FROM packages p
        LEFT JOIN trees t ON t.name = p.tree
        LEFT JOIN package_versions pv
            ON pv.package = p.name AND pv.branch = t.mainbranch
            AND pv.architecture = '';
        ",
    )?;

    info!("Schema version 1 created successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_db() -> (NamedTempFile, Connection) {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        (temp_file, conn)
    }

    #[test]
    fn test_schema_version_tracking() {
        let (_temp, conn) = create_test_db();
        assert_eq!(get_schema_version(&conn).unwrap(), 0);

        set_schema_version(&conn, 1).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 1);
    }

    #[test]
    fn test_migrate_creates_all_tables() {
        let (_temp, conn) = create_test_db();
        migrate(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type IN ('table', 'view') ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "trees",
            "packages",
            "package_duplicate",
            "package_versions",
            "package_spec",
            "package_dependencies",
            "package_groups",
            "package_changes",
            "tree_marks",
            "v_packages",
            "schema_version",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {}", table);
        }
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let (_temp, conn) = create_test_db();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_duplicate_rows_are_unique() {
        let (_temp, conn) = create_test_db();
        migrate(&conn).unwrap();

        let insert = "INSERT INTO package_duplicate VALUES ('zlib', 't', 'base', 'libs', 'zlib')";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }

    #[test]
    fn test_version_view_assembles_full_version() {
        let (_temp, conn) = create_test_db();
        migrate(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO trees VALUES ('t', 'base', NULL, 0, 'stable');
             INSERT INTO packages VALUES ('a', 't', 'base', 'libs', NULL, 'a', NULL);
             INSERT INTO packages VALUES ('b', 't', 'base', 'libs', NULL, 'b', NULL);
             INSERT INTO package_versions VALUES ('a', 'stable', '', '1.0', '2', '1', 5);
             INSERT INTO package_versions VALUES ('a', 'stable', 'arm64', '0.9', NULL, NULL, 5);
             INSERT INTO package_versions VALUES ('b', 'stable', '', '3', '', NULL, 5);",
        )
        .unwrap();

        let full: Vec<(String, String)> = conn
            .prepare("SELECT name, full_version FROM v_packages ORDER BY name")
            .unwrap()
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(
            full,
            vec![
                ("a".to_string(), "1:1.0-2".to_string()),
                ("b".to_string(), "3".to_string())
            ]
        );
    }
}
