//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.
//! Counter rows are seeded separately (see [`seed_counters`]) because their
//! descriptions come from the caller.

use crate::types::{CounterDescriptions, CounterName};
use rusqlite::{params, Connection};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: counters and the two token tables
    r#"
    CREATE TABLE IF NOT EXISTS counters (
        name             TEXT PRIMARY KEY,
        counter          INTEGER NOT NULL DEFAULT 0,
        description      TEXT NOT NULL DEFAULT ''
    );

    CREATE TABLE IF NOT EXISTS positive_classification (
        token            TEXT PRIMARY KEY,
        count            INTEGER NOT NULL CHECK (count >= 1)
    );

    CREATE TABLE IF NOT EXISTS negative_classification (
        token            TEXT PRIMARY KEY,
        count            INTEGER NOT NULL CHECK (count >= 1)
    );
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version = get_schema_version(conn)?;

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Insert any missing counter rows with value 0.
///
/// Existing rows keep both their value and their description.
/// Returns the number of rows created.
pub fn seed_counters(conn: &Connection, descriptions: &CounterDescriptions) -> crate::error::Result<usize> {
    let mut created = 0;
    for name in CounterName::ALL {
        created += conn.execute(
            "INSERT OR IGNORE INTO counters (name, counter, description) VALUES (?1, 0, ?2)",
            params![name.as_str(), descriptions.get(name)],
        )?;
    }
    Ok(created)
}

/// Store tables present in a file that has no schema version yet.
///
/// A non-empty result means the file was written by something else (for
/// example a counters table without a key on `name`) and must not be
/// migrated in place.
pub fn unversioned_tables(conn: &Connection) -> crate::error::Result<Vec<String>> {
    if get_schema_version(conn)? != 0 {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table'
         AND name IN ('counters', 'positive_classification', 'negative_classification')
         ORDER BY name",
    )?;
    let tables = stmt
        .query_map([], |r| r.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(tables)
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
