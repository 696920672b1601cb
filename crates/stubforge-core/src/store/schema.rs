//! SQLite schema for the state store and its versioned migrations.
//!
//! [`SCHEMA_STATEMENTS`] only creates the bookkeeping tables. The
//! `state_entries` table itself is built up by [`MIGRATIONS`], so a database
//! written by any earlier build is upgraded the same way a new one is created.

use rusqlite::{params, Connection};
use tracing::{info, warn};

use crate::errors::{ForgeError, ForgeResult};

/// Bookkeeping DDL, replay-safe on an initialised database.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS store_meta (
        key TEXT PRIMARY KEY,
        value TEXT
    );",
    "CREATE TABLE IF NOT EXISTS migration_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        from_version INTEGER NOT NULL,
        to_version INTEGER NOT NULL,
        description TEXT NOT NULL,
        status TEXT NOT NULL,
        error_message TEXT,
        applied_at TEXT DEFAULT CURRENT_TIMESTAMP
    );",
];

type MigrationStep = fn(&Connection) -> ForgeResult<()>;

/// Ordered upgrade steps. Entry `i` moves the store from version `i` to `i + 1`.
pub const MIGRATIONS: &[(&str, MigrationStep)] = &[
    ("create state_entries", create_state_entries),
    ("track payload size per entry", add_payload_size),
    ("split workspace namespace out of keys", add_namespace),
];

pub const SCHEMA_VERSION: i32 = MIGRATIONS.len() as i32;

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Apply every pending step up to [`SCHEMA_VERSION`].
pub fn migrate_schema(conn: &Connection) -> ForgeResult<()> {
    migrate_schema_to(conn, SCHEMA_VERSION)
}

/// Apply pending steps up to `target`. Each step commits on its own, so a
/// failing step leaves the store at the last version that applied cleanly.
pub fn migrate_schema_to(conn: &Connection, target: i32) -> ForgeResult<()> {
    let current = get_schema_version(conn);
    if current > SCHEMA_VERSION {
        warn!("State store is at v{current}, newer than this build (v{SCHEMA_VERSION})");
        return Ok(());
    }

    let pending = MIGRATIONS
        .iter()
        .enumerate()
        .take(target.clamp(0, SCHEMA_VERSION) as usize)
        .skip(current.max(0) as usize);

    for (index, (description, step)) in pending {
        let from = index as i32;
        let to = from + 1;
        conn.execute_batch("SAVEPOINT state_migration;")?;
        let applied = step(conn)
            .and_then(|()| set_schema_version(conn, to))
            .and_then(|()| record_migration(conn, from, to, description, None));

        if let Err(e) = applied {
            conn.execute_batch("ROLLBACK TO SAVEPOINT state_migration; RELEASE SAVEPOINT state_migration;")?;
            if let Err(history) = record_migration(conn, from, to, description, Some(&e.to_string())) {
                warn!("Could not record failed migration to v{to}: {history}");
            }
            return Err(ForgeError::Store(format!(
                "migration to v{to} ({description}) failed: {e}"
            )));
        }
        conn.execute_batch("RELEASE SAVEPOINT state_migration;")?;
        info!("State store migrated to v{to}: {description}");
    }
    Ok(())
}

/// Stored schema version, 0 when absent or unparseable.
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row(
        "SELECT value FROM store_meta WHERE key = 'schema_version';",
        [],
        |row| row.get::<_, String>(0),
    )
    .ok()
    .and_then(|v| v.parse::<i32>().ok())
    .unwrap_or(0)
}

fn set_schema_version(conn: &Connection, version: i32) -> ForgeResult<()> {
    conn.execute(
        "INSERT INTO store_meta(key, value) VALUES('schema_version', ?1) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
        params![version.to_string()],
    )?;
    Ok(())
}

fn record_migration(
    conn: &Connection,
    from: i32,
    to: i32,
    description: &str,
    error: Option<&str>,
) -> ForgeResult<()> {
    let status = if error.is_some() { "failed" } else { "applied" };
    conn.execute(
        "INSERT INTO migration_history(from_version, to_version, description, status, error_message) \
         VALUES (?1, ?2, ?3, ?4, ?5);",
        params![from, to, description, status, error],
    )?;
    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> bool {
    conn.prepare(&format!("SELECT {column} FROM {table} LIMIT 0;")).is_ok()
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

fn create_state_entries(conn: &Connection) -> ForgeResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS state_entries (
             key TEXT PRIMARY KEY,
             value TEXT NOT NULL,
             updated_at TEXT DEFAULT CURRENT_TIMESTAMP
         );
         CREATE INDEX IF NOT EXISTS idx_state_entries_updated ON state_entries(updated_at);",
    )?;
    Ok(())
}

/// Byte length of each stored JSON payload, backfilled for existing rows.
fn add_payload_size(conn: &Connection) -> ForgeResult<()> {
    if !has_column(conn, "state_entries", "size_bytes") {
        conn.execute_batch("ALTER TABLE state_entries ADD COLUMN size_bytes INTEGER NOT NULL DEFAULT 0;")?;
    }
    conn.execute_batch("UPDATE state_entries SET size_bytes = length(CAST(value AS BLOB));")?;
    Ok(())
}

/// Keys are `<namespace>:<collection>`; the namespace gets its own indexed
/// column so several workspaces can share one file.
fn add_namespace(conn: &Connection) -> ForgeResult<()> {
    if !has_column(conn, "state_entries", "namespace") {
        conn.execute_batch("ALTER TABLE state_entries ADD COLUMN namespace TEXT NOT NULL DEFAULT '';")?;
    }
    conn.execute_batch(
        "UPDATE state_entries SET namespace = \
             CASE WHEN instr(key, ':') > 0 THEN substr(key, 1, instr(key, ':') - 1) ELSE '' END;
         CREATE INDEX IF NOT EXISTS idx_state_entries_namespace ON state_entries(namespace);",
    )?;
    Ok(())
}
