//! SQLite-backed [`StateStore`].
//!
//! Each operation opens its own connection so callers never manage
//! connection lifetime; the schema is created and migrated on open.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::errors::{ForgeError, ForgeResult};
use crate::store::schema;
use crate::store::state::StateStore;

/// `~` and `~/...` resolve under `$HOME`; `~user` forms pass through.
fn resolve_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) if rest.as_os_str().is_empty() => PathBuf::from(home),
        (Ok(rest), Some(home)) => Path::new(&home).join(rest),
        _ => path.to_path_buf(),
    }
}

/// Workspace namespace of a `<namespace>:<collection>` key.
fn key_namespace(key: &str) -> &str {
    key.split_once(':').map_or("", |(namespace, _)| namespace)
}

/// Key/value state table in a single SQLite file.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    /// Resolve `db_path` (tilde and relative paths), create parent
    /// directories and initialise the schema.
    pub fn open(db_path: impl AsRef<Path>) -> ForgeResult<Self> {
        let expanded = resolve_home(db_path.as_ref());
        let resolved = if expanded.is_absolute() {
            expanded
        } else {
            std::env::current_dir()?.join(&expanded)
        };
        if resolved.is_dir() {
            return Err(ForgeError::Store(format!(
                "{} is a directory, not a database file",
                resolved.display()
            )));
        }
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = Self { db_path: resolved };
        store.init_schema()?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> ForgeResult<Connection> {
        Ok(Connection::open(&self.db_path)?)
    }

    fn init_schema(&self) -> ForgeResult<()> {
        let conn = self.connect()?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        for stmt in schema::SCHEMA_STATEMENTS {
            conn.execute_batch(stmt)?;
        }
        schema::migrate_schema(&conn)?;
        debug!(
            "Opened state store {} at schema v{}",
            self.db_path.display(),
            schema::get_schema_version(&conn)
        );
        Ok(())
    }

    /// Stored keys in lexical order.
    pub fn keys(&self) -> ForgeResult<Vec<String>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT key FROM state_entries ORDER BY key;")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    /// Namespaces with at least one stored key, in lexical order.
    pub fn namespaces(&self) -> ForgeResult<Vec<String>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT DISTINCT namespace FROM state_entries ORDER BY namespace;")?;
        let namespaces = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(namespaces)
    }

    /// Total payload bytes stored under keys starting with `prefix`.
    pub fn stored_bytes(&self, prefix: &str) -> ForgeResult<i64> {
        let conn = self.connect()?;
        let total = conn.query_row(
            "SELECT COALESCE(SUM(size_bytes), 0) FROM state_entries WHERE substr(key, 1, length(?1)) = ?1;",
            params![prefix],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}

impl StateStore for SqliteStore {
    fn load(&self, key: &str) -> ForgeResult<Option<String>> {
        let conn = self.connect()?;
        let value = conn
            .query_row(
                "SELECT value FROM state_entries WHERE key = ?1;",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn save(&self, key: &str, value: &str) -> ForgeResult<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO state_entries(key, namespace, value, size_bytes, updated_at) \
             VALUES(?1, ?2, ?3, ?4, CURRENT_TIMESTAMP) \
             ON CONFLICT(key) DO UPDATE SET \
                 value = excluded.value, \
                 size_bytes = excluded.size_bytes, \
                 updated_at = excluded.updated_at;",
            params![key, key_namespace(key), value, value.len() as i64],
        )?;
        Ok(())
    }

    fn clear(&self, key: &str) -> ForgeResult<()> {
        let conn = self.connect()?;
        conn.execute("DELETE FROM state_entries WHERE key = ?1;", params![key])?;
        Ok(())
    }

    /// All deletes run in one transaction; a failure leaves every key in place.
    fn clear_all(&self, keys: &[String]) -> ForgeResult<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare("DELETE FROM state_entries WHERE key = ?1;")?;
            for key in keys {
                stmt.execute(params![key])?;
            }
        }
        tx.commit()?;
        debug!("Cleared {} state keys", keys.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_home() {
        assert_eq!(resolve_home(Path::new("data/state.db")), PathBuf::from("data/state.db"));
        assert_eq!(resolve_home(Path::new("~alice/state.db")), PathBuf::from("~alice/state.db"));
        if let Some(home) = std::env::var_os("HOME") {
            assert_eq!(
                resolve_home(Path::new("~/.stubforge/state.db")),
                Path::new(&home).join(".stubforge/state.db")
            );
            assert_eq!(resolve_home(Path::new("~")), PathBuf::from(home));
        }
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("state.db");
        let store = SqliteStore::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store.db_path(), path.as_path());
    }

    #[test]
    fn test_directory_path_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let err = SqliteStore::open(tmp.path()).unwrap_err();
        assert!(matches!(err, ForgeError::Store(_)));
    }

    #[test]
    fn test_upsert_load_clear() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(tmp.path().join("state.db")).unwrap();

        assert_eq!(store.load("stubforge:step").unwrap(), None);
        store.save("stubforge:step", "1").unwrap();
        store.save("stubforge:step", "2").unwrap();
        store.save("stubforge:classes", "[]").unwrap();
        assert_eq!(store.load("stubforge:step").unwrap().as_deref(), Some("2"));
        assert_eq!(store.keys().unwrap(), vec!["stubforge:classes", "stubforge:step"]);
        assert_eq!(store.stored_bytes("stubforge:").unwrap(), 3);
        assert_eq!(store.stored_bytes("other:").unwrap(), 0);

        store.clear("stubforge:step").unwrap();
        store.clear("stubforge:step").unwrap();
        assert_eq!(store.keys().unwrap(), vec!["stubforge:classes"]);
    }

    #[test]
    fn test_namespaces_from_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(tmp.path().join("state.db")).unwrap();
        store.save("stubforge:classes", "[]").unwrap();
        store.save("archive:classes", "[]").unwrap();
        store.save("stubforge:currentStep", "1").unwrap();
        store.save("bare", "0").unwrap();
        assert_eq!(store.namespaces().unwrap(), vec!["", "archive", "stubforge"]);
    }

    #[test]
    fn test_clear_all_in_one_transaction() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(tmp.path().join("state.db")).unwrap();
        store.save("stubforge:step", "1").unwrap();
        store.save("stubforge:classes", "[]").unwrap();
        store.save("other:step", "4").unwrap();

        store
            .clear_all(&["stubforge:step".to_string(), "stubforge:classes".to_string()])
            .unwrap();
        assert_eq!(store.keys().unwrap(), vec!["other:step"]);
        store.clear_all(&[]).unwrap();
        assert_eq!(store.keys().unwrap(), vec!["other:step"]);
    }

    #[test]
    fn test_values_survive_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state.db");
        SqliteStore::open(&path).unwrap().save("k", "{\"a\":1}").unwrap();
        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.load("k").unwrap().as_deref(), Some("{\"a\":1}"));
    }
}
