//! Opaque key/value persistence for workspace collections.
//!
//! The core only asks a store for "the last known value under this key" and
//! "persist this value under this key". Values are JSON text.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::ForgeResult;

pub trait StateStore {
    fn load(&self, key: &str) -> ForgeResult<Option<String>>;

    /// Insert or replace the value under `key`.
    fn save(&self, key: &str, value: &str) -> ForgeResult<()>;

    /// Remove `key`; removing a missing key is not an error.
    fn clear(&self, key: &str) -> ForgeResult<()>;

    /// Remove every key in `keys`. Stores that can should do this atomically.
    fn clear_all(&self, keys: &[String]) -> ForgeResult<()> {
        for key in keys {
            self.clear(key)?;
        }
        Ok(())
    }
}

/// Decode the JSON value under `key`, `None` when the key is absent.
pub fn load_json<T, S>(store: &S, key: &str) -> ForgeResult<Option<T>>
where
    T: DeserializeOwned,
    S: StateStore + ?Sized,
{
    match store.load(key)? {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

pub fn save_json<T, S>(store: &S, key: &str, value: &T) -> ForgeResult<()>
where
    T: Serialize + ?Sized,
    S: StateStore + ?Sized,
{
    store.save(key, &serde_json::to_string(value)?)
}
