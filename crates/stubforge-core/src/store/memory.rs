//! In-process [`StateStore`] for tests and ephemeral sessions.

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::errors::ForgeResult;
use crate::store::state::StateStore;

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<IndexMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys in first-insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl StateStore for MemoryStore {
    fn load(&self, key: &str) -> ForgeResult<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> ForgeResult<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&self, key: &str) -> ForgeResult<()> {
        self.entries.lock().shift_remove(key);
        Ok(())
    }

    fn clear_all(&self, keys: &[String]) -> ForgeResult<()> {
        let mut entries = self.entries.lock();
        entries.retain(|key, _| !keys.contains(key));
        Ok(())
    }
}
