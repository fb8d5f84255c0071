use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, Result};

use super::ReminderStorage;

/// Process-local storage. Clones share the same map, so a caller can keep a
/// handle and inspect what the scheduler wrote.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, blob: &str) -> Self {
        let storage = Self::new();
        if let Ok(mut guard) = storage.entries.lock() {
            guard.insert(key.to_string(), blob.to_string());
        }
        storage
    }
}

impl ReminderStorage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory storage lock poisoned"))?;
        Ok(guard.get(key).cloned())
    }

    fn save(&self, key: &str, blob: &str) -> Result<()> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory storage lock poisoned"))?;
        guard.insert(key.to_string(), blob.to_string());
        Ok(())
    }
}
