use std::collections::HashMap;
use std::sync::Mutex;

use crate::{PreferenceResult, PreferenceStore};

/// In-memory store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: Mutex<HashMap<String, bool>>,
}

impl MemoryPreferences {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with `key` already written.
    #[must_use]
    pub fn with(key: &str, value: bool) -> Self {
        Self {
            values: Mutex::new(HashMap::from([(key.to_owned(), value)])),
        }
    }

    /// Raw value of `key`, `None` when it was never written.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<bool> {
        self.values
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .copied()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).unwrap_or(default)
    }

    fn set_bool(&self, key: &str, value: bool) -> PreferenceResult<()> {
        self.values
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key.to_owned(), value);
        Ok(())
    }
}
