use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::error::PersistenceError;

/// Key/value store behind persisted fields.
///
/// Failures are reported to the caller but never stop computation; the
/// in-memory graph stays authoritative.
pub trait Storage {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
    /// Every stored key, in no particular order.
    fn keys(&self) -> Result<Vec<String>, PersistenceError>;
}

/// Volatile storage, used for tests and for bundles loaded without a backing store.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RefCell<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(entries: BTreeMap<String, String>) -> Self {
        Self {
            entries: RefCell::new(entries),
        }
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(self.entries.borrow().keys().cloned().collect())
    }
}
