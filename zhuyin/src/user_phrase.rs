//! An in-memory user-phrase store. Persistence is an opaque key-value blob owned by
//! the host, so this crate only provides the in-memory shape the core consumes;
//! saving/loading that blob is the host's responsibility.

use std::cell::RefCell;
use std::collections::HashMap;

use zhuyin_engine_core::lm::{Unigram, UnigramSource, UserPhraseStore};

#[derive(Debug, Default)]
pub struct MemoryUserPhraseStore {
    entries: RefCell<HashMap<String, Vec<String>>>,
}

impl MemoryUserPhraseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores previously serialized entries, e.g. from the host's opaque blob.
    pub fn from_entries(entries: HashMap<String, Vec<String>>) -> Self {
        MemoryUserPhraseStore { entries: RefCell::new(entries) }
    }

    /// Snapshots the current entries for the host to persist.
    pub fn snapshot(&self) -> HashMap<String, Vec<String>> {
        self.entries.borrow().clone()
    }
}

impl UnigramSource for MemoryUserPhraseStore {
    fn lookup(&self, key: &str) -> Vec<Unigram> {
        self.entries
            .borrow()
            .get(key)
            .map(|values| {
                values
                    .iter()
                    .map(|v| Unigram { key: key.to_string(), value: v.clone(), score: 0.0 })
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl UserPhraseStore for MemoryUserPhraseStore {
    /// Prepends `phrase` for `key`, deduplicating: an existing entry is moved to the
    /// front rather than duplicated.
    fn add_phrase(&self, key: &str, phrase: &str) {
        let mut entries = self.entries.borrow_mut();
        let list = entries.entry(key.to_string()).or_default();
        list.retain(|v| v != phrase);
        list.insert(0, phrase.to_string());
    }
}
