//! Translation cache.
//!
//! Repeated questions against an unchanged schema reuse the previous raw
//! translator output. The key covers everything the prompt is built from.
//! The cache holds a bounded number of entries and evicts the oldest first.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Entries kept before the oldest is evicted.
pub const DEFAULT_CAPACITY: usize = 256;

/// Composite cache key: schema content, dialect, server version and question.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TranslationKey {
    pub schema_hash: u64,
    pub dialect: String,
    pub version: Option<String>,
    pub question: String,
}

impl TranslationKey {
    pub fn new(schema_hash: u64, dialect: &str, version: Option<&str>, question: &str) -> Self {
        Self {
            schema_hash,
            dialect: dialect.to_string(),
            version: version.map(str::to_string),
            question: question.trim().to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<TranslationKey, String>,
    order: VecDeque<TranslationKey>,
}

/// Thread-safe map from translation keys to raw translator output.
#[derive(Debug)]
pub struct TranslationCache {
    entries: Mutex<Entries>,
    capacity: usize,
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl TranslationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache holding at most `capacity` entries (at least one).
    fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, key: &TranslationKey) -> Option<String> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.map.get(key).cloned())
    }

    pub fn insert(&self, key: TranslationKey, output: String) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };

        if entries.map.insert(key.clone(), output).is_some() {
            return;
        }
        entries.order.push_back(key);

        while entries.order.len() > self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                entries.map.remove(&oldest);
            }
        }
    }

    /// Drops every entry. Called when the schema is refreshed.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.map.clear();
            entries.order.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
