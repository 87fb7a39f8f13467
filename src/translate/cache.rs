//! In-memory translation cache.
//! Key: exact source text (case and whitespace sensitive). Unbounded,
//! lives as long as the page does.

use std::collections::HashMap;

use parking_lot::Mutex;

#[derive(Default)]
pub struct TranslationCache {
    inner: Mutex<HashMap<String, String>>,
}

impl TranslationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a cached translation.
    pub fn get(&self, source: &str) -> Option<String> {
        self.inner.lock().get(source).cloned()
    }

    /// Insert or overwrite the translation for `source`. Last write wins.
    pub fn insert(&self, source: String, translated_text: String) {
        self.inner.lock().insert(source, translated_text);
    }

    /// Evict one entry. Returns the evicted translation, if any.
    pub fn remove(&self, source: &str) -> Option<String> {
        self.inner.lock().remove(source)
    }

    pub fn contains(&self, source: &str) -> bool {
        self.inner.lock().contains_key(source)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
