use std::collections::HashMap;
use std::sync::Mutex;

/// Slug of the partner that evolved most recently, shown once by the partner list.
pub const EVOLVED_SLUG_KEY: &str = "skillai-evolved-slug";

/// Ephemeral one-shot values, never written to disk.
///
/// A value set here is handed to exactly one reader: `take` clears it.
#[derive(Default)]
pub struct SessionFlags {
    inner: Mutex<HashMap<String, String>>,
}

impl SessionFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: &str, value: &str) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
    }

    pub fn take(&self, key: &str) -> Option<String> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).remove(key)
    }

    pub fn peek(&self, key: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }
}
