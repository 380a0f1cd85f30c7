//! Per-partner experience points.
//!
//! The tracker owns the slug → xp map for this device. Values are read from
//! the local key-value store the first time a slug is seen and written back
//! on every change. A failed write is logged and the in-memory value stays
//! authoritative for the rest of the process.

use skillai_core::config::EvolutionConfig;
use skillai_core::Partner;
use skillai_storage::{xp_key, KvStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

pub struct ExperienceTracker {
    store: Arc<dyn KvStore>,
    xp_per_message: u32,
    xp_to_evolve: u32,
    cache: Mutex<HashMap<String, u32>>,
}

impl ExperienceTracker {
    pub fn new(store: Arc<dyn KvStore>, config: &EvolutionConfig) -> Self {
        Self::with_rules(store, config.xp_per_message, config.xp_to_evolve)
    }

    pub fn with_rules(store: Arc<dyn KvStore>, xp_per_message: u32, xp_to_evolve: u32) -> Self {
        Self {
            store,
            xp_per_message,
            xp_to_evolve,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn xp_to_evolve(&self) -> u32 {
        self.xp_to_evolve
    }

    pub fn xp_per_message(&self) -> u32 {
        self.xp_per_message
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, u32>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn observe(&self, cache: &mut HashMap<String, u32>, slug: &str) -> u32 {
        if let Some(xp) = cache.get(slug) {
            return *xp;
        }
        let xp = match self.store.get(&xp_key(slug)) {
            Some(raw) => raw.trim().parse::<u32>().unwrap_or_else(|e| {
                warn!(slug = %slug, value = %raw, error = %e, "Ignoring unreadable stored XP");
                0
            }),
            None => 0,
        };
        cache.insert(slug.to_string(), xp);
        xp
    }

    /// Current XP, 0 for a partner never seen before.
    pub fn xp(&self, slug: &str) -> u32 {
        let mut cache = self.lock();
        self.observe(&mut cache, slug)
    }

    pub fn is_eligible(&self, slug: &str) -> bool {
        self.xp(slug) >= self.xp_to_evolve
    }

    /// Eligible and not evolution-disabled.
    pub fn can_evolve(&self, partner: &Partner) -> bool {
        !partner.evolution_disabled && self.is_eligible(&partner.slug)
    }

    /// Credit one successful chat turn. Returns the XP afterwards.
    ///
    /// No-op for evolution-disabled partners and for partners already at the
    /// threshold; otherwise the result is clamped to the threshold.
    pub fn on_message_sent(&self, partner: &Partner) -> u32 {
        let slug = partner.slug.as_str();
        let mut cache = self.lock();
        let current = self.observe(&mut cache, slug);

        if partner.evolution_disabled || current >= self.xp_to_evolve {
            return current;
        }

        let next = current
            .saturating_add(self.xp_per_message)
            .min(self.xp_to_evolve);
        cache.insert(slug.to_string(), next);
        if let Err(e) = self.store.set(&xp_key(slug), &next.to_string()) {
            warn!(slug = %slug, xp = next, error = %e, "Failed to persist XP");
        }
        debug!(slug = %slug, xp = next, "XP credited");
        if next >= self.xp_to_evolve {
            info!(slug = %slug, "Partner is ready to evolve");
        }
        next
    }

    pub fn reset(&self, slug: &str) {
        let mut cache = self.lock();
        cache.insert(slug.to_string(), 0);
        if let Err(e) = self.store.remove(&xp_key(slug)) {
            warn!(slug = %slug, error = %e, "Failed to clear stored XP");
        }
        debug!(slug = %slug, "XP reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillai_core::{Error, Result};
    use skillai_storage::{FileKvStore, MemoryKvStore};

    fn partner(slug: &str) -> Partner {
        Partner {
            slug: slug.to_string(),
            name: slug.to_string(),
            skill: "testing things".to_string(),
            ..Partner::default()
        }
    }

    fn tracker(store: Arc<dyn KvStore>) -> ExperienceTracker {
        ExperienceTracker::with_rules(store, 20, 100)
    }

    /// Reads succeed, writes always fail.
    struct ReadOnlyStore;

    impl KvStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> Option<String> {
            None
        }
        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(Error::Persistence("disk full".to_string()))
        }
        fn remove(&self, _key: &str) -> Result<()> {
            Err(Error::Persistence("disk full".to_string()))
        }
    }

    #[test]
    fn test_unseen_partner_starts_at_zero() {
        let t = tracker(Arc::new(MemoryKvStore::new()));
        assert_eq!(t.xp("nobody"), 0);
        assert!(!t.is_eligible("nobody"));
    }

    #[test]
    fn test_messages_accumulate_until_threshold() {
        let t = tracker(Arc::new(MemoryKvStore::new()));
        let p = partner("writer");
        let mut seen = Vec::new();
        for _ in 0..7 {
            seen.push(t.on_message_sent(&p));
        }
        assert_eq!(seen, vec![20, 40, 60, 80, 100, 100, 100]);
        assert!(t.is_eligible("writer"));
    }

    #[test]
    fn test_increment_is_clamped_at_threshold() {
        let store = Arc::new(MemoryKvStore::new());
        store.set(&xp_key("writer"), "90").unwrap();
        let t = tracker(store);
        assert_eq!(t.on_message_sent(&partner("writer")), 100);
        assert_eq!(t.on_message_sent(&partner("writer")), 100);
    }

    #[test]
    fn test_eligibility_boundary() {
        let t = tracker(Arc::new(MemoryKvStore::new()));
        let p = partner("coder");
        for _ in 0..4 {
            t.on_message_sent(&p);
        }
        assert_eq!(t.xp("coder"), 80);
        assert!(!t.is_eligible("coder"));
        t.on_message_sent(&p);
        assert!(t.is_eligible("coder"));
        assert!(t.can_evolve(&p));
    }

    #[test]
    fn test_disabled_partner_never_gains_xp() {
        let t = tracker(Arc::new(MemoryKvStore::new()));
        let mut p = partner("language-architect");
        p.evolution_disabled = true;
        for _ in 0..10 {
            assert_eq!(t.on_message_sent(&p), 0);
        }
        assert!(!t.can_evolve(&p));
    }

    #[test]
    fn test_disabled_partner_with_stored_xp_cannot_evolve() {
        let store = Arc::new(MemoryKvStore::new());
        store.set(&xp_key("locked"), "100").unwrap();
        let t = tracker(store);
        let mut p = partner("locked");
        p.evolution_disabled = true;
        assert!(t.is_eligible("locked"));
        assert!(!t.can_evolve(&p));
    }

    #[test]
    fn test_reset_clears_memory_and_storage() {
        let store = Arc::new(MemoryKvStore::new());
        let t = tracker(store.clone());
        let p = partner("writer");
        t.on_message_sent(&p);
        assert_eq!(store.get(&xp_key("writer")).as_deref(), Some("20"));
        t.reset("writer");
        assert_eq!(t.xp("writer"), 0);
        assert_eq!(store.get(&xp_key("writer")), None);
    }

    #[test]
    fn test_xp_survives_new_tracker() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("local_storage.json");
        {
            let t = tracker(Arc::new(FileKvStore::open(&path)));
            t.on_message_sent(&partner("writer"));
            t.on_message_sent(&partner("writer"));
        }
        let t = tracker(Arc::new(FileKvStore::open(&path)));
        assert_eq!(t.xp("writer"), 40);
    }

    #[test]
    fn test_unreadable_stored_value_counts_as_zero() {
        let store = Arc::new(MemoryKvStore::new());
        store.set(&xp_key("writer"), "lots").unwrap();
        let t = tracker(store);
        assert_eq!(t.xp("writer"), 0);
        assert_eq!(t.on_message_sent(&partner("writer")), 20);
    }

    #[test]
    fn test_persistence_failure_keeps_memory_value() {
        let t = tracker(Arc::new(ReadOnlyStore));
        let p = partner("writer");
        assert_eq!(t.on_message_sent(&p), 20);
        assert_eq!(t.on_message_sent(&p), 40);
        assert_eq!(t.xp("writer"), 40);
        t.reset("writer");
        assert_eq!(t.xp("writer"), 0);
    }

    #[test]
    fn test_xp_is_per_slug() {
        let t = tracker(Arc::new(MemoryKvStore::new()));
        t.on_message_sent(&partner("a"));
        t.on_message_sent(&partner("a"));
        t.on_message_sent(&partner("b"));
        assert_eq!(t.xp("a"), 40);
        assert_eq!(t.xp("b"), 20);
    }
}
