pub mod flags;
pub mod local;

pub use flags::{SessionFlags, EVOLVED_SLUG_KEY};
pub use local::{FileKvStore, KvStore, MemoryKvStore};

/// Cached partner list, written whenever the directory changes.
pub const PARTNERS_KEY: &str = "skillai-partners";

/// Storage key holding a partner's experience points.
pub fn xp_key(slug: &str) -> String {
    format!("xp-{}", slug)
}
