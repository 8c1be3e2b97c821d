//! C5: TTL-bounded storage cache.
//!
//! Single-writer under a mutex; readers get an atomic snapshot copy. Critical
//! sections are a copy-out or a replace-with, never a network call — the
//! mutex is never held across an `.await`.

use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use crate::storage::StorageSample;

#[derive(Debug, Clone, Default)]
struct Entry {
    samples: Vec<StorageSample>,
    captured_at: Option<SystemTime>,
}

pub struct StorageCache {
    ttl: Duration,
    entry: Mutex<Entry>,
}

/// What [`StorageCache::lookup`] returns: the cached samples (possibly
/// empty, if no entry has ever been stored), whether they are still within
/// TTL, and the wall-clock time they were captured.
pub struct Lookup {
    pub samples: Vec<StorageSample>,
    pub fresh: bool,
    pub captured_at: Option<SystemTime>,
}

impl StorageCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(Entry::default()),
        }
    }

    pub fn lookup(&self) -> Lookup {
        let entry = self.entry.lock().expect("storage cache mutex poisoned");
        let fresh = entry
            .captured_at
            .map(|t| t.elapsed().map(|age| age < self.ttl).unwrap_or(false))
            .unwrap_or(false);
        Lookup {
            samples: entry.samples.clone(),
            fresh,
            captured_at: entry.captured_at,
        }
    }

    pub fn store(&self, samples: Vec<StorageSample>) {
        let mut entry = self.entry.lock().expect("storage cache mutex poisoned");
        entry.samples = samples;
        entry.captured_at = Some(SystemTime::now());
    }

    pub fn has_entry(&self) -> bool {
        self.entry
            .lock()
            .expect("storage cache mutex poisoned")
            .captured_at
            .is_some()
    }
}
