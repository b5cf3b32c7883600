//! Advertisement caching.
//!
//! Drivers may expose their own cache through
//! [`LegacyDriver::cache`](crate::driver::LegacyDriver::cache); otherwise the
//! manager keeps a [`TtlCache`] keyed by dialect.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// `get`/`add` store for rendered RSpecs.
pub trait ResourceCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn add(&self, key: &str, value: String);
}

/// Cache whose entries expire a fixed time after insertion.
#[derive(Debug)]
pub struct TtlCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, String)>>,
}

impl TtlCache {
    pub fn new(ttl: Duration) -> Self {
        TtlCache {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl ResourceCache for TtlCache {
    fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some((at, value)) if at.elapsed() < self.ttl => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn add(&self, key: &str, value: String) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), (Instant::now(), value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_expire() {
        let cache = TtlCache::new(Duration::from_secs(60));
        assert_eq!(cache.get("GENI 3"), None);
        cache.add("GENI 3", "<rspec/>".into());
        assert_eq!(cache.get("GENI 3").as_deref(), Some("<rspec/>"));

        let expired = TtlCache::new(Duration::ZERO);
        expired.add("GENI 3", "<rspec/>".into());
        assert_eq!(expired.get("GENI 3"), None);
    }
}
