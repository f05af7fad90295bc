//! Keyed async mutex registry.
//!
//! Serialises writers per document key: balance mutations take the owner's
//! uid lock, swap transitions take the swap-id lock. Multi-party operations
//! (settlement) take one lock at a time and never nest uid locks, which
//! rules out deadlock between concurrent settlements.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct LockMap {
    inner: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LockMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, key: &str) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Acquire the lock for `key`, waiting if another task holds it.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        self.entry(key).lock_owned().await
    }
}
