use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

type PairKey = (String, String);

/// Per-(bid, phone) async mutexes serializing `decide()` inside one process.
///
/// Entries nobody holds are pruned on the next acquisition.
#[derive(Debug, Default)]
pub struct PairLocks {
    inner: Mutex<HashMap<PairKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl PairLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, bid_id: &str, phone_key: &str) -> OwnedMutexGuard<()> {
        let m = {
            let mut map = self.inner.lock().unwrap_or_else(|p| p.into_inner());
            map.retain(|_, m| Arc::strong_count(m) > 1);
            map.entry((bid_id.to_string(), phone_key.to_string()))
                .or_default()
                .clone()
        };
        m.lock_owned().await
    }

    /// Pairs with a live holder or waiter.
    pub fn active(&self) -> usize {
        let map = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        map.values().filter(|m| Arc::strong_count(m) > 1).count()
    }
}
