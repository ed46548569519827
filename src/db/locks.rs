use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::models::{EventId, UserId};

/// Every read-modify-write of an event runs alone.
pub type EventLocks = KeyedLocks<EventId>;
/// Every change to a student's balance and history runs alone.
///
/// Always taken after the event lock, never before.
pub type StudentLocks = KeyedLocks<UserId>;

/// One lock per key, so work on one record is serialized while different
/// records proceed in parallel.
#[derive(Debug)]
pub struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Copy> KeyedLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key` until the guard is dropped.
    pub async fn lock(&self, key: K) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // entries only the map still holds belong to nobody
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(key).or_default().clone()
        };

        lock.lock_owned().await
    }

    /// How many keys currently have a holder or waiter.
    #[cfg(test)]
    async fn active(&self) -> usize {
        self.locks
            .lock()
            .await
            .values()
            .filter(|lock| Arc::strong_count(lock) > 1)
            .count()
    }
}
