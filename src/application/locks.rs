use crate::error::{LoanError, Result};
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One exclusive async lock per key, acquired with a timeout.
///
/// Holding the returned guard makes the caller the single writer for that
/// key. Failing to get it within the timeout is reported as
/// [`LoanError::Contention`] so the caller can retry.
pub struct KeyedLocks<K> {
    label: &'static str,
    slots: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
    timeout: Duration,
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Copy + Display,
{
    pub fn new(label: &'static str, timeout: Duration) -> Self {
        Self {
            label,
            slots: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    pub async fn acquire(&self, key: K) -> Result<OwnedMutexGuard<()>> {
        let slot = {
            let mut slots = self
                .slots
                .lock()
                .map_err(|_| LoanError::internal("lock table poisoned"))?;
            // Slots nobody holds or waits on can go.
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            slots.entry(key).or_default().clone()
        };
        tokio::time::timeout(self.timeout, slot.lock_owned())
            .await
            .map_err(|_| LoanError::Contention(format!("{} {}", self.label, key)))
    }
}
