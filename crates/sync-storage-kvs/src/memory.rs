use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        RwLock,
    },
};

use serde::Deserialize;
use tokio::sync::broadcast;

use crate::{
    constants::CHANGE_CHANNEL_CAPACITY, ChangeReason, ExternalChange, KeyValueStore, StoreError,
    StoredValue,
};

/// Size limits enforced on local writes.
///
/// The defaults follow the limits of common platform cloud key-value stores: 1024 keys, keys of
/// at most 64 bytes and 1 MiB of total storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreLimits {
    /// Maximum number of keys.
    pub max_keys: usize,
    /// Maximum key length in bytes.
    pub max_key_bytes: usize,
    /// Maximum combined size of all keys and values in bytes.
    pub max_total_bytes: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_keys: 1024,
            max_key_bytes: 64,
            max_total_bytes: 1024 * 1024,
        }
    }
}

/// An in-process [`KeyValueStore`].
///
/// Local writes go straight into the map and are never reported as external changes. Writes
/// from "other devices" are simulated with [`MemoryStore::apply_external`], which updates the
/// map and broadcasts a single [`ExternalChange`] naming every touched key.
pub struct MemoryStore {
    entries: RwLock<HashMap<String, StoredValue>>,
    limits: StoreLimits,
    changes: broadcast::Sender<ExternalChange>,
    synchronize_count: AtomicUsize,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("limits", &self.limits)
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_limits(StoreLimits::default())
    }
}

impl MemoryStore {
    /// Create an empty store with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store enforcing `limits` on local writes.
    pub fn with_limits(limits: StoreLimits) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            entries: RwLock::new(HashMap::new()),
            limits,
            changes,
            synchronize_count: AtomicUsize::new(0),
        }
    }

    /// The limits enforced by this store.
    pub fn limits(&self) -> StoreLimits {
        self.limits
    }

    /// Apply writes made by another device and notify subscribers.
    ///
    /// Limits are not enforced here, the remote side already accepted these values. A `None`
    /// value removes the entry.
    pub fn apply_external<I, K>(&self, reason: ChangeReason, entries: I)
    where
        I: IntoIterator<Item = (K, Option<StoredValue>)>,
        K: Into<String>,
    {
        let mut changed_keys = Vec::new();
        {
            let mut map = self.entries.write().expect("RwLock should not be poisoned");
            for (key, value) in entries {
                let key = key.into();
                match value {
                    Some(value) => {
                        map.insert(key.clone(), value);
                    }
                    None => {
                        map.remove(&key);
                    }
                }
                changed_keys.push(key);
            }
        }

        log::debug!(
            "Applying external change ({:?}) for {} key(s)",
            reason,
            changed_keys.len()
        );
        self.notify(ExternalChange {
            reason,
            changed_keys,
        });
    }

    /// Number of times [`KeyValueStore::synchronize`] was called.
    pub fn synchronize_count(&self) -> usize {
        self.synchronize_count.load(Ordering::SeqCst)
    }

    /// All keys currently held, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.entries
            .read()
            .expect("RwLock should not be poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .expect("RwLock should not be poisoned")
            .len()
    }

    /// Returns `true` if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn notify(&self, change: ExternalChange) {
        // Sending only fails when nobody is listening.
        let _ = self.changes.send(change);
    }

    fn check_limits(
        &self,
        map: &HashMap<String, StoredValue>,
        key: &str,
        value: &StoredValue,
    ) -> Result<(), StoreError> {
        if key.len() > self.limits.max_key_bytes {
            return Err(StoreError::KeyTooLong {
                key: key.to_owned(),
                len: key.len(),
                max: self.limits.max_key_bytes,
            });
        }

        let existing = map.get(key);
        if existing.is_none() && map.len() >= self.limits.max_keys {
            return Err(StoreError::TooManyKeys(self.limits.max_keys));
        }

        let used: usize = map
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.size())
            .sum();
        if used + key.len() + value.size() > self.limits.max_total_bytes {
            return Err(StoreError::QuotaExceeded(key.to_owned()));
        }

        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    fn contains_key(&self, key: &str) -> bool {
        self.entries
            .read()
            .expect("RwLock should not be poisoned")
            .contains_key(key)
    }

    fn get(&self, key: &str) -> Option<StoredValue> {
        self.entries
            .read()
            .expect("RwLock should not be poisoned")
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: Option<StoredValue>) -> Result<(), StoreError> {
        let mut map = self.entries.write().expect("RwLock should not be poisoned");
        let Some(value) = value else {
            map.remove(key);
            return Ok(());
        };

        let checked = self.check_limits(&map, key, &value);
        if let Err(e) = checked {
            drop(map);
            log::warn!("Rejected write for '{}': {}", key, e);
            self.notify(ExternalChange {
                reason: ChangeReason::QuotaViolationChange,
                changed_keys: vec![key.to_owned()],
            });
            return Err(e);
        }

        map.insert(key.to_owned(), value);
        Ok(())
    }

    fn synchronize(&self) -> Result<(), StoreError> {
        self.synchronize_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ExternalChange> {
        self.changes.subscribe()
    }
}
