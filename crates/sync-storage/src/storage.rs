use std::sync::Arc;

use serde::Deserialize;
use sync_storage_kvs::KeyValueStore;

use crate::{ChangeWatcher, Key, RawValue, StartError, StoreValue, SyncValue};

/// Configuration for [`SyncStorage::with_config`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncStorageConfig {
    /// Start delivering external changes right away. Requires a tokio runtime.
    pub start_watcher: bool,
}

/// Entry point tying a [`KeyValueStore`] to the [`ChangeWatcher`] shared by every value created
/// from it.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
///
/// use sync_storage::{Key, SyncStorage};
/// use sync_storage_kvs::MemoryStore;
///
/// const LAUNCH_COUNT: Key<i64> = Key::new("launch_count");
///
/// let storage = SyncStorage::new(Arc::new(MemoryStore::new()));
/// let launches = storage.value(LAUNCH_COUNT, 0);
/// launches.set(launches.get() + 1);
///
/// assert_eq!(storage.value(LAUNCH_COUNT, 0).get(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct SyncStorage {
    watcher: Arc<ChangeWatcher>,
}

impl SyncStorage {
    /// Create a storage for `store`. Call [`SyncStorage::start`] to receive external changes.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            watcher: ChangeWatcher::new(store),
        }
    }

    /// Create a storage for `store` using `config`.
    pub fn with_config(
        store: Arc<dyn KeyValueStore>,
        config: SyncStorageConfig,
    ) -> Result<Self, StartError> {
        let storage = Self::new(store);
        if config.start_watcher {
            storage.start()?;
        }
        Ok(storage)
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        self.watcher.store()
    }

    /// The watcher shared by values created from this storage.
    pub fn watcher(&self) -> &Arc<ChangeWatcher> {
        &self.watcher
    }

    /// Start delivering external changes on the current tokio runtime.
    pub fn start(&self) -> Result<(), StartError> {
        self.watcher.start()
    }

    /// Stop delivering external changes.
    pub fn stop(&self) {
        self.watcher.stop()
    }

    /// A synchronized value for a directly supported kind.
    pub fn value<T>(&self, key: Key<T>, default: T) -> SyncValue<T>
    where
        T: StoreValue + Clone + Send + Sync + 'static,
    {
        SyncValue::with_store(&self.watcher, key.name(), default)
    }

    /// A synchronized enumeration stored as its raw value.
    pub fn raw_value<T>(&self, key: Key<T>, default: T) -> SyncValue<T>
    where
        T: RawValue + Clone + Send + Sync + 'static,
    {
        SyncValue::raw(&self.watcher, key.name(), default)
    }

    /// A synchronized optional enumeration stored as its raw value.
    pub fn optional_raw_value<R>(
        &self,
        key: Key<Option<R>>,
        default: Option<R>,
    ) -> SyncValue<Option<R>>
    where
        R: RawValue + Clone + Send + Sync + 'static,
    {
        SyncValue::optional_raw(&self.watcher, key.name(), default)
    }
}

#[cfg(test)]
mod tests {
    use sync_storage_kvs::{MemoryStore, StoredValue};

    use super::*;

    #[test]
    fn config_defaults_to_not_starting() {
        let config: SyncStorageConfig = serde_json::from_str("{}").expect("valid config");
        assert_eq!(config, SyncStorageConfig::default());
        assert!(!config.start_watcher);

        let storage = SyncStorage::with_config(Arc::new(MemoryStore::new()), config)
            .expect("nothing to start");
        assert!(!storage.watcher().is_running());
    }

    #[test]
    fn starting_without_a_runtime_fails() {
        let config: SyncStorageConfig =
            serde_json::from_str(r#"{ "start_watcher": true }"#).expect("valid config");

        let result = SyncStorage::with_config(Arc::new(MemoryStore::new()), config);

        assert_eq!(result.err(), Some(StartError::NoRuntime));
    }

    #[tokio::test]
    async fn starts_the_watcher_when_configured() {
        let storage = SyncStorage::with_config(
            Arc::new(MemoryStore::new()),
            SyncStorageConfig {
                start_watcher: true,
            },
        )
        .expect("runtime is available");

        assert!(storage.watcher().is_running());
        storage.stop();
        assert!(!storage.watcher().is_running());
    }

    #[test]
    fn values_share_the_store() {
        const VOLUME: Key<f64> = Key::new("volume");

        let storage = SyncStorage::new(Arc::new(MemoryStore::new()));
        let volume = storage.value(VOLUME, 0.5);
        volume.set(0.9);

        assert_eq!(storage.store().get("volume"), Some(StoredValue::Double(0.9)));
        assert!(storage.watcher().has_subscriber("volume"));
    }
}
