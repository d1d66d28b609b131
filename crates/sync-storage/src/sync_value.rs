use std::sync::Arc;

use tokio::sync::watch;

use crate::{
    adapter::{read_optional_raw, read_raw, refresh_optional_raw, write_optional_raw, write_raw},
    Binding, ChangeWatcher, RawValue, StoreValue, SubscriptionId,
};

type Setter<T> = Box<dyn Fn(&str, &T) + Send + Sync>;

struct Shared<T> {
    key: String,
    value: watch::Sender<T>,
    setter: Setter<T>,
}

impl<T: Clone> Shared<T> {
    fn set(&self, value: T) {
        self.value.send_replace(value.clone());
        (self.setter)(&self.key, &value);
    }
}

/// A value bound to a key in the key-value store, cached locally and kept up to date with
/// external changes.
///
/// The initial value is read from the store, falling back to the supplied default when the key
/// holds no usable value. [`SyncValue::set`] updates the cache immediately and writes through to
/// the store. When the watcher reports an external change for the key the value is read again,
/// and the cache is overwritten if the store holds a usable value. For optional kinds a missing
/// key is a usable value: a remote removal clears the cache to `None`.
///
/// Dropping a `SyncValue` removes its registration from the watcher.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
///
/// use sync_storage::{ChangeWatcher, SyncValue};
/// use sync_storage_kvs::{ExternalChange, KeyValueStore, MemoryStore, StoredValue};
///
/// let store = Arc::new(MemoryStore::new());
/// let watcher = ChangeWatcher::new(store.clone());
///
/// let volume = SyncValue::with_store(&watcher, "volume", 0.5);
/// assert_eq!(volume.get(), 0.5);
///
/// volume.set(0.8);
/// assert_eq!(store.double("volume"), 0.8);
///
/// store.set("volume", Some(StoredValue::Double(0.2))).expect("write within limits");
/// watcher.dispatch(&ExternalChange::server(["volume"]));
/// assert_eq!(volume.get(), 0.2);
/// ```
pub struct SyncValue<T> {
    shared: Arc<Shared<T>>,
    watcher: Arc<ChangeWatcher>,
    subscription: SubscriptionId,
}

impl<T: std::fmt::Debug> std::fmt::Debug for SyncValue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncValue")
            .field("key", &self.shared.key)
            .field("value", &*self.shared.value.borrow())
            .finish()
    }
}

impl<T> SyncValue<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a value from an explicit getter and setter pair.
    ///
    /// `getter` returns `None` when the store holds no usable value for the key.
    pub fn new<G, S>(
        watcher: &Arc<ChangeWatcher>,
        key: impl Into<String>,
        default: T,
        getter: G,
        setter: S,
    ) -> Self
    where
        G: Fn(&str) -> Option<T> + Send + Sync + 'static,
        S: Fn(&str, &T) + Send + Sync + 'static,
    {
        let key = key.into();
        let initial = getter(&key).unwrap_or(default);
        Self::from_parts(watcher, key, initial, getter, setter)
    }

    /// `refresh` re-reads the key after an external change. `None` keeps the cached value.
    fn from_parts<G, S>(
        watcher: &Arc<ChangeWatcher>,
        key: String,
        initial: T,
        refresh: G,
        setter: S,
    ) -> Self
    where
        G: Fn(&str) -> Option<T> + Send + Sync + 'static,
        S: Fn(&str, &T) + Send + Sync + 'static,
    {
        let shared = Arc::new(Shared {
            key: key.clone(),
            value: watch::Sender::new(initial),
            setter: Box::new(setter),
        });

        let weak = Arc::downgrade(&shared);
        let subscription = watcher.subscribe(key, move || {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            // An absent value keeps the last known one.
            if let Some(stored) = refresh(&shared.key) {
                shared.value.send_replace(stored);
            }
        });

        Self {
            shared,
            watcher: watcher.clone(),
            subscription,
        }
    }

    /// The storage key.
    pub fn key(&self) -> &str {
        &self.shared.key
    }

    /// The cached value.
    pub fn get(&self) -> T {
        self.shared.value.borrow().clone()
    }

    /// Replace the cached value and write it to the store.
    pub fn set(&self, value: T) {
        self.shared.set(value);
    }

    /// Observe the cached value. The receiver sees local writes and external changes.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.shared.value.subscribe()
    }

    /// A two-way binding to this value.
    ///
    /// The binding keeps reading and writing the cache after the `SyncValue` is dropped, but no
    /// longer receives external changes.
    pub fn binding(&self) -> Binding<T> {
        let read = self.shared.clone();
        let write = self.shared.clone();
        Binding::new(
            move || read.value.borrow().clone(),
            move |value| write.set(value),
        )
    }
}

impl<T> SyncValue<T>
where
    T: StoreValue + Clone + Send + Sync + 'static,
{
    /// Create a value for one of the kinds the store supports directly.
    pub fn with_store(watcher: &Arc<ChangeWatcher>, key: impl Into<String>, default: T) -> Self {
        let key = key.into();
        let reader = watcher.store().clone();
        let writer = watcher.store().clone();
        let initial = T::read(reader.as_ref(), &key).unwrap_or(default);
        Self::from_parts(
            watcher,
            key,
            initial,
            move |key| T::refresh(reader.as_ref(), key),
            move |key, value: &T| value.write(writer.as_ref(), key),
        )
    }
}

impl<T> SyncValue<T>
where
    T: RawValue + Clone + Send + Sync + 'static,
{
    /// Create a value for an enumeration stored as its raw value.
    ///
    /// A stored raw value that matches no case is treated as absent.
    pub fn raw(watcher: &Arc<ChangeWatcher>, key: impl Into<String>, default: T) -> Self {
        let reader = watcher.store().clone();
        let writer = watcher.store().clone();
        Self::new(
            watcher,
            key,
            default,
            move |key| read_raw(reader.as_ref(), key),
            move |key, value: &T| write_raw(writer.as_ref(), key, value),
        )
    }
}

impl<R> SyncValue<Option<R>>
where
    R: RawValue + Clone + Send + Sync + 'static,
{
    /// Create a value for an optional enumeration stored as its raw value.
    ///
    /// A missing key hydrates to `default`. After an external change a missing key or an
    /// unmatched raw value clears the value.
    pub fn optional_raw(
        watcher: &Arc<ChangeWatcher>,
        key: impl Into<String>,
        default: Option<R>,
    ) -> Self {
        let key = key.into();
        let reader = watcher.store().clone();
        let writer = watcher.store().clone();
        let initial = read_optional_raw(reader.as_ref(), &key).unwrap_or(default);
        Self::from_parts(
            watcher,
            key,
            initial,
            move |key| refresh_optional_raw(reader.as_ref(), key),
            move |key, value: &Option<R>| write_optional_raw(writer.as_ref(), key, value),
        )
    }
}

impl<T> Drop for SyncValue<T> {
    fn drop(&mut self) {
        self.watcher
            .unsubscribe_if(&self.shared.key, self.subscription);
    }
}
