use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, RwLock, Weak,
    },
};

use sync_storage_kvs::{ExternalChange, KeyValueStore};
use thiserror::Error;
use tokio::{
    select,
    sync::{broadcast, broadcast::error::RecvError, watch},
};

/// Callback invoked when the value for a key was changed externally.
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// Identifies one registration in the subscription table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    callback: ChangeCallback,
}

#[allow(missing_docs)]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StartError {
    #[error("No tokio runtime is available to deliver change notifications")]
    NoRuntime,

    #[error("The change watcher is already running")]
    AlreadyRunning,
}

/// Dispatches external change notifications from a [`KeyValueStore`] to per-key callbacks.
///
/// At most one callback is registered per key, registering another one replaces it. The watcher
/// registers with the store's notification stream once, when it is created, and asks the store
/// to synchronize at the same time. That registration is kept across [`ChangeWatcher::stop`] and
/// a later [`ChangeWatcher::start`], changes arriving in between are buffered by the store's
/// channel and delivered once the watcher runs again.
///
/// Notifications are delivered by a single task spawned with [`ChangeWatcher::start`], which is
/// the one execution context callbacks run on. [`ChangeWatcher::dispatch`] can be used to
/// deliver a notification directly instead.
pub struct ChangeWatcher {
    store: Arc<dyn KeyValueStore>,
    subscribers: RwLock<HashMap<String, Subscription>>,
    next_id: AtomicU64,

    changes: Arc<tokio::sync::Mutex<broadcast::Receiver<ExternalChange>>>,
    cancellation_handle: Mutex<Option<watch::Sender<bool>>>,
}

impl std::fmt::Debug for ChangeWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeWatcher")
            .field("subscribers", &self.subscriber_count())
            .field("running", &self.is_running())
            .finish()
    }
}

impl ChangeWatcher {
    /// Create a watcher for `store`.
    ///
    /// Subscribes to the store's external changes and requests a synchronization. A failed
    /// synchronization is logged and otherwise ignored.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Arc<Self> {
        // Subscribe before synchronizing so changes caused by the pull are not missed.
        let changes = store.subscribe();
        if let Err(e) = store.synchronize() {
            log::warn!("Initial key-value store synchronization failed: {}", e);
        }

        Arc::new(Self {
            store,
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            changes: Arc::new(tokio::sync::Mutex::new(changes)),
            cancellation_handle: Mutex::new(None),
        })
    }

    /// The store this watcher observes.
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Register `callback` for `key`, replacing any callback already registered for it.
    pub fn subscribe<F>(&self, key: impl Into<String>, callback: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let key = key.into();
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let replaced = self
            .subscribers
            .write()
            .expect("RwLock should not be poisoned")
            .insert(
                key.clone(),
                Subscription {
                    id,
                    callback: Arc::new(callback),
                },
            );
        if replaced.is_some() {
            log::debug!("Replaced existing subscriber for '{}'", key);
        }
        id
    }

    /// Remove the callback registered for `key`. Returns `true` if there was one.
    pub fn unsubscribe(&self, key: &str) -> bool {
        self.subscribers
            .write()
            .expect("RwLock should not be poisoned")
            .remove(key)
            .is_some()
    }

    /// Remove the callback for `key` only if it is still the registration identified by `id`.
    pub fn unsubscribe_if(&self, key: &str, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .subscribers
            .write()
            .expect("RwLock should not be poisoned");
        match subscribers.get(key) {
            Some(subscription) if subscription.id == id => {
                subscribers.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Returns `true` if a callback is registered for `key`.
    pub fn has_subscriber(&self, key: &str) -> bool {
        self.subscribers
            .read()
            .expect("RwLock should not be poisoned")
            .contains_key(key)
    }

    /// Number of registered callbacks.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .expect("RwLock should not be poisoned")
            .len()
    }

    /// Invoke the callback of every changed key that has one. Keys without a callback are
    /// ignored.
    pub fn dispatch(&self, change: &ExternalChange) {
        log::debug!(
            "External change ({:?}) for {} key(s)",
            change.reason,
            change.changed_keys.len()
        );

        // Collect first, callbacks may subscribe or unsubscribe.
        let callbacks: Vec<ChangeCallback> = {
            let subscribers = self
                .subscribers
                .read()
                .expect("RwLock should not be poisoned");
            change
                .changed_keys
                .iter()
                .filter_map(|key| subscribers.get(key))
                .map(|subscription| subscription.callback.clone())
                .collect()
        };

        for callback in callbacks {
            callback();
        }
    }

    /// Start delivering notifications on a task spawned on the current tokio runtime.
    pub fn start(self: &Arc<Self>) -> Result<(), StartError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| StartError::NoRuntime)?;

        let mut cancellation_handle = self
            .cancellation_handle
            .lock()
            .expect("Mutex should not be poisoned");
        if cancellation_handle.is_some() {
            return Err(StartError::AlreadyRunning);
        }

        let changes = self.changes.clone();

        let (cancellation_tx, mut cancellation_rx) = watch::channel(false);
        *cancellation_handle = Some(cancellation_tx);
        drop(cancellation_handle);

        let watcher = Arc::downgrade(self);
        runtime.spawn(async move {
            // A previous run releases the receiver once it has seen its cancellation.
            let mut changes = changes.lock_owned().await;
            loop {
                select! {
                    changed = cancellation_rx.changed() => {
                        if changed.is_err() || *cancellation_rx.borrow() {
                            log::debug!("Cancellation signal received, stopping change watcher");
                            break;
                        }
                    }
                    received = changes.recv() => {
                        match received {
                            Ok(change) => {
                                let Some(watcher) = watcher.upgrade() else {
                                    break;
                                };
                                watcher.dispatch(&change);
                            }
                            Err(RecvError::Lagged(skipped)) => {
                                log::warn!("Change watcher lagged behind, {} notification(s) were dropped", skipped);
                            }
                            Err(RecvError::Closed) => {
                                log::debug!("Key-value store closed its change stream");
                                break;
                            }
                        }
                    }
                }
            }
            log::debug!("Change watcher shutting down");
            drop(cancellation_rx);
            if let Some(watcher) = Weak::upgrade(&watcher) {
                watcher.finish_run();
            }
        });

        Ok(())
    }

    /// Stop delivering notifications. Registered callbacks are kept.
    pub fn stop(&self) {
        if let Some(cancellation_tx) = self
            .cancellation_handle
            .lock()
            .expect("Mutex should not be poisoned")
            .take()
        {
            let _ = cancellation_tx.send(true);
        }
    }

    /// Returns `true` while the delivery task is running.
    pub fn is_running(&self) -> bool {
        self.cancellation_handle
            .lock()
            .expect("Mutex should not be poisoned")
            .as_ref()
            .is_some_and(|handle| !handle.is_closed() && !*handle.borrow())
    }

    fn finish_run(&self) {
        let mut cancellation_handle = self
            .cancellation_handle
            .lock()
            .expect("Mutex should not be poisoned");
        // A newer run may already have replaced the handle after a stop.
        if cancellation_handle
            .as_ref()
            .is_some_and(|handle| handle.is_closed())
        {
            *cancellation_handle = None;
        }
    }
}
