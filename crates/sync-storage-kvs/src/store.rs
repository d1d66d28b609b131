use tokio::sync::broadcast;

use crate::{ExternalChange, StoreError, StoredValue};

/// This trait defines the interface of the underlying key-value store. It is up to the platform
/// to implement it, including any replication to other devices and the delivery of external
/// change notifications.
///
/// Reads and writes operate on the store's in-memory representation and must not block.
/// Persistence and cloud propagation happen asynchronously inside the store.
pub trait KeyValueStore: Send + Sync {
    /// Returns `true` if the store holds an entry for `key`.
    fn contains_key(&self, key: &str) -> bool;

    /// Returns the raw entry for `key`, if any.
    fn get(&self, key: &str) -> Option<StoredValue>;

    /// Store `value` under `key`. Storing `None` removes the entry.
    fn set(&self, key: &str, value: Option<StoredValue>) -> Result<(), StoreError>;

    /// Remove the entry for `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.set(key, None)
    }

    /// Ask the store to reconcile with the cloud. Completion is signalled, if at all, through
    /// external change notifications.
    fn synchronize(&self) -> Result<(), StoreError>;

    /// Subscribe to external change notifications.
    ///
    /// The implementation needs to guarantee that:
    ///     - Multiple concurrent receivers may be created.
    ///     - Writes made through [`KeyValueStore::set`] are never reported.
    fn subscribe(&self) -> broadcast::Receiver<ExternalChange>;

    /// Boolean value for `key`. Missing entries read as `false` and numbers are truthy when
    /// non-zero.
    fn bool(&self, key: &str) -> bool {
        match self.get(key) {
            Some(StoredValue::Bool(b)) => b,
            Some(StoredValue::Integer(i)) => i != 0,
            Some(StoredValue::Double(d)) => d != 0.0,
            _ => false,
        }
    }

    /// Integer value for `key`. Missing entries read as `0`, doubles are truncated.
    fn long_long(&self, key: &str) -> i64 {
        match self.get(key) {
            Some(StoredValue::Integer(i)) => i,
            Some(StoredValue::Double(d)) => d as i64,
            Some(StoredValue::Bool(b)) => i64::from(b),
            Some(StoredValue::String(s)) => s.trim().parse().unwrap_or_default(),
            _ => 0,
        }
    }

    /// Floating point value for `key`. Missing entries read as `0.0`.
    fn double(&self, key: &str) -> f64 {
        match self.get(key) {
            Some(StoredValue::Double(d)) => d,
            Some(StoredValue::Integer(i)) => i as f64,
            Some(StoredValue::Bool(b)) => f64::from(u8::from(b)),
            Some(StoredValue::String(s)) => s.trim().parse().unwrap_or_default(),
            _ => 0.0,
        }
    }

    /// Text value for `key`, or `None` if the entry is missing or not text.
    fn string(&self, key: &str) -> Option<String> {
        match self.get(key) {
            Some(StoredValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Binary value for `key`, or `None` if the entry is missing or not a blob.
    fn data(&self, key: &str) -> Option<Vec<u8>> {
        match self.get(key) {
            Some(StoredValue::Data(d)) => Some(d),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    fn store_with(key: &str, value: StoredValue) -> MemoryStore {
        let store = MemoryStore::default();
        store.set(key, Some(value)).expect("write within limits");
        store
    }

    #[test]
    fn typed_getters_return_zero_values_for_missing_keys() {
        let store = MemoryStore::default();

        assert!(!store.contains_key("missing"));
        assert!(!store.bool("missing"));
        assert_eq!(store.long_long("missing"), 0);
        assert_eq!(store.double("missing"), 0.0);
        assert_eq!(store.string("missing"), None);
        assert_eq!(store.data("missing"), None);
    }

    #[test]
    fn numeric_getters_convert_between_kinds() {
        let store = store_with("n", StoredValue::Double(3.9));
        assert_eq!(store.long_long("n"), 3);
        assert!(store.bool("n"));

        let store = store_with("n", StoredValue::Integer(2));
        assert_eq!(store.double("n"), 2.0);

        let store = store_with("n", StoredValue::Bool(true));
        assert_eq!(store.long_long("n"), 1);
        assert_eq!(store.double("n"), 1.0);
    }

    #[test]
    fn text_and_blob_getters_reject_other_kinds() {
        let store = store_with("k", StoredValue::Integer(5));
        assert_eq!(store.string("k"), None);
        assert_eq!(store.data("k"), None);

        let store = store_with("k", StoredValue::from("5"));
        assert_eq!(store.string("k").as_deref(), Some("5"));
        assert_eq!(store.long_long("k"), 5);
        assert_eq!(store.data("k"), None);
    }

    #[test]
    fn remove_deletes_the_entry() {
        let store = store_with("k", StoredValue::Bool(false));
        assert!(store.contains_key("k"));

        store.remove("k").expect("remove");
        assert!(!store.contains_key("k"));
    }
}
