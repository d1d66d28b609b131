use thiserror::Error;

/// An error reported by a [`KeyValueStore`](crate::KeyValueStore) implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The key is longer than the store accepts.
    #[error("Key '{key}' is {len} bytes long, the store accepts at most {max}")]
    KeyTooLong {
        #[allow(missing_docs)]
        key: String,
        #[allow(missing_docs)]
        len: usize,
        #[allow(missing_docs)]
        max: usize,
    },

    /// The store already holds the maximum number of keys.
    #[error("The store already holds the maximum of {0} keys")]
    TooManyKeys(usize),

    /// Writing the value would exceed the total size quota.
    #[error("Writing '{0}' would exceed the storage quota")]
    QuotaExceeded(String),

    /// The store cannot be reached, for example because no account is signed in.
    #[error("The store is unavailable: {0}")]
    Unavailable(String),
}
