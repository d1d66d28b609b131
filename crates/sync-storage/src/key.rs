//! Named store keys tagged with the kind of value they hold.

use std::marker::PhantomData;

/// A store key name tagged with the Rust type of its value.
///
/// Declaring keys as constants keeps every [`SyncValue`](crate::SyncValue) for one key on the
/// same kind, so a key written as `bool` is never read back as text.
///
/// # Example
/// ```rust
/// use sync_storage::Key;
///
/// const DARK_MODE: Key<bool> = Key::new("dark_mode");
///
/// assert_eq!(DARK_MODE.name(), "dark_mode");
/// ```
pub struct Key<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Key<T> {
    /// Declare a key stored under `name`.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// The name the store files this key under.
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Key<T> {}

impl<T> std::fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Key").field(&self.name).finish()
    }
}
