//! Typed bindings between Rust values and the underlying key-value store.
//!
//! Reads never fail: a missing key, a value of the wrong kind or a raw value without a matching
//! enumeration case all read as `None`. Writes never report errors to the caller, a store that
//! rejects a write is logged and otherwise ignored.

use std::any::type_name;

use sync_storage_kvs::{KeyValueStore, StoredValue};

/// A value kind that can be read from and written to a [`KeyValueStore`].
pub trait StoreValue: Sized {
    /// Read the value stored under `key`, or `None` if there is no usable entry.
    fn read(store: &dyn KeyValueStore, key: &str) -> Option<Self>;

    /// Read the value again after an external change. `None` keeps the cached value.
    fn refresh(store: &dyn KeyValueStore, key: &str) -> Option<Self> {
        Self::read(store, key)
    }

    /// The store representation of this value. `None` removes the entry.
    fn to_stored(&self) -> Option<StoredValue>;

    /// Write this value under `key`.
    fn write(&self, store: &dyn KeyValueStore, key: &str) {
        write_stored(store, key, self.to_stored());
    }
}

pub(crate) fn write_stored(store: &dyn KeyValueStore, key: &str, value: Option<StoredValue>) {
    if let Err(e) = store.set(key, value) {
        log::warn!("Failed to write '{}' to the key-value store: {}", key, e);
    }
}

impl StoreValue for bool {
    fn read(store: &dyn KeyValueStore, key: &str) -> Option<Self> {
        // Presence first, otherwise a stored `false` is indistinguishable from a missing key.
        store.contains_key(key).then(|| store.bool(key))
    }

    fn to_stored(&self) -> Option<StoredValue> {
        Some(StoredValue::Bool(*self))
    }
}

impl StoreValue for i64 {
    fn read(store: &dyn KeyValueStore, key: &str) -> Option<Self> {
        store.contains_key(key).then(|| store.long_long(key))
    }

    fn to_stored(&self) -> Option<StoredValue> {
        Some(StoredValue::Integer(*self))
    }
}

impl StoreValue for i32 {
    fn read(store: &dyn KeyValueStore, key: &str) -> Option<Self> {
        let wide = i64::read(store, key)?;
        match i32::try_from(wide) {
            Ok(value) => Some(value),
            Err(_) => {
                log::debug!("Stored integer {} for '{}' does not fit in an i32", wide, key);
                None
            }
        }
    }

    fn to_stored(&self) -> Option<StoredValue> {
        Some(StoredValue::Integer(i64::from(*self)))
    }
}

impl StoreValue for f64 {
    fn read(store: &dyn KeyValueStore, key: &str) -> Option<Self> {
        store.contains_key(key).then(|| store.double(key))
    }

    fn to_stored(&self) -> Option<StoredValue> {
        Some(StoredValue::Double(*self))
    }
}

impl StoreValue for String {
    fn read(store: &dyn KeyValueStore, key: &str) -> Option<Self> {
        store.string(key)
    }

    fn to_stored(&self) -> Option<StoredValue> {
        Some(StoredValue::String(self.clone()))
    }
}

impl StoreValue for Vec<u8> {
    fn read(store: &dyn KeyValueStore, key: &str) -> Option<Self> {
        store.data(key)
    }

    fn to_stored(&self) -> Option<StoredValue> {
        Some(StoredValue::Data(self.clone()))
    }
}

/// Optional kinds read as absent when the key is missing, so the caller's default applies. A
/// present entry of the wrong kind reads as `Some(None)`. Writing `None` removes the entry.
///
/// After an external change a missing key refreshes as `Some(None)`, so a removal made on
/// another device clears the value.
impl<T: StoreValue> StoreValue for Option<T> {
    fn read(store: &dyn KeyValueStore, key: &str) -> Option<Self> {
        if !store.contains_key(key) {
            return None;
        }
        Some(T::read(store, key))
    }

    fn refresh(store: &dyn KeyValueStore, key: &str) -> Option<Self> {
        Some(T::read(store, key))
    }

    fn to_stored(&self) -> Option<StoredValue> {
        self.as_ref().and_then(T::to_stored)
    }
}

mod private {
    pub trait Sealed {}

    impl Sealed for i64 {}
    impl Sealed for i32 {}
    impl Sealed for String {}
}

/// Primitive representations an enumeration may be stored as: integers or text.
pub trait RawRepr: StoreValue + PartialEq + private::Sealed {}

impl RawRepr for i64 {}
impl RawRepr for i32 {}
impl RawRepr for String {}

/// An enumeration whose cases are each associated with a primitive raw value used for storage.
///
/// Use the [`raw_value_enum!`](crate::raw_value_enum) macro to declare one.
pub trait RawValue: Sized {
    /// The primitive the cases are stored as.
    type Raw: RawRepr;

    /// The raw value of this case.
    fn raw_value(&self) -> Self::Raw;

    /// The case for `raw`, or `None` if no case has that raw value.
    fn from_raw_value(raw: Self::Raw) -> Option<Self>;
}

/// Read an enumeration value. A raw value without a matching case reads as `None`.
pub fn read_raw<R: RawValue>(store: &dyn KeyValueStore, key: &str) -> Option<R> {
    let raw = R::Raw::read(store, key)?;
    let value = R::from_raw_value(raw);
    if value.is_none() {
        log::debug!(
            "Stored raw value for '{}' matches no case of {}",
            key,
            type_name::<R>()
        );
    }
    value
}

/// Write an enumeration value as its raw value.
pub fn write_raw<R: RawValue>(store: &dyn KeyValueStore, key: &str, value: &R) {
    value.raw_value().write(store, key);
}

/// Read an optional enumeration value.
///
/// A missing key reads as `None`. A present raw value without a matching case reads as
/// `Some(None)`, clearing the value rather than keeping the previous one.
pub fn read_optional_raw<R: RawValue>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Option<Option<R>> {
    if !store.contains_key(key) {
        return None;
    }
    Some(read_raw(store, key))
}

/// Read an optional enumeration value after an external change. A missing key or an unmatched
/// raw value both clear the value.
pub fn refresh_optional_raw<R: RawValue>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Option<Option<R>> {
    Some(read_raw(store, key))
}

/// Write an optional enumeration value. `None` removes the entry.
pub fn write_optional_raw<R: RawValue>(store: &dyn KeyValueStore, key: &str, value: &Option<R>) {
    match value {
        Some(value) => write_raw(store, key, value),
        None => write_stored(store, key, None),
    }
}

/// Declare an enumeration backed by integer or text raw values and implement [`RawValue`] for
/// it.
///
/// The raw type is written as a single identifier: `i64`, `i32` or `String`. Integer raw values
/// are typed as the raw type, so `i64` cases may use the full 64-bit range.
///
/// # Example
/// ```rust
/// use sync_storage::{raw_value_enum, RawValue};
///
/// raw_value_enum! {
///     /// Color scheme of the app.
///     #[derive(Debug, Clone, Copy, PartialEq, Eq)]
///     pub enum Appearance: String {
///         Light = "light",
///         Dark = "dark",
///     }
/// }
///
/// assert_eq!(Appearance::Dark.raw_value(), "dark");
/// assert_eq!(Appearance::from_raw_value("light".to_owned()), Some(Appearance::Light));
/// assert_eq!(Appearance::from_raw_value("sepia".to_owned()), None);
/// ```
#[macro_export]
macro_rules! raw_value_enum {
    (@raw String, $value:expr) => {
        ::std::string::String::from($value)
    };
    (@raw $raw:ident, $value:expr) => {
        $value
    };
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident: $raw:ident {
            $($(#[$variant_meta:meta])* $variant:ident = $value:expr),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis enum $name {
            $($(#[$variant_meta])* $variant),+
        }

        impl $crate::RawValue for $name {
            type Raw = $raw;

            fn raw_value(&self) -> $raw {
                match self {
                    $(Self::$variant => $crate::raw_value_enum!(@raw $raw, $value)),+
                }
            }

            fn from_raw_value(raw: $raw) -> ::std::option::Option<Self> {
                $(
                    if raw == $crate::raw_value_enum!(@raw $raw, $value) {
                        return ::std::option::Option::Some(Self::$variant);
                    }
                )+
                ::std::option::Option::None
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use sync_storage_kvs::{MemoryStore, StoreLimits};

    use super::*;

    raw_value_enum! {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        enum Sort: i64 {
            Name = 0,
            Date = 1,
        }
    }

    raw_value_enum! {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        enum Theme: String {
            Light = "light",
            Dark = "dark",
        }
    }

    fn round_trip<T: StoreValue + PartialEq + std::fmt::Debug>(value: T) {
        let store = MemoryStore::new();
        value.write(&store, "key");
        assert_eq!(T::read(&store, "key"), Some(value));
    }

    #[test]
    fn missing_keys_read_as_absent() {
        let store = MemoryStore::new();

        assert_eq!(bool::read(&store, "k"), None);
        assert_eq!(i64::read(&store, "k"), None);
        assert_eq!(f64::read(&store, "k"), None);
        assert_eq!(String::read(&store, "k"), None);
        assert_eq!(Vec::<u8>::read(&store, "k"), None);
        assert_eq!(Option::<bool>::read(&store, "k"), None);
    }

    #[test]
    fn falsy_values_are_present() {
        let store = MemoryStore::new();
        false.write(&store, "flag");
        0i64.write(&store, "count");

        assert_eq!(bool::read(&store, "flag"), Some(false));
        assert_eq!(i64::read(&store, "count"), Some(0));
    }

    #[test]
    fn every_kind_round_trips() {
        round_trip(true);
        round_trip(-42i64);
        round_trip(7i32);
        round_trip(1.5f64);
        round_trip("hello".to_owned());
        round_trip(vec![1u8, 2, 3]);
        round_trip(Some(false));
        round_trip(Some(12i64));
        round_trip(Some(2.25f64));
        round_trip(Some("text".to_owned()));
        round_trip(Some(vec![9u8]));
    }

    #[test]
    fn writing_none_removes_the_entry() {
        let store = MemoryStore::new();
        Some("value".to_owned()).write(&store, "k");
        assert!(store.contains_key("k"));

        None::<String>.write(&store, "k");

        assert!(!store.contains_key("k"));
        assert_eq!(Option::<String>::read(&store, "k"), None);
    }

    #[test]
    fn optional_of_wrong_kind_reads_as_present_none() {
        let store = MemoryStore::new();
        42i64.write(&store, "k");

        assert_eq!(Option::<String>::read(&store, "k"), Some(None));
    }

    #[test]
    fn narrowing_out_of_range_integer_reads_as_absent() {
        let store = MemoryStore::new();
        (i64::from(i32::MAX) + 1).write(&store, "k");

        assert_eq!(i32::read(&store, "k"), None);
        assert_eq!(i64::read(&store, "k"), Some(i64::from(i32::MAX) + 1));
    }

    #[test]
    fn rejected_writes_are_not_surfaced() {
        let store = MemoryStore::with_limits(StoreLimits {
            max_key_bytes: 2,
            ..StoreLimits::default()
        });

        true.write(&store, "long-key");

        assert_eq!(bool::read(&store, "long-key"), None);
    }

    raw_value_enum! {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        enum Quota: i64 {
            Small = 1,
            Huge = 3_000_000_000,
        }
    }

    #[test]
    fn wide_integer_raw_values_round_trip() {
        let store = MemoryStore::new();
        write_raw(&store, "quota", &Quota::Huge);

        assert_eq!(Quota::Huge.raw_value(), 3_000_000_000);
        assert_eq!(store.long_long("quota"), 3_000_000_000);
        assert_eq!(read_raw::<Quota>(&store, "quota"), Some(Quota::Huge));
        assert_eq!(Quota::from_raw_value(1), Some(Quota::Small));
    }

    #[test]
    fn raw_values_round_trip() {
        let store = MemoryStore::new();
        write_raw(&store, "sort", &Sort::Date);
        write_raw(&store, "theme", &Theme::Dark);

        assert_eq!(store.long_long("sort"), 1);
        assert_eq!(store.string("theme").as_deref(), Some("dark"));
        assert_eq!(read_raw::<Sort>(&store, "sort"), Some(Sort::Date));
        assert_eq!(read_raw::<Theme>(&store, "theme"), Some(Theme::Dark));
    }

    // Policy: a raw value that matches no case reads as absent instead of as an error.
    #[test]
    fn unmatched_raw_value_reads_as_absent() {
        let store = MemoryStore::new();
        "sepia".to_owned().write(&store, "theme");
        5i64.write(&store, "sort");

        assert_eq!(read_raw::<Theme>(&store, "theme"), None);
        assert_eq!(read_raw::<Sort>(&store, "sort"), None);
    }

    #[test]
    fn optional_raw_values() {
        let store = MemoryStore::new();
        assert_eq!(read_optional_raw::<Theme>(&store, "theme"), None);

        write_optional_raw(&store, "theme", &Some(Theme::Light));
        assert_eq!(
            read_optional_raw::<Theme>(&store, "theme"),
            Some(Some(Theme::Light))
        );

        "sepia".to_owned().write(&store, "theme");
        assert_eq!(read_optional_raw::<Theme>(&store, "theme"), Some(None));

        write_optional_raw::<Theme>(&store, "theme", &None);
        assert!(!store.contains_key("theme"));
    }

    #[test]
    fn optional_refresh_clears_on_missing_key() {
        let store = MemoryStore::new();

        assert_eq!(Option::<String>::read(&store, "nick"), None);
        assert_eq!(Option::<String>::refresh(&store, "nick"), Some(None));
        assert_eq!(String::refresh(&store, "nick"), None);
        assert_eq!(refresh_optional_raw::<Theme>(&store, "theme"), Some(None));

        "bob".to_owned().write(&store, "nick");
        assert_eq!(
            Option::<String>::refresh(&store, "nick"),
            Some(Some("bob".to_owned()))
        );
    }
}
