use serde::{Deserialize, Serialize};

/// A value as held by the underlying key-value store.
///
/// Cloud key-value stores only accept a handful of property-list style types. Anything richer is
/// mapped onto one of these variants by the adapter layer in `sync-storage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StoredValue {
    #[allow(missing_docs)]
    Bool(bool),
    /// A 64-bit signed integer. Narrower integer kinds are widened before storing.
    Integer(i64),
    #[allow(missing_docs)]
    Double(f64),
    #[allow(missing_docs)]
    String(String),
    /// An opaque binary blob.
    Data(Vec<u8>),
}

impl StoredValue {
    /// Approximate number of bytes this value occupies in the store, used for quota accounting.
    pub fn size(&self) -> usize {
        match self {
            StoredValue::Bool(_) => 1,
            StoredValue::Integer(_) | StoredValue::Double(_) => 8,
            StoredValue::String(s) => s.len(),
            StoredValue::Data(d) => d.len(),
        }
    }
}

impl From<bool> for StoredValue {
    fn from(value: bool) -> Self {
        StoredValue::Bool(value)
    }
}

impl From<i64> for StoredValue {
    fn from(value: i64) -> Self {
        StoredValue::Integer(value)
    }
}

impl From<f64> for StoredValue {
    fn from(value: f64) -> Self {
        StoredValue::Double(value)
    }
}

impl From<String> for StoredValue {
    fn from(value: String) -> Self {
        StoredValue::String(value)
    }
}

impl From<&str> for StoredValue {
    fn from(value: &str) -> Self {
        StoredValue::String(value.to_owned())
    }
}

impl From<Vec<u8>> for StoredValue {
    fn from(value: Vec<u8>) -> Self {
        StoredValue::Data(value)
    }
}
