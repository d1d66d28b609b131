use serde::{Deserialize, Serialize};

/// Why the store reported an external change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeReason {
    /// Another device or process wrote a newer value.
    ServerChange,
    /// The first download from the cloud replaced local values.
    InitialSyncChange,
    /// A local write was rejected because the store ran out of space.
    QuotaViolationChange,
    /// The signed-in account changed and every value was replaced.
    AccountChange,
}

/// A notification that one or more keys were modified outside of the current write path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalChange {
    /// Reason attached to the notification by the store.
    pub reason: ChangeReason,
    /// Keys whose values changed. May be empty.
    pub changed_keys: Vec<String>,
}

impl ExternalChange {
    /// Create a server-originated change for the given keys.
    pub fn server<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            reason: ChangeReason::ServerChange,
            changed_keys: keys.into_iter().map(Into::into).collect(),
        }
    }
}
