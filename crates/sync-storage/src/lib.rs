#![doc = include_str!("../README.md")]

pub mod adapter;
mod binding;
mod key;
mod storage;
mod sync_value;
mod watcher;

pub use adapter::{RawRepr, RawValue, StoreValue};
pub use binding::Binding;
pub use key::Key;
pub use storage::{SyncStorage, SyncStorageConfig};
pub use sync_value::SyncValue;
pub use watcher::{ChangeCallback, ChangeWatcher, StartError, SubscriptionId};
