#![doc = include_str!("../README.md")]

mod change;
/// Constants shared by store implementations.
pub mod constants;
mod error;
mod memory;
mod store;
mod value;

pub use change::{ChangeReason, ExternalChange};
pub use error::StoreError;
pub use memory::{MemoryStore, StoreLimits};
pub use store::KeyValueStore;
pub use value::StoredValue;
