//! Reference cache stores.
//!
//! A store is one cache namespace: a map from content hash to a previously
//! resolved value. Stores never evict and never overwrite; the first value
//! written for a hash stays authoritative for the lifetime of the store.

mod memory;
mod sqlite;

pub use self::memory::MemoryStore;
pub use self::sqlite::{Entry, SqliteStore};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Shared handle to a cache namespace.
pub type StoreHandle = Arc<dyn CacheStore + Send + Sync>;

/// Key-value store addressed purely by content hash.
///
/// Implementations must tolerate concurrent first-access races: when two
/// writers race on the same hash, exactly one value wins and subsequent
/// reads observe it.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Namespace this store serves (e.g. `default/cdn`). Used for logging.
    fn name(&self) -> &str;

    /// Previously stored value for `hash`, if any.
    async fn get(&self, hash: &str) -> Result<Option<String>>;

    /// Store `value` for `hash` unless a value is already present.
    ///
    /// Returns `true` if this call's value was stored.
    async fn set(&self, hash: &str, value: &str) -> Result<bool>;
}
