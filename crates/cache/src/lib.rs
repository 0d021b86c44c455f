//! Content-addressed reference cache.
//!
//! Resolving a resource to its final URL may be expensive (an upload, a
//! network round trip), so every resolution is remembered by the hash of the
//! exact bytes that were resolved, never by path. Two files with identical
//! content share one entry, and a renamed file keeps its URL.
//!
//! # Architecture
//! - **[`CacheStore`]**: one namespace, `content hash -> value`, first writer
//!   wins. [`MemoryStore`] lives for the process; [`SqliteStore`] persists in
//!   a [`Database`] shared by all namespaces.
//! - **[`Namespaces`]**: lazily creates one store per group key (see
//!   [`group_key`]), so unrelated products never collide.
//! - **[`CacheHandle`]**: a store scoped to a single hash, or a no-op when
//!   caching is disabled. This is what resolution adapters see.

mod db;
pub mod error;
mod handle;
mod namespace;
mod store;

pub use crate::db::Database;
pub use crate::handle::CacheHandle;
pub use crate::namespace::{Namespaces, group_key};
pub use crate::store::{CacheStore, Entry, MemoryStore, SqliteStore, StoreHandle};
