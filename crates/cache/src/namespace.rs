use crate::Database;
use crate::error::Result;
use crate::store::{MemoryStore, SqliteStore, StoreHandle};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Namespace key for a product's reference cache: `<product>/cdn`, with
/// `default` standing in when no product is configured.
pub fn group_key(product: Option<&str>) -> String {
    let product = product.map(str::trim).filter(|p| !p.is_empty()).unwrap_or("default");
    format!("{product}/cdn")
}

#[derive(Debug, Clone)]
enum Backend {
    Memory,
    Sqlite(Database),
}

/// Registry of cache namespaces for one build.
///
/// Each group key gets exactly one store, created lazily on first request
/// and shared by every later caller. Inject one `Namespaces` per build (or
/// share one across builds to reuse resolutions).
pub struct Namespaces {
    backend: Backend,
    stores: Mutex<HashMap<String, StoreHandle>>,
}

impl Namespaces {
    fn with_backend(backend: Backend) -> Self {
        Self {
            backend,
            stores: Mutex::default(),
        }
    }

    /// Namespaces that live only as long as this value.
    pub fn in_memory() -> Self {
        Self::with_backend(Backend::Memory)
    }

    /// Namespaces persisted in an already opened database.
    pub fn sqlite(db: Database) -> Self {
        Self::with_backend(Backend::Sqlite(db))
    }

    /// Persist to the database at `path` if given, otherwise keep everything in memory.
    pub async fn open(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Opening persistent reference cache");
                Ok(Self::sqlite(Database::connect(path).await?))
            },
            None => Ok(Self::in_memory()),
        }
    }

    /// The store for `key`, created on first use.
    pub async fn namespace(&self, key: &str) -> StoreHandle {
        let mut stores = self.stores.lock().await;
        if let Some(store) = stores.get(key) {
            return store.clone();
        }
        let store: StoreHandle = match &self.backend {
            Backend::Memory => Arc::new(MemoryStore::new(key)),
            Backend::Sqlite(db) => Arc::new(SqliteStore::new(db, key)),
        };
        tracing::trace!(namespace = key, "Created cache namespace");
        stores.insert(key.to_string(), store.clone());
        store
    }

    /// Close the underlying database, if any.
    pub async fn close(&self) {
        if let Backend::Sqlite(db) = &self.backend {
            db.close().await;
        }
    }
}

impl Default for Namespaces {
    fn default() -> Self {
        Self::in_memory()
    }
}
