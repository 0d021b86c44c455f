use crate::error::Result;
use crate::store::StoreHandle;

/// A cache view scoped to one content hash.
///
/// This is what the engine hands to a resolution adapter: `get` and `set`
/// without a key, because the key is always the hash of the bytes being
/// resolved. When caching is switched off the handle is [`Disabled`](Self::Disabled)
/// and behaves as an always-empty, write-discarding cache.
#[derive(Clone)]
pub enum CacheHandle {
    Disabled,
    Scoped { store: StoreHandle, hash: String },
}

impl CacheHandle {
    pub fn scoped(store: StoreHandle, hash: impl Into<String>) -> Self {
        Self::Scoped {
            store,
            hash: hash.into(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Scoped { .. })
    }

    /// Content hash this handle is scoped to.
    pub fn hash(&self) -> Option<&str> {
        match self {
            Self::Disabled => None,
            Self::Scoped { hash, .. } => Some(hash),
        }
    }

    pub async fn get(&self) -> Result<Option<String>> {
        match self {
            Self::Disabled => Ok(None),
            Self::Scoped { store, hash } => store.get(hash).await,
        }
    }

    /// Store `value` unless the hash already has one. See [`CacheStore::set`](crate::CacheStore::set).
    pub async fn set(&self, value: &str) -> Result<bool> {
        match self {
            Self::Disabled => Ok(false),
            Self::Scoped { store, hash } => store.set(hash, value).await,
        }
    }
}

impl std::fmt::Debug for CacheHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => f.write_str("CacheHandle::Disabled"),
            Self::Scoped { store, hash } => {
                f.debug_struct("CacheHandle::Scoped").field("store", &store.name()).field("hash", hash).finish()
            },
        }
    }
}
