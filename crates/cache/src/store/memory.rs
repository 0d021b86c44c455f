use super::CacheStore;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tokio::sync::RwLock;

/// Cache namespace that lives for the duration of one process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    name: String,
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::default(),
        }
    }

    /// Pre-populate the store, e.g. to replay results from a previous build.
    pub fn with_entries(mut self, entries: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>) -> Self {
        let map = self.entries.get_mut();
        for (hash, value) in entries {
            map.entry(hash.into()).or_insert_with(|| value.into());
        }
        self
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, hash: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(hash).cloned())
    }

    async fn set(&self, hash: &str, value: &str) -> Result<bool> {
        match self.entries.write().await.entry(hash.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(value.to_string());
                Ok(true)
            },
        }
    }
}
