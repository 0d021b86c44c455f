use crate::error::Result;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

/// Per-run, single-flight memo table.
///
/// The first caller for a key runs `init`; concurrent callers for the same
/// key wait for it instead of starting their own. Failures are not
/// remembered, so a later caller retries.
pub(crate) struct Memo<V> {
    cells: Mutex<HashMap<String, Arc<OnceCell<V>>>>,
}

impl<V: Clone> Memo<V> {
    pub(crate) async fn get_or_try_init<F, Fut>(&self, key: String, init: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        // Only hold the table lock long enough to find the cell.
        let cell = self.cells.lock().await.entry(key).or_default().clone();
        cell.get_or_try_init(init).await.cloned()
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.cells.lock().await.values().filter(|cell| cell.initialized()).count()
    }
}

impl<V> Default for Memo<V> {
    fn default() -> Self {
        Self {
            cells: Mutex::default(),
        }
    }
}
