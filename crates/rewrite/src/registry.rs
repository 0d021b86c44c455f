use crate::error::{ErrorKind, Result};
use crate::host::Host;
use cdnify_document::{Content, Document};
use exn::ResultExt;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Synthetic documents promoted from inline blocks, keyed by their
/// content-derived path.
///
/// The first registration of a path asks the host to add the child file;
/// every later registration of the same path gets that same document back.
/// Share one registry across runs of a build to keep that guarantee across
/// pages.
#[derive(Debug, Default)]
pub struct SyntheticRegistry {
    documents: Mutex<HashMap<String, Document>>,
}

impl SyntheticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn obtain(
        &self,
        host: &dyn Host,
        path: &str,
        content: Content,
        is_template_fragment: bool,
    ) -> Result<Document> {
        // Held across `add_file` so the host sees each path exactly once.
        let mut documents = self.documents.lock().await;
        if let Some(document) = documents.get(path) {
            return Ok(document.clone());
        }
        let mut document =
            host.add_file(path, content, true).await.or_raise(|| ErrorKind::Host(path.to_string()))?;
        document.flags.is_virtual = true;
        document.flags.is_template_fragment |= is_template_fragment;
        tracing::trace!(path, "Registered synthetic document");
        documents.insert(path.to_string(), document.clone());
        Ok(document)
    }

    pub async fn get(&self, path: &str) -> Option<Document> {
        self.documents.lock().await.get(path).cloned()
    }

    pub async fn len(&self) -> usize {
        self.documents.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.lock().await.is_empty()
    }
}
