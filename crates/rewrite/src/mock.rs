//! In-memory host and adapter for testing.

use crate::adapter::Adapter;
use crate::error::{ErrorKind, Result};
use crate::host::Host;
use crate::url::extname;
use async_trait::async_trait;
use cdnify_cache::CacheHandle;
use cdnify_config::Options;
use cdnify_document::{Content, Document, DocumentKind, Flags, Token, content_hash, tokens_text};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, RwLock};

/// Host pipeline backed by a `HashMap` of documents.
///
/// References are looked up by exact path, ignoring the referrer. There is
/// no parser: documents must be handed over already tokenized (or be opaque
/// bytes), and `serialize` renders tokens with [`tokens_text`].
#[derive(Default)]
pub struct MockHost {
    files: RwLock<HashMap<String, Document>>,
    serialized: AtomicUsize,
    added: AtomicUsize,
}

impl MockHost {
    pub fn with_documents(documents: impl IntoIterator<Item = Document>) -> Self {
        let files = documents.into_iter().map(|document| (document.path.clone(), document)).collect();
        Self {
            files: RwLock::new(files),
            ..Self::default()
        }
    }

    /// Create a host of raw files, guessing each kind from its path.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<String>, impl Into<Vec<u8>>)>) -> Self {
        Self::with_documents(
            files.into_iter().map(|(path, bytes)| Document::from_path(path, Content::Bytes(bytes.into()))),
        )
    }

    /// Number of `serialize` calls so far.
    pub fn serialize_count(&self) -> usize {
        self.serialized.load(Ordering::SeqCst)
    }

    /// Number of `add_file` calls so far.
    pub fn added_count(&self) -> usize {
        self.added.load(Ordering::SeqCst)
    }

    pub async fn document(&self, path: &str) -> Option<Document> {
        self.files.read().await.get(path).cloned()
    }
}

#[async_trait]
impl Host for MockHost {
    async fn parse(&self, path: &str, _raw: &[u8], _kind: DocumentKind) -> Result<Vec<Token>> {
        exn::bail!(ErrorKind::Host(format!("no parser for {path}")))
    }

    async fn serialize(&self, document: &Document) -> Result<Vec<u8>> {
        self.serialized.fetch_add(1, Ordering::SeqCst);
        Ok(match &document.content {
            Content::Bytes(bytes) => bytes.clone(),
            Content::Text(text) => text.clone().into_bytes(),
            Content::Tokens(tokens) => tokens_text(tokens).into_bytes(),
        })
    }

    async fn load(&self, reference: &str, _referrer: &str) -> Result<Document> {
        match self.files.read().await.get(reference) {
            Some(document) => Ok(document.clone()),
            None => exn::bail!(ErrorKind::Host(format!("{reference} not found"))),
        }
    }

    async fn add_file(&self, path: &str, content: Content, is_virtual: bool) -> Result<Document> {
        self.added.fetch_add(1, Ordering::SeqCst);
        let document = Document::from_path(path, content).with_flags(Flags {
            is_virtual,
            ..Flags::default()
        });
        self.files.write().await.insert(path.to_string(), document.clone());
        Ok(document)
    }
}

/// Resolution adapter that records what it was asked to publish.
///
/// Paths without a configured URL resolve to
/// `https://cdn.test/<first 12 hash chars><extension>`.
#[derive(Default)]
pub struct MockAdapter {
    urls: HashMap<String, String>,
    failures: HashSet<String>,
    calls: AtomicUsize,
    published: Mutex<HashMap<String, Vec<u8>>>,
}

impl MockAdapter {
    pub fn with_urls(urls: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>) -> Self {
        Self {
            urls: urls.into_iter().map(|(path, url)| (path.into(), url.into())).collect(),
            ..Self::default()
        }
    }

    /// Fail every resolution of `path`.
    pub fn with_failure(mut self, path: impl Into<String>) -> Self {
        self.failures.insert(path.into());
        self
    }

    /// Number of `resolve` calls so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Bytes last handed over for `path`.
    pub async fn published(&self, path: &str) -> Option<Vec<u8>> {
        self.published.lock().await.get(path).cloned()
    }
}

#[async_trait]
impl Adapter for MockAdapter {
    async fn resolve(&self, content: &[u8], path: &str, _options: &Options, _cache: &CacheHandle) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failures.contains(path) {
            exn::bail!(ErrorKind::Adapter(format!("upload of {path} rejected")));
        }
        self.published.lock().await.insert(path.to_string(), content.to_vec());
        Ok(match self.urls.get(path) {
            Some(url) => url.clone(),
            None => format!("https://cdn.test/{}{}", &content_hash(content)[..12], extname(path)),
        })
    }
}

#[cfg(test)]
pub(crate) fn rewriter(
    host: MockHost,
    adapter: MockAdapter,
    options: Options,
) -> (crate::Rewriter, std::sync::Arc<MockHost>, std::sync::Arc<MockAdapter>) {
    let host = std::sync::Arc::new(host);
    let adapter = std::sync::Arc::new(adapter);
    let rewriter = crate::Rewriter::new(host.clone(), options)
        .unwrap()
        .with_adapter(adapter.clone());
    (rewriter, host, adapter)
}
