//! The seam between the rewriter and the build pipeline that drives it.

use crate::error::Result;
use async_trait::async_trait;
use cdnify_config::ExcludeSet;
use cdnify_document::{Content, Document, DocumentKind, Token};
use std::sync::Arc;

pub type HostHandle = Arc<dyn Host>;

/// Operations the rewriter needs from the host pipeline.
///
/// The host owns the file graph and the parser grammar. It is expected to
/// be idempotent per path: loading or adding the same path twice yields the
/// same document.
#[async_trait]
pub trait Host: Send + Sync {
    /// Tokenize raw markup or stylesheet content.
    async fn parse(&self, path: &str, raw: &[u8], kind: DocumentKind) -> Result<Vec<Token>>;

    /// Produce the bytes a document would be written out as.
    async fn serialize(&self, document: &Document) -> Result<Vec<u8>>;

    /// Find the document a reference points at. `referrer` is the path of the
    /// document the reference was found in; relative references resolve
    /// against it.
    async fn load(&self, reference: &str, referrer: &str) -> Result<Document>;

    /// Add a child file to the graph, e.g. a synthetic document for an
    /// inline `<style>` block.
    async fn add_file(&self, path: &str, content: Content, is_virtual: bool) -> Result<Document>;

    /// Whether `path` should be left exactly as written.
    fn is_excluded(&self, path: &str, exclude: &ExcludeSet) -> bool {
        exclude.is_match(path)
    }
}
