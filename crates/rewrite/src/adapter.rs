use crate::error::Result;
use async_trait::async_trait;
use cdnify_cache::CacheHandle;
use cdnify_config::Options;
use std::sync::Arc;

pub type AdapterHandle = Arc<dyn Adapter>;

/// Turns the bytes of a resource into its final deployable URL.
///
/// This is where uploading, fingerprinting or any other URL scheme lives;
/// the rewriter only decides *what* gets resolved and caches the answer.
///
/// `cache` is scoped to the hash of `content`. The rewriter already
/// consults it before calling the adapter and stores the returned URL
/// afterwards; adapters may use it for their own bookkeeping, keeping in
/// mind that the first value stored for a hash wins.
#[async_trait]
pub trait Adapter: Send + Sync {
    async fn resolve(&self, content: &[u8], path: &str, options: &Options, cache: &CacheHandle) -> Result<String>;
}
