use crate::adapter::AdapterHandle;
use crate::error::{ErrorKind, Result};
use crate::host::HostHandle;
use crate::memo::Memo;
use crate::registry::SyntheticRegistry;
use crate::result::RewriteResult;
use crate::scope::Scope;
use crate::tags::TagAttrs;
use cdnify_cache::{CacheHandle, Namespaces, group_key};
use cdnify_config::{ExcludeSet, Options};
use cdnify_document::{Content, Document, DocumentKind, Token, content_hash};
use exn::{OptionExt, ResultExt};
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::instrument;

/// Finds, resolves and rewrites resource references for one build run.
///
/// A `Rewriter` owns the per-run memo tables, so create one per run. The
/// reference cache ([`Namespaces`]) and the [`SyntheticRegistry`] are
/// injected and may outlive it.
///
/// # Examples
///
/// ```ignore
/// let rewriter = Rewriter::new(host, options)?
///     .with_adapter(adapter)
///     .with_cache(namespaces);
/// let mut page = host.load("/index.html", "").await?;
/// let result = rewriter.run(&page).await?;
/// rewriter.update(&mut page, result);
/// ```
pub struct Rewriter {
    pub(crate) host: HostHandle,
    adapter: Option<AdapterHandle>,
    pub(crate) options: Options,
    options_key: String,
    pub(crate) tag_attrs: TagAttrs,
    exclude: ExcludeSet,
    cache: Arc<Namespaces>,
    pub(crate) synthetic: Arc<SyntheticRegistry>,
    documents: Memo<RewriteResult>,
    urls: Memo<String>,
}

impl Rewriter {
    pub fn new(host: HostHandle, options: Options) -> Result<Self> {
        let exclude = options.exclude_set().or_raise(|| ErrorKind::Config("invalid exclusion pattern".to_string()))?;
        let options_key =
            serde_json::to_string(&options).or_raise(|| ErrorKind::Config("options are not serializable".to_string()))?;
        Ok(Self {
            host,
            adapter: None,
            tag_attrs: TagAttrs::new(&options.tag_attrs),
            options,
            options_key,
            exclude,
            cache: Arc::new(Namespaces::in_memory()),
            synthetic: Arc::default(),
            documents: Memo::default(),
            urls: Memo::default(),
        })
    }

    /// Like [`new`](Self::new), but with the reference cache persisted at
    /// `options.cache_path` when one is configured.
    pub async fn open(host: HostHandle, options: Options) -> Result<Self> {
        let cache = Namespaces::open(options.cache_path.as_deref()).await.or_raise(|| ErrorKind::Cache)?;
        Ok(Self::new(host, options)?.with_cache(Arc::new(cache)))
    }

    pub fn with_adapter(mut self, adapter: AdapterHandle) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Use a shared reference cache instead of a private in-memory one.
    pub fn with_cache(mut self, cache: Arc<Namespaces>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_registry(mut self, registry: Arc<SyntheticRegistry>) -> Self {
        self.synthetic = registry;
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Whether the host may spread documents over multiple worker processes.
    pub const fn cluster() -> bool {
        false
    }

    /// Whether the host may cache this stage's output by input. Results
    /// depend on other files' content, so it may not.
    pub const fn cacheable() -> bool {
        false
    }

    /// Kinds of document the host should run this stage on by default.
    /// Everything else is reached through references.
    pub const fn include() -> &'static [DocumentKind] {
        &[DocumentKind::Markup]
    }

    /// Rewrite every reference in `document`.
    ///
    /// Nothing is written back; pass the result to [`update`](Self::update).
    pub async fn run(&self, document: &Document) -> Result<RewriteResult> {
        self.run_inner(document, &Scope::default()).await
    }

    // Recursion goes document -> reference -> document, so one link of the
    // chain has to be a nameable, boxed future.
    pub(crate) fn run_inner<'a>(&'a self, document: &'a Document, scope: &'a Scope) -> BoxFuture<'a, Result<RewriteResult>> {
        Box::pin(self.dispatch(document, scope))
    }

    #[instrument(skip(self, document, scope), fields(path = %document.path, kind = ?document.kind))]
    async fn dispatch(&self, document: &Document, scope: &Scope) -> Result<RewriteResult> {
        let scope = scope.enter(document)?;
        let kind = match document.flags.is_template_fragment {
            true => DocumentKind::Markup,
            false => document.kind,
        };
        match kind {
            DocumentKind::Markup => self.rewrite_markup(document, &scope).await,
            DocumentKind::Script => self.rewrite_script(document, &scope).await,
            DocumentKind::Stylesheet => self.rewrite_stylesheet(document, &scope).await,
            DocumentKind::Other => {
                let content = self.raw(document).await?;
                let url = self.cdn_url(&content, &document.path).await?;
                Ok(RewriteResult::Other { url })
            },
        }
    }

    /// Commit a [`RewriteResult`] back into its document.
    ///
    /// Markup always takes the rewritten tokens. Scripts and stylesheets are
    /// left untouched when `not_update_resource` is set or the document is
    /// flagged `suppress_rewrite`. Other documents never change.
    pub fn update(&self, document: &mut Document, result: RewriteResult) {
        let suppress = self.options.not_update_resource || document.flags.suppress_rewrite;
        match result {
            RewriteResult::Markup { ast } => document.content = Content::Tokens(ast),
            RewriteResult::Script { content, .. } if !suppress => document.content = Content::Text(content),
            RewriteResult::Stylesheet { ast, .. } if !suppress => document.content = Content::Tokens(ast),
            RewriteResult::Script { .. } | RewriteResult::Stylesheet { .. } | RewriteResult::Other { .. } => {},
        }
    }

    /// Final URL for a reference found while rewriting the document at the
    /// top of `scope`.
    ///
    /// Excluded references come back unchanged. Everything else is loaded
    /// through the host and run through this same pipeline; the child's own
    /// URL is the replacement.
    pub(crate) async fn resolve_reference(&self, reference: &str, scope: &Scope) -> Result<String> {
        if self.host.is_excluded(reference, &self.exclude) {
            tracing::debug!(reference, "Reference excluded, leaving untouched");
            return Ok(reference.to_string());
        }
        let document = self
            .host
            .load(reference, scope.referrer())
            .await
            .or_raise(|| ErrorKind::Resolution(reference.to_string()))?;
        let result = self.invoke_document(document, scope).await?;
        result.url().map(str::to_string).ok_or_raise(|| ErrorKind::Resolution(reference.to_string()))
    }

    /// Run the pipeline on a child document, at most once per path per run.
    pub(crate) async fn invoke_document(&self, document: Document, scope: &Scope) -> Result<RewriteResult> {
        // Checked before the memo: waiting on an ancestor's cell would never finish.
        if scope.contains(&document.path) {
            exn::bail!(ErrorKind::Cycle(document.path));
        }
        // Relative references in a synthetic document depend on where it was inlined.
        let key = match document.flags.is_virtual {
            true => format!("{}\u{0}{}", scope.referrer(), document.path),
            false => document.path.clone(),
        };
        self.documents.get_or_try_init(key, || async move { self.run_inner(&document, scope).await }).await
    }

    /// Leaf resolution: the URL of exactly these bytes, published as `path`.
    ///
    /// Consults the reference cache by content hash first, so the adapter
    /// only ever sees each distinct content once per cache namespace. The
    /// whole lookup is also memoized per `(path, options)` for this run.
    #[instrument(skip(self, content), fields(size = content.len()))]
    pub(crate) async fn cdn_url(&self, content: &[u8], path: &str) -> Result<String> {
        let adapter = self
            .adapter
            .as_ref()
            .ok_or_raise(|| ErrorKind::Config("no resolution adapter configured".to_string()))?;
        let key = format!("cdn_url\u{0}{path}\u{0}{}", self.options_key);
        self.urls
            .get_or_try_init(key, || async move {
                let hash = content_hash(content);
                let cache = self.cache_handle(&hash).await;
                if let Some(url) = cache.get().await.or_raise(|| ErrorKind::Cache)? {
                    tracing::trace!(path, %hash, "Reference cache hit");
                    return Ok(url);
                }
                let url = adapter
                    .resolve(content, path, &self.options, &cache)
                    .await
                    .or_raise(|| ErrorKind::Adapter(path.to_string()))?;
                if !cache.set(&url).await.or_raise(|| ErrorKind::Cache)?
                    && let Some(winner) = cache.get().await.or_raise(|| ErrorKind::Cache)?
                {
                    // Lost a first-access race; the stored value is authoritative.
                    return Ok(winner);
                }
                Ok(url)
            })
            .await
    }

    async fn cache_handle(&self, hash: &str) -> CacheHandle {
        if !self.options.cache {
            return CacheHandle::Disabled;
        }
        let store = self.cache.namespace(&group_key(self.options.product.as_deref())).await;
        CacheHandle::scoped(store, hash)
    }

    /// The document's tokens, asking the host to parse raw content.
    pub(crate) async fn tokens(&self, document: &Document) -> Result<Vec<Token>> {
        let raw = match &document.content {
            Content::Tokens(tokens) => return Ok(tokens.clone()),
            Content::Bytes(bytes) => bytes.as_slice(),
            Content::Text(text) => text.as_bytes(),
        };
        self.host
            .parse(&document.path, raw, document.kind)
            .await
            .or_raise(|| ErrorKind::Host(document.path.clone()))
    }

    /// The document's text, asking the host to serialize parsed content.
    pub(crate) async fn text(&self, document: &Document) -> Result<String> {
        match document.content.text() {
            Some(text) => Ok(text.into_owned()),
            None => Ok(String::from_utf8_lossy(&self.serialize(document).await?).into_owned()),
        }
    }

    async fn raw(&self, document: &Document) -> Result<Vec<u8>> {
        match document.content.raw() {
            Some(raw) => Ok(raw.to_vec()),
            None => self.serialize(document).await,
        }
    }

    pub(crate) async fn serialize(&self, document: &Document) -> Result<Vec<u8>> {
        self.host.serialize(document).await.or_raise(|| ErrorKind::Host(document.path.clone()))
    }
}
