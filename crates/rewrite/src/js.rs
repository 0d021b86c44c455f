use crate::Rewriter;
use crate::consts::CDN_REGEX;
use crate::error::Result;
use crate::result::RewriteResult;
use crate::scope::Scope;
use crate::url::is_remote;
use cdnify_document::Document;

impl Rewriter {
    pub(crate) async fn rewrite_script(&self, document: &Document, scope: &Scope) -> Result<RewriteResult> {
        let source = self.text(document).await?;
        let content = self.rewrite_js_text(&source, scope).await?;
        // The URL always addresses the rewritten text, even when write-back is suppressed.
        let url = self.cdn_url(content.as_bytes(), &document.path).await?;
        Ok(RewriteResult::Script { url, content })
    }

    /// Replace every `{cdn: "path"}.cdn` pseudo-literal with the quoted final URL.
    pub(crate) async fn rewrite_js_text(&self, source: &str, scope: &Scope) -> Result<String> {
        cdnify_asyncutils::replace_all(&CDN_REGEX, source, |caps| {
            let path = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str().to_string());
            let whole = caps.get(0).map(|m| m.as_str().to_string()).unwrap_or_default();
            self.rewrite_cdn_literal(path, whole, scope)
        })
        .await
    }

    async fn rewrite_cdn_literal(&self, path: Option<String>, whole: String, scope: &Scope) -> Result<String> {
        let Some(path) = path else {
            return Ok(whole);
        };
        let url = match is_remote(&path) {
            true => path,
            false => self.resolve_reference(&path, scope).await?,
        };
        Ok(format!("\"{url}\""))
    }
}
