use crate::Rewriter;
use crate::consts::{BACKGROUND_REGEX, FILTER_REGEX, FONT_REGEX};
use crate::error::Result;
use crate::result::RewriteResult;
use crate::scope::Scope;
use crate::url::is_remote;
use cdnify_document::{Content, Document, Token, tokens_text};
use futures::future::try_join_all;
use regex::{Captures, Regex};

/// Which reference pattern applies to a declaration, chosen by property name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    /// Legacy `filter: progid:...(src='a.png')`.
    Filter,
    /// `@font-face { src: url(a.woff) }`.
    Font,
    /// Every other property: raster images in `url(...)`.
    Background,
}

impl Rule {
    fn for_property(property: Option<&str>) -> Self {
        match property {
            Some("filter") => Self::Filter,
            Some("src") => Self::Font,
            _ => Self::Background,
        }
    }

    fn regex(self) -> &'static Regex {
        match self {
            Self::Filter => &*FILTER_REGEX,
            Self::Font => &*FONT_REGEX,
            Self::Background => &*BACKGROUND_REGEX,
        }
    }

    /// Replacement text for a resolved reference.
    fn render(self, found: &Found, url: &str) -> String {
        match self {
            Self::Filter => format!("src={q}{url}{suffix}{q}", q = found.quote, suffix = found.suffix),
            Self::Font => format!("url({url}{})", found.suffix),
            // Query strings and fragments are dropped; the resolved URL is canonical.
            Self::Background => format!("url({url})"),
        }
    }
}

/// One match of a [`Rule`] regex, copied out of its [`Captures`].
#[derive(Debug)]
struct Found {
    whole: String,
    quote: &'static str,
    path: Option<String>,
    suffix: String,
}

impl Found {
    fn new(caps: &Captures<'_>) -> Self {
        // Groups come in (path, suffix) pairs, one pair per quoting style.
        let (quote, index) = [("\"", 1), ("'", 3), ("", 5)]
            .into_iter()
            .find(|(_, index)| caps.get(*index).is_some())
            .unwrap_or(("", 5));
        let text = |i: usize| caps.get(i).map(|m| m.as_str().to_string());
        Self {
            whole: caps.get(0).map(|m| m.as_str().to_string()).unwrap_or_default(),
            quote,
            path: text(index),
            suffix: text(index + 1).unwrap_or_default(),
        }
    }
}

impl Rewriter {
    pub(crate) async fn rewrite_stylesheet(&self, document: &Document, scope: &Scope) -> Result<RewriteResult> {
        let source = self.tokens(document).await?;
        let ast = self.rewrite_css_tokens(&source, scope).await?;
        let url = if document.flags.is_virtual {
            // No artifact is ever written, so there is nothing to serialize.
            self.cdn_url(tokens_text(&ast).as_bytes(), &document.path).await?
        } else {
            let published = match self.options.not_update_resource || document.flags.suppress_rewrite {
                true => source,
                false => ast.clone(),
            };
            let bytes = self.serialize(&document.with_content(Content::Tokens(published))).await?;
            self.cdn_url(&bytes, &document.path).await?
        };
        Ok(RewriteResult::Stylesheet { url, ast })
    }

    /// Rewrite every property value in a CSS token stream.
    ///
    /// A value is interpreted according to the property immediately before
    /// it. A value with no pending property is left untouched.
    pub(crate) async fn rewrite_css_tokens(&self, tokens: &[Token], scope: &Scope) -> Result<Vec<Token>> {
        let mut property: Option<String> = None;
        let mut pending = Vec::new();
        for (index, token) in tokens.iter().enumerate() {
            match token {
                Token::Property(name) => property = Some(name.trim().to_ascii_lowercase()),
                Token::Value(value) => {
                    let Some(property) = property.take() else {
                        continue;
                    };
                    pending.push(async move {
                        let value = self.rewrite_css_value(value, Some(property.as_str()), scope).await?;
                        Ok::<_, crate::error::Error>((index, value))
                    });
                },
                _ => {},
            }
        }
        let mut ast = tokens.to_vec();
        for (index, value) in try_join_all(pending).await? {
            ast[index] = Token::Value(value);
        }
        Ok(ast)
    }

    /// Rewrite the references in one declaration value.
    pub(crate) async fn rewrite_css_value(&self, value: &str, property: Option<&str>, scope: &Scope) -> Result<String> {
        let rule = Rule::for_property(property);
        cdnify_asyncutils::replace_all(rule.regex(), value, |caps| {
            self.rewrite_css_reference(rule, Found::new(caps), scope)
        })
        .await
    }

    async fn rewrite_css_reference(&self, rule: Rule, found: Found, scope: &Scope) -> Result<String> {
        let Some(path) = found.path.as_deref() else {
            return Ok(found.whole);
        };
        let url = match is_remote(path) {
            true => path.to_string(),
            false => self.resolve_reference(path, scope).await?,
        };
        Ok(rule.render(&found, &url))
    }
}
