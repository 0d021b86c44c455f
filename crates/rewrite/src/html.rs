use crate::Rewriter;
use crate::error::{Error, ErrorKind, Result};
use crate::result::RewriteResult;
use crate::scope::Scope;
use crate::url::{is_plain_file, is_remote};
use cdnify_document::{Attributes, Block, Content, Document, Embedded, Tag, Token, synthetic_path, tokens_text};
use exn::OptionExt;
use futures::future::try_join_all;

impl Rewriter {
    pub(crate) async fn rewrite_markup(&self, document: &Document, scope: &Scope) -> Result<RewriteResult> {
        let tokens = self.tokens(document).await?;
        // Token order and count are preserved; only payloads change.
        let ast = try_join_all(tokens.into_iter().map(|token| self.rewrite_markup_token(token, &document.path, scope)))
            .await?;
        Ok(RewriteResult::Markup { ast })
    }

    async fn rewrite_markup_token(&self, token: Token, path: &str, scope: &Scope) -> Result<Token> {
        Ok(match token {
            Token::TagStart(tag) => Token::TagStart(self.rewrite_tag(tag, path, scope).await?),
            Token::Script(block) => Token::Script(self.rewrite_script_block(block, path, scope).await?),
            Token::Style(block) => Token::Style(self.rewrite_style_block(block, scope).await?),
            token => token,
        })
    }

    /// Rewrite the resource-bearing attributes of one tag, plus its inline
    /// `style` declarations.
    async fn rewrite_tag(&self, mut tag: Tag, path: &str, scope: &Scope) -> Result<Tag> {
        let name = tag.lower_name();
        let Some(attrs) = tag.attrs.as_mut() else {
            exn::bail!(ErrorKind::MalformedToken {
                path: path.to_string(),
                token: format!("<{}>", tag.name),
            });
        };

        let mut pending = Vec::new();
        for attr in self.tag_attrs.get(&name) {
            let Some(value) = attrs.get(attr).map(str::trim).filter(|value| !value.is_empty()) else {
                continue;
            };
            if name == "link" && attr.eq_ignore_ascii_case("href") && !self.is_rewritable_link(attrs) {
                tracing::debug!(rel = ?attrs.get("rel"), href = value, "Link relation not rewritten");
                continue;
            }
            let srcset = attr.eq_ignore_ascii_case("srcset");
            if !srcset && (is_remote(value) || !is_plain_file(value)) {
                tracing::debug!(tag = %name, attr = %attr, value, "Not a local file reference, leaving untouched");
                continue;
            }
            let value = value.to_string();
            pending.push(async move {
                let rewritten = match srcset {
                    true => self.rewrite_srcset(&value, scope).await?,
                    false => self.resolve_reference(&value, scope).await?,
                };
                Ok::<_, Error>((attr.as_str(), rewritten))
            });
        }

        let style = attrs.get("style").filter(|style| !style.trim().is_empty()).map(str::to_string);
        let rewrite_style = async {
            match &style {
                Some(style) => self.rewrite_css_value(style, None, scope).await.map(Some),
                None => Ok(None),
            }
        };

        let (rewritten, style) = futures::try_join!(try_join_all(pending), rewrite_style)?;
        for (attr, value) in rewritten {
            attrs.set(attr, value);
        }
        if let Some(style) = style {
            attrs.set("style", style);
        }
        Ok(tag)
    }

    fn is_rewritable_link(&self, attrs: &Attributes) -> bool {
        let Some(rel) = attrs.get("rel").map(str::trim) else {
            return false;
        };
        rel.eq_ignore_ascii_case("stylesheet") || self.options.rels.iter().any(|allowed| allowed.trim().eq_ignore_ascii_case(rel))
    }

    /// Rewrite each candidate URL of a `srcset`, keeping its descriptor.
    async fn rewrite_srcset(&self, srcset: &str, scope: &Scope) -> Result<String> {
        let candidates = srcset
            .split(',')
            .map(str::trim)
            .filter(|candidate| !candidate.is_empty())
            .map(|candidate| self.rewrite_srcset_candidate(candidate, scope));
        Ok(try_join_all(candidates).await?.join(","))
    }

    async fn rewrite_srcset_candidate(&self, candidate: &str, scope: &Scope) -> Result<String> {
        let (url, descriptor) = match candidate.find(char::is_whitespace) {
            Some(index) => candidate.split_at(index),
            None => (candidate, ""),
        };
        if is_remote(url) || !is_plain_file(url) {
            return Ok(candidate.to_string());
        }
        let url = self.resolve_reference(url, scope).await?;
        Ok(format!("{url}{descriptor}"))
    }

    async fn rewrite_script_block(&self, mut block: Block, path: &str, scope: &Scope) -> Result<Block> {
        if block.start.is_external() {
            block.start = self.rewrite_tag(block.start, path, scope).await?;
        } else if block.start.is_template() {
            self.rewrite_embedded(&mut block.content, "html", true, scope).await?;
        } else if !block.content.value.trim().is_empty() {
            block.content.value = self.rewrite_js_text(&block.content.value, scope).await?;
            block.content.tokens = None;
        }
        Ok(block)
    }

    async fn rewrite_style_block(&self, mut block: Block, scope: &Scope) -> Result<Block> {
        self.rewrite_embedded(&mut block.content, "css", false, scope).await?;
        Ok(block)
    }

    /// Promote an inline body to a synthetic document, run the pipeline on
    /// it, and splice the rewritten tokens back in.
    async fn rewrite_embedded(
        &self,
        content: &mut Embedded,
        extension: &str,
        is_template_fragment: bool,
        scope: &Scope,
    ) -> Result<()> {
        if content.tokens.is_none() && content.value.trim().is_empty() {
            return Ok(());
        }
        let path = synthetic_path(&content.value, extension);
        let initial = match content.tokens.take() {
            Some(tokens) => Content::Tokens(tokens),
            None => Content::Text(content.value.clone()),
        };
        let document = self.synthetic.obtain(self.host.as_ref(), &path, initial, is_template_fragment).await?;
        let ast = self
            .invoke_document(document, scope)
            .await?
            .into_ast()
            .ok_or_raise(|| ErrorKind::Resolution(path))?;
        content.value = tokens_text(&ast);
        content.tokens = Some(ast);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::mock::{MockAdapter, MockHost, rewriter};
    use crate::registry::SyntheticRegistry;
    use crate::result::RewriteResult;
    use crate::Rewriter;
    use cdnify_config::Options;
    use cdnify_document::{Attribute, Attributes, Block, Content, Document, Embedded, Quote, Tag, Token, tokens_text};
    use rstest::rstest;
    use std::ops::Deref;
    use std::sync::Arc;

    fn asset(path: &str) -> Document {
        Document::from_path(path, Content::Bytes(format!("bytes of {path}").into_bytes()))
    }

    fn tag(name: &str, attrs: &[(&str, &str)]) -> Token {
        Token::TagStart(Tag::new(name, attrs.iter().copied().collect()))
    }

    fn page(tokens: Vec<Token>) -> Document {
        Document::from_path("/index.html", Content::Tokens(tokens))
    }

    fn style(tokens: Vec<Token>) -> Token {
        Token::Style(Block {
            start: Tag::new("style", Attributes::new()),
            content: Embedded {
                value: tokens_text(&tokens),
                tokens: Some(tokens),
            },
            end: "</style>".to_string(),
        })
    }

    fn script(attrs: &[(&str, &str)], body: &str) -> Token {
        Token::Script(Block {
            start: Tag::new("script", attrs.iter().copied().collect()),
            content: Embedded::text(body),
            end: "</script>".to_string(),
        })
    }

    fn attr<'a>(ast: &'a [Token], index: usize, name: &str) -> Option<&'a str> {
        match &ast[index] {
            Token::TagStart(tag) => tag.attrs.as_ref().and_then(|attrs| attrs.get(name)),
            Token::Script(block) | Token::Style(block) => block.start.attrs.as_ref().and_then(|attrs| attrs.get(name)),
            _ => None,
        }
    }

    async fn run(host: MockHost, adapter: MockAdapter, options: Options, tokens: Vec<Token>) -> Vec<Token> {
        let (rewriter, _, _) = rewriter(host, adapter, options);
        rewriter.run(&page(tokens)).await.unwrap().into_ast().unwrap()
    }

    #[tokio::test]
    async fn test_srcset() {
        let host = MockHost::with_documents([asset("/a.png"), asset("/b.png")]);
        let adapter = MockAdapter::with_urls([("/a.png", "/cdn/a123.png"), ("/b.png", "/cdn/b456.png")]);
        let ast = run(host, adapter, Options::default(), vec![tag("img", &[("srcset", "/a.png 1x, /b.png 2x")])]).await;
        assert_eq!(attr(&ast, 0, "srcset"), Some("/cdn/a123.png 1x,/cdn/b456.png 2x"));
    }

    #[tokio::test]
    async fn test_srcset_keeps_remote_candidates() {
        let host = MockHost::with_documents([asset("/a.png")]);
        let adapter = MockAdapter::with_urls([("/a.png", "/cdn/a.png")]);
        let ast = run(
            host,
            adapter,
            Options::default(),
            vec![tag("source", &[("srcset", "https://x.test/a.png 480w, , /a.png 800w")])],
        )
        .await;
        assert_eq!(attr(&ast, 0, "srcset"), Some("https://x.test/a.png 480w,/cdn/a.png 800w"));
    }

    #[tokio::test]
    async fn test_rewrites_default_and_extra_attributes() {
        let host = MockHost::with_documents([asset("/a.png"), asset("/poster.jpg"), asset("/lazy.png")]);
        let adapter = MockAdapter::with_urls([
            ("/a.png", "https://cdn.test/a.png"),
            ("/poster.jpg", "https://cdn.test/poster.jpg"),
            ("/lazy.png", "https://cdn.test/lazy.png"),
        ]);
        let options = Options {
            tag_attrs: [("img".to_string(), cdnify_config::AttrList::One("data-src".to_string()))].into(),
            ..Options::default()
        };
        let ast = run(
            host,
            adapter,
            options,
            vec![
                tag("IMG", &[("SRC", "/a.png"), ("data-src", "/lazy.png"), ("alt", "a")]),
                Token::Raw("\n".to_string()),
                tag("video", &[("poster", "/poster.jpg")]),
            ],
        )
        .await;
        assert_eq!(ast.len(), 3);
        assert_eq!(attr(&ast, 0, "src"), Some("https://cdn.test/a.png"));
        assert_eq!(attr(&ast, 0, "data-src"), Some("https://cdn.test/lazy.png"));
        assert_eq!(attr(&ast, 0, "alt"), Some("a"));
        assert_eq!(ast[1], Token::Raw("\n".to_string()));
        assert_eq!(attr(&ast, 2, "poster"), Some("https://cdn.test/poster.jpg"));
    }

    #[rstest]
    #[case("stylesheet", true)]
    #[case("StyleSheet", true)]
    #[case("preload", true)]
    #[case("icon", false)]
    #[case("", false)]
    #[tokio::test]
    async fn test_link_rel_filter(#[case] rel: &str, #[case] rewritten: bool) {
        let host = MockHost::with_documents([asset("/site.bin")]);
        let adapter = MockAdapter::with_urls([("/site.bin", "https://cdn.test/site.bin")]);
        let options = Options {
            rels: vec!["preload".to_string()],
            ..Options::default()
        };
        let ast = run(host, adapter, options, vec![tag("link", &[("rel", rel), ("href", "/site.bin")])]).await;
        let expected = if rewritten { "https://cdn.test/site.bin" } else { "/site.bin" };
        assert_eq!(attr(&ast, 0, "href"), Some(expected));
    }

    #[rstest]
    #[case("{{var}}.jpg?x={{v}}")]
    #[case("/img/a.png?v=1")]
    #[case("https://other.test/a.png")]
    #[case("//other.test/a.png")]
    #[case("   ")]
    #[case("/img/noext")]
    #[tokio::test]
    async fn test_untouched_references(#[case] src: &str) {
        let (rewriter, _, adapter) = rewriter(MockHost::default(), MockAdapter::default(), Options::default());
        let tokens = vec![tag("img", &[("src", src)])];
        let ast = rewriter.run(&page(tokens.clone())).await.unwrap().into_ast().unwrap();
        assert_eq!(ast, tokens);
        assert_eq!(adapter.calls(), 0);
    }

    #[tokio::test]
    async fn test_excluded_references_are_not_loaded() {
        let options = Options {
            exclude: vec!["^/raw/".to_string()],
            ..Options::default()
        };
        let (rewriter, _, adapter) = rewriter(MockHost::default(), MockAdapter::default(), options);
        let tokens = vec![tag("img", &[("src", "/raw/a.png")])];
        let ast = rewriter.run(&page(tokens.clone())).await.unwrap().into_ast().unwrap();
        assert_eq!(ast, tokens);
        assert_eq!(adapter.calls(), 0);
    }

    #[tokio::test]
    async fn test_quote_style_is_kept() {
        let host = MockHost::with_documents([asset("/a.png")]);
        let adapter = MockAdapter::with_urls([("/a.png", "https://cdn.test/a.png")]);
        let mut attrs = Attributes::new();
        attrs.push(Attribute {
            name: "src".to_string(),
            value: Some("/a.png".to_string()),
            quote: Quote::Single,
        });
        let ast = run(host, adapter, Options::default(), vec![Token::TagStart(Tag::new("img", attrs))]).await;
        assert_eq!(tokens_text(&ast), "<img src='https://cdn.test/a.png'>");
    }

    #[tokio::test]
    async fn test_style_attribute_rewrites_background_images_only() {
        let host = MockHost::with_documents([asset("/bg.png"), asset("/f.woff")]);
        let adapter = MockAdapter::with_urls([("/bg.png", "https://cdn.test/bg.png")]);
        let ast = run(
            host,
            adapter,
            Options::default(),
            vec![tag("div", &[("style", "background: url('/bg.png?v=2') no-repeat; src: url(/f.woff)")])],
        )
        .await;
        assert_eq!(
            attr(&ast, 0, "style"),
            Some("background: url(https://cdn.test/bg.png) no-repeat; src: url(/f.woff)")
        );
    }

    #[tokio::test]
    async fn test_missing_attribute_table_is_malformed() {
        let (rewriter, _, _) = rewriter(MockHost::default(), MockAdapter::default(), Options::default());
        let broken = Token::TagStart(Tag {
            name: "img".to_string(),
            attrs: None,
            self_closing: false,
        });
        let err = rewriter.run(&page(vec![broken])).await.unwrap_err();
        assert!(matches!(
            err.deref(),
            ErrorKind::MalformedToken { path, token } if path == "/index.html" && token == "<img>"
        ));
    }

    #[tokio::test]
    async fn test_missing_reference_fails_resolution() {
        let (rewriter, _, _) = rewriter(MockHost::default(), MockAdapter::default(), Options::default());
        let err = rewriter.run(&page(vec![tag("img", &[("src", "/missing.png")])])).await.unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::Resolution(reference) if reference == "/missing.png"));
    }

    #[tokio::test]
    async fn test_external_script() {
        let host = MockHost::with_documents([Document::from_path("/app.js", Content::Text("go();".to_string()))]);
        let adapter = MockAdapter::with_urls([("/app.js", "https://cdn.test/app.js")]);
        let ast = run(host, adapter, Options::default(), vec![script(&[("src", "/app.js")], "")]).await;
        assert_eq!(attr(&ast, 0, "src"), Some("https://cdn.test/app.js"));
    }

    #[tokio::test]
    async fn test_inline_script() {
        let host = MockHost::with_documents([asset("/img/a.png")]);
        let adapter = MockAdapter::with_urls([("/img/a.png", "https://cdn.test/a.png")]);
        let ast = run(host, adapter, Options::default(), vec![script(&[], r#"var u = {cdn: "/img/a.png"}.cdn;"#)]).await;
        let Token::Script(block) = &ast[0] else {
            panic!("expected a script block");
        };
        assert_eq!(block.content.value, r#"var u = "https://cdn.test/a.png";"#);
    }

    #[tokio::test]
    async fn test_inline_styles_share_one_synthetic_document() {
        let host = MockHost::with_documents([asset("/bg.png")]);
        let adapter = MockAdapter::with_urls([("/bg.png", "https://cdn.test/bg.png")]);
        let (rewriter, host, _) = rewriter(host, adapter, Options::default());
        let body = || {
            vec![
                Token::Raw(".a{".to_string()),
                Token::Property("background".to_string()),
                Token::Raw(":".to_string()),
                Token::Value("url(/bg.png)".to_string()),
                Token::Raw("}".to_string()),
            ]
        };
        let result = rewriter.run(&page(vec![style(body()), style(body())])).await.unwrap();
        let ast = result.into_ast().unwrap();
        for token in &ast {
            let Token::Style(block) = token else {
                panic!("expected a style block");
            };
            assert_eq!(tokens_text(block.content.tokens.as_deref().unwrap()), ".a{background:url(https://cdn.test/bg.png)}");
            assert_eq!(block.content.value, ".a{background:url(https://cdn.test/bg.png)}");
        }
        assert_eq!(host.added_count(), 1);
        assert_eq!(host.serialize_count(), 0);
        assert_eq!(rewriter.synthetic.len().await, 1);
    }

    #[tokio::test]
    async fn test_registry_is_shared_between_rewriters() {
        let host = Arc::new(MockHost::with_files([("/bg.png", b"\x89PNG".to_vec())]));
        let adapter = Arc::new(MockAdapter::with_urls([("/bg.png", "https://cdn.test/bg.png")]));
        let registry = Arc::new(SyntheticRegistry::new());
        let body = vec![
            Token::Raw(".a{".to_string()),
            Token::Property("background".to_string()),
            Token::Raw(":".to_string()),
            Token::Value("url(/bg.png)".to_string()),
            Token::Raw("}".to_string()),
        ];
        for path in ["/a.html", "/b.html"] {
            let rewriter = Rewriter::new(host.clone(), Options::default())
                .unwrap()
                .with_adapter(adapter.clone())
                .with_registry(registry.clone());
            let document = Document::from_path(path, Content::Tokens(vec![style(body.clone())]));
            let ast = rewriter.run(&document).await.unwrap().into_ast().unwrap();
            assert_eq!(tokens_text(&ast), "<style>.a{background:url(https://cdn.test/bg.png)}</style>");
        }
        assert_eq!(host.added_count(), 1);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_template_script_is_rewritten_as_markup() {
        let host = MockHost::with_documents([asset("/a.png")]);
        let adapter = MockAdapter::with_urls([("/a.png", "https://cdn.test/a.png")]);
        let (rewriter, host, _) = rewriter(host, adapter, Options::default());
        let template = Token::Script(Block {
            start: Tag::new("script", [("type", "text/html")].into_iter().collect()),
            content: Embedded {
                value: r#"<img src="/a.png">"#.to_string(),
                tokens: Some(vec![tag("img", &[("src", "/a.png")])]),
            },
            end: "</script>".to_string(),
        });
        let ast = rewriter.run(&page(vec![template])).await.unwrap().into_ast().unwrap();
        let Token::Script(block) = &ast[0] else {
            panic!("expected a script block");
        };
        assert_eq!(tokens_text(block.content.tokens.as_deref().unwrap()), r#"<img src="https://cdn.test/a.png">"#);
        assert_eq!(block.content.value, r#"<img src="https://cdn.test/a.png">"#);
        let fragment = rewriter.synthetic.get(&cdnify_document::synthetic_path(r#"<img src="/a.png">"#, "html")).await.unwrap();
        assert!(fragment.flags.is_template_fragment);
        assert!(fragment.flags.is_virtual);
        assert_eq!(host.added_count(), 1);
    }

    #[tokio::test]
    async fn test_markup_result_has_no_url() {
        let (rewriter, _, _) = rewriter(MockHost::default(), MockAdapter::default(), Options::default());
        let result = rewriter.run(&page(vec![Token::Raw("<p>hi</p>".to_string())])).await.unwrap();
        assert!(matches!(&result, RewriteResult::Markup { ast } if ast.len() == 1));
        assert_eq!(result.url(), None);
    }
}
