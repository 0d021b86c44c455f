//! Token stream model.
//!
//! The host parser emits these; the rewriter only ever replaces payloads in
//! place, so a stream has the same length and order before and after a run.

use crate::attrs::Attributes;
use std::fmt::Write;

/// `type` values that mark an inline `<script>` body as an HTML template.
const TEMPLATE_SCRIPT_TYPES: [&str; 3] = ["text/html", "text/template", "text/x-template"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// An opening (or self-closing) markup tag.
    TagStart(Tag),
    /// A `<script>` element: start tag, body, end tag.
    Script(Block),
    /// A `<style>` element.
    Style(Block),
    /// A CSS property name (`background`).
    Property(String),
    /// A CSS property value (`url(a.png) no-repeat`).
    Value(String),
    /// Anything else: text, comments, closing tags, selectors, punctuation.
    Raw(String),
}

impl Token {
    /// Append this token's textual payload to `out`.
    ///
    /// This is a best-effort rendering (tags are rebuilt from their
    /// attribute tables), not a substitute for the host's serializer.
    pub fn write_text(&self, out: &mut String) {
        match self {
            Self::TagStart(tag) => tag.write_text(out),
            Self::Script(block) | Self::Style(block) => block.write_text(out),
            Self::Property(text) | Self::Value(text) | Self::Raw(text) => out.push_str(text),
        }
    }
}

/// Concatenated textual payload of a token stream. See [`Token::write_text`].
pub fn tokens_text(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        token.write_text(&mut out);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Tag name as written in the source.
    pub name: String,
    /// `None` when the parser could not produce an attribute table.
    pub attrs: Option<Attributes>,
    pub self_closing: bool,
}

impl Tag {
    pub fn new(name: impl Into<String>, attrs: Attributes) -> Self {
        Self {
            name: name.into(),
            attrs: Some(attrs),
            self_closing: false,
        }
    }

    pub fn lower_name(&self) -> String {
        self.name.to_ascii_lowercase()
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.as_ref().and_then(|attrs| attrs.get(name))
    }

    /// A `<script>`/`<link>` that points at a file instead of carrying a body.
    pub fn is_external(&self) -> bool {
        self.attr("src").is_some_and(|src| !src.trim().is_empty())
    }

    /// A `<script>` whose body is markup rather than JavaScript.
    pub fn is_template(&self) -> bool {
        self.attr("type")
            .map(|kind| kind.trim().to_ascii_lowercase())
            .is_some_and(|kind| TEMPLATE_SCRIPT_TYPES.contains(&kind.as_str()))
    }

    fn write_text(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for attr in self.attrs.iter().flat_map(Attributes::iter) {
            // Writing into a String cannot fail.
            let _ = write!(out, " {attr}");
        }
        if self.self_closing {
            out.push_str(" /");
        }
        out.push('>');
    }
}

/// Body of a script or style element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Embedded {
    /// Body text. Written by the host, replaced with the rendered `tokens`
    /// once the rewriter has spliced them in.
    pub value: String,
    /// Parsed body, when the host (or the rewriter) has one. Takes
    /// precedence over `value` when writing.
    pub tokens: Option<Vec<Token>>,
}

impl Embedded {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            tokens: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub start: Tag,
    pub content: Embedded,
    /// Closing tag text, usually `</script>` or `</style>`.
    pub end: String,
}

impl Block {
    fn write_text(&self, out: &mut String) {
        self.start.write_text(out);
        match &self.content.tokens {
            Some(tokens) => tokens.iter().for_each(|token| token.write_text(out)),
            None => out.push_str(&self.content.value),
        }
        out.push_str(&self.end);
    }
}
