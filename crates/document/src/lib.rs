//! Documents as seen by the reference rewriter.
//!
//! A [`Document`] is one node of the host pipeline's file graph: a path, a
//! [`DocumentKind`], its content (raw bytes, text, or an already parsed
//! token stream) and a handful of [`Flags`]. Tokens are produced by the
//! host's parser; this crate only models them, it never parses.
//!
//! Documents are addressed by path, but anything cached about their
//! *content* is addressed by [`content_hash`].

mod attrs;
mod token;

pub use crate::attrs::{Attribute, Attributes, Quote};
pub use crate::token::{Block, Embedded, Tag, Token, tokens_text};
use std::borrow::Cow;
use std::path::Path;

/// Closed set of document kinds; every consumer dispatches on this exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// HTML and HTML-like templates.
    Markup,
    Script,
    Stylesheet,
    /// Binary or otherwise opaque assets (images, fonts, ...).
    Other,
}

impl DocumentKind {
    /// Guess the kind from a path's extension (case-insensitive).
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let extension = path.as_ref().extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("html" | "htm" | "tpl") => Self::Markup,
            Some("js" | "mjs") => Self::Script,
            Some("css") => Self::Stylesheet,
            _ => Self::Other,
        }
    }
}

/// Document payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Bytes(Vec<u8>),
    Text(String),
    Tokens(Vec<Token>),
}

impl Content {
    /// Parsed tokens, if the document has been parsed.
    pub fn tokens(&self) -> Option<&[Token]> {
        match self {
            Self::Tokens(tokens) => Some(tokens),
            _ => None,
        }
    }

    /// Raw bytes, if the content has not been tokenized.
    pub fn raw(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            Self::Text(text) => Some(text.as_bytes()),
            Self::Tokens(_) => None,
        }
    }

    /// Raw content as text, replacing invalid UTF-8 sequences.
    pub fn text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Bytes(bytes) => Some(String::from_utf8_lossy(bytes)),
            Self::Text(text) => Some(Cow::Borrowed(text)),
            Self::Tokens(_) => None,
        }
    }
}

/// Per-document processing flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    /// No physical artifact is ever emitted for this document.
    pub is_virtual: bool,
    /// Resolve references, but leave the document's emitted content untouched.
    pub suppress_rewrite: bool,
    /// Markup embedded in another document (e.g. an inline HTML template).
    pub is_template_fragment: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: String,
    pub kind: DocumentKind,
    pub content: Content,
    pub flags: Flags,
}

impl Document {
    pub fn new(path: impl Into<String>, kind: DocumentKind, content: Content) -> Self {
        Self {
            path: path.into(),
            kind,
            content,
            flags: Flags::default(),
        }
    }

    /// Create a document, guessing its kind from the path.
    pub fn from_path(path: impl Into<String>, content: Content) -> Self {
        let path = path.into();
        let kind = DocumentKind::from_path(&path);
        Self::new(path, kind, content)
    }

    pub fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    /// A copy of this document carrying different content. Used to hand a
    /// rewritten (or pristine) token stream to the host's serializer without
    /// touching the original.
    pub fn with_content(&self, content: Content) -> Self {
        Self {
            path: self.path.clone(),
            kind: self.kind,
            content,
            flags: self.flags,
        }
    }
}

/// Hex-encoded BLAKE3 hash of `bytes`.
pub fn content_hash(bytes: impl AsRef<[u8]>) -> String {
    blake3::hash(bytes.as_ref()).to_string()
}

/// Path of a synthetic document derived from inline content.
///
/// Identical content always maps to the same path, so the host creates one
/// child file per distinct inline block no matter how often it appears.
pub fn synthetic_path(content: &str, extension: &str) -> String {
    format!("{}.{extension}", content_hash(content))
}
