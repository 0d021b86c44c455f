use cdnify_document::Token;

/// Outcome of rewriting one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteResult {
    /// An opaque asset and its final URL.
    Other { url: String },
    /// Rewritten script text and the URL of that text.
    Script { url: String, content: String },
    /// Rewritten stylesheet tokens and the URL of the published stylesheet.
    Stylesheet { url: String, ast: Vec<Token> },
    /// Rewritten markup tokens. Markup has no URL of its own.
    Markup { ast: Vec<Token> },
}

impl RewriteResult {
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Other { url } | Self::Script { url, .. } | Self::Stylesheet { url, .. } => Some(url),
            Self::Markup { .. } => None,
        }
    }

    pub fn into_ast(self) -> Option<Vec<Token>> {
        match self {
            Self::Stylesheet { ast, .. } | Self::Markup { ast } => Some(ast),
            Self::Other { .. } | Self::Script { .. } => None,
        }
    }
}
