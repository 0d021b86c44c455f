use regex::Regex;
use std::sync::LazyLock;

/// Maximum number of documents rewritten concurrently by [`run_all`](crate::Rewriter::run_all).
pub(crate) const MAX_PROCESS_CONCURRENCY: usize = 64;
/// Maximum nesting of documents resolving other documents.
pub(crate) const MAX_REFERENCE_DEPTH: usize = 32;

/// Built-in `tag -> attributes` table of resource-bearing attributes.
pub(crate) const DEFAULT_TAG_ATTRS: &[(&str, &[&str])] = &[
    ("audio", &["src"]),
    ("embed", &["src"]),
    ("img", &["src", "srcset"]),
    ("input", &["src"]),
    ("link", &["href"]),
    ("object", &["data"]),
    ("script", &["src"]),
    ("source", &["src", "srcset"]),
    ("track", &["src"]),
    ("video", &["src", "poster"]),
];

const RASTER_EXTENSIONS: &str = "png|jpe?g|gif|ico|cur|webp";
const FONT_EXTENSIONS: &str = "eot|woff2?|ttf|svg";

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

/// `url(...)` with a path and optional `?query`/`#fragment` suffix, in three
/// quoting styles. Capture groups are laid out in pairs (path, suffix):
/// 1-2 double-quoted, 3-4 single-quoted, 5-6 unquoted.
fn css_url(extensions: &str) -> String {
    format!(
        r#"(?i)url\s*\(\s*(?:"([^"?#]+\.(?:{extensions}))([?#][^"]*)?"|'([^'?#]+\.(?:{extensions}))([?#][^']*)?'|([^\s"'()?#]+\.(?:{extensions}))([?#][^\s"'()]*)?)\s*\)"#
    )
}

// Raster images referenced by any property other than `filter` and `src`.
regex!(BACKGROUND_REGEX, &css_url(RASTER_EXTENSIONS));
// Fonts referenced by `@font-face { src: ... }`.
regex!(FONT_REGEX, &css_url(FONT_EXTENSIONS));
// `src=` inside legacy `progid:` filters. Same group layout as `css_url`.
regex!(
    FILTER_REGEX,
    &format!(
        r#"(?i)src\s*=\s*(?:"([^"?#]+\.(?:{RASTER_EXTENSIONS}))([?#][^"]*)?"|'([^'?#]+\.(?:{RASTER_EXTENSIONS}))([?#][^']*)?'|([^\s"',()?#]+\.(?:{RASTER_EXTENSIONS}))([?#][^\s"',()]*)?)"#
    )
);
// `{cdn: "path"}.cdn` pseudo-literals in JavaScript. Group 1 double-quoted, group 2 single-quoted.
regex!(CDN_REGEX, r#"\{\s*(?:cdn|"cdn"|'cdn')\s*:\s*(?:"([^"]+)"|'([^']+)')\s*\}\s*\.\s*cdn\b"#);
// Absolute URLs: any scheme (`https:`, `data:`, ...) or protocol-relative.
regex!(REMOTE_REGEX, r"^(?:[a-zA-Z][a-zA-Z0-9+.\-]*:|//)");
regex!(EXTENSION_REGEX, r"^\.\w+$");
// Template placeholders of the common engines; such values are resolved at render time.
regex!(TEMPLATE_SYNTAX_REGEX, r"\{\{|\{%|<%|<\?|\$\{");
