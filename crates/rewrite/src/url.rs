//! Classification of reference strings.

use crate::consts::{EXTENSION_REGEX, REMOTE_REGEX, TEMPLATE_SYNTAX_REGEX};

/// Absolute or protocol-relative URL; never resolved.
pub(crate) fn is_remote(reference: &str) -> bool {
    REMOTE_REGEX.is_match(reference.trim_start())
}

/// Extension of the last path segment including the dot, or `""`.
///
/// Everything after the last dot counts, query string included, so
/// `a.png?v=1` has the extension `.png?v=1`. Dotfiles have no extension.
pub(crate) fn extname(reference: &str) -> &str {
    let base = match reference.rfind('/') {
        Some(index) => &reference[index + 1..],
        None => reference,
    };
    match base.rfind('.') {
        Some(0) | None => "",
        Some(index) => &base[index..],
    }
}

/// A reference that plainly names a local file: a simple extension and no
/// template placeholders.
pub(crate) fn is_plain_file(reference: &str) -> bool {
    EXTENSION_REGEX.is_match(extname(reference)) && !TEMPLATE_SYNTAX_REGEX.is_match(reference)
}
