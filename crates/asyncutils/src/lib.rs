//! Async-aware regex substitution.
//!
//! [`Regex::replace_all`] wants a synchronous replacer, but resolving a
//! reference means awaiting something (a child document, an adapter, a
//! cache). Instead of threading a counter through the replacer and
//! patching the string afterwards, [`replace_all`] does it in three passes:
//!
//! 1. collect every match span (and ask the replacer for its future) eagerly,
//! 2. await all replacement futures concurrently,
//! 3. splice the results back into the haystack in a single ordered pass.
//!
//! Every match is resolved exactly once, and the output keeps all unmatched
//! text byte-for-byte.

use futures::future::try_join_all;
use regex::{Captures, Regex};
use std::future::Future;
use std::ops::Range;

/// Replace every match of `regex` in `haystack` with the output of an async
/// `replacer`.
///
/// All replacement futures run concurrently. If any of them fails, the
/// first error is returned and the remaining futures are dropped.
///
/// The replacer receives the match's [`Captures`] but cannot hold on to
/// them: copy whatever the future needs before returning it.
///
/// # Examples
///
/// ```
/// use regex::Regex;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let re = Regex::new(r"\d+").unwrap();
/// let out = cdnify_asyncutils::replace_all(&re, "a1b22", |caps| {
///     let n: u32 = caps[0].parse().unwrap();
///     async move { Ok::<_, std::convert::Infallible>((n * 2).to_string()) }
/// })
/// .await
/// .unwrap();
/// assert_eq!(out, "a2b44");
/// # }
/// ```
pub async fn replace_all<F, Fut, E>(regex: &Regex, haystack: &str, mut replacer: F) -> Result<String, E>
where
    F: FnMut(&Captures<'_>) -> Fut,
    Fut: Future<Output = Result<String, E>>,
{
    let mut spans = Vec::new();
    let mut pending = Vec::new();
    for caps in regex.captures_iter(haystack) {
        // Group 0 always participates in a match.
        let Some(whole) = caps.get(0) else {
            continue;
        };
        spans.push(whole.range());
        pending.push(replacer(&caps));
    }
    if pending.is_empty() {
        return Ok(haystack.to_string());
    }
    let replacements = try_join_all(pending).await?;
    Ok(splice(haystack, spans.into_iter().zip(replacements)))
}

/// Rebuild `haystack` with each byte range replaced by its paired string.
///
/// Ranges must be ascending and non-overlapping (as produced by
/// [`Regex::captures_iter`]); out-of-order or overlapping ranges are skipped
/// rather than corrupting the output.
pub fn splice(haystack: &str, replacements: impl IntoIterator<Item = (Range<usize>, String)>) -> String {
    let mut out = String::with_capacity(haystack.len());
    let mut cursor = 0;
    for (range, replacement) in replacements {
        if range.start < cursor || range.end > haystack.len() {
            continue;
        }
        out.push_str(&haystack[cursor..range.start]);
        out.push_str(&replacement);
        cursor = range.end;
    }
    out.push_str(&haystack[cursor..]);
    out
}
