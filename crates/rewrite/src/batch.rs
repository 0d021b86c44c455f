use crate::Rewriter;
use crate::consts::MAX_PROCESS_CONCURRENCY;
use crate::error::Result;
use async_stream::stream;
use cdnify_document::Document;
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt};
use std::collections::VecDeque;

/// Progress events emitted by [`Rewriter::run_all`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started), exactly once.
/// 2. [`DiscoveryComplete`](Self::DiscoveryComplete), exactly once, with the
///    number of documents queued.
/// 3. [`Rewritten`](Self::Rewritten), once per document that succeeded. A
///    document that failed yields an `Err` item instead.
/// 4. [`Complete`](Self::Complete), exactly once.
#[derive(Debug)]
pub enum RunEvent {
    Started,
    DiscoveryComplete(u64),
    /// A document has been rewritten and updated in place.
    Rewritten {
        document: Box<Document>,
        /// The document's own final URL; `None` for markup.
        url: Option<String>,
    },
    Complete,
}

impl Rewriter {
    /// Rewrite and update a batch of top-level documents, streaming progress.
    ///
    /// Documents are processed concurrently, up to `MAX_PROCESS_CONCURRENCY`
    /// (64) at a time, and share this rewriter's memo tables so a resource
    /// referenced by several of them is resolved once. A failing document
    /// is reported as an `Err` item and does not stop the others.
    pub fn run_all<'a>(&'a self, documents: Vec<Document>) -> impl Stream<Item = Result<RunEvent>> + 'a {
        // `rustfmt` skips brace-delimited macro bodies; parentheses keep it formatting.
        stream!({
            yield Ok(RunEvent::Started);
            yield Ok(RunEvent::DiscoveryComplete(u64::try_from(documents.len()).unwrap_or(u64::MAX)));

            let mut queued: VecDeque<_> = documents.into_iter().map(|document| self.process(document)).collect();
            let mut processing = FuturesUnordered::new();
            processing.extend(queued.drain(..MAX_PROCESS_CONCURRENCY.min(queued.len())));
            while let Some(result) = processing.next().await {
                yield result;
                if let Some(next) = queued.pop_front() {
                    processing.push(next);
                }
            }

            yield Ok(RunEvent::Complete);
        })
    }

    async fn process(&self, mut document: Document) -> Result<RunEvent> {
        let result = self.run(&document).await?;
        let url = result.url().map(str::to_string);
        self.update(&mut document, result);
        tracing::info!(path = %document.path, url = url.as_deref().unwrap_or("-"), "Rewrote document");
        Ok(RunEvent::Rewritten {
            document: Box::new(document),
            url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockAdapter, MockHost, rewriter};
    use cdnify_config::Options;
    use cdnify_document::{Content, Tag, Token};

    fn asset(path: &str) -> Document {
        Document::from_path(path, Content::Bytes(format!("bytes of {path}").into_bytes()))
    }

    fn page(path: &str, src: &str) -> Document {
        let img = Token::TagStart(Tag::new("img", [("src", src)].into_iter().collect()));
        Document::from_path(path, Content::Tokens(vec![img]))
    }

    #[tokio::test]
    async fn test_run_all_event_order() {
        let host = MockHost::with_documents([asset("/a.png")]);
        let adapter = MockAdapter::with_urls([("/a.png", "https://cdn.test/a.png")]);
        let options = Options {
            cache: false,
            ..Options::default()
        };
        let (rewriter, _, adapter) = rewriter(host, adapter, options);
        let pages = (0..3).map(|i| page(&format!("/{i}.html"), "/a.png")).collect();
        let events: Vec<_> = rewriter.run_all(pages).collect().await;

        assert_eq!(events.len(), 6);
        assert!(matches!(events[0], Ok(RunEvent::Started)));
        assert!(matches!(events[1], Ok(RunEvent::DiscoveryComplete(3))));
        for event in &events[2..5] {
            let Ok(RunEvent::Rewritten { document, url }) = event else {
                panic!("expected a rewritten document");
            };
            assert_eq!(*url, None);
            let Some([Token::TagStart(tag)]) = document.content.tokens() else {
                panic!("expected one tag");
            };
            assert_eq!(tag.attrs.as_ref().and_then(|a| a.get("src")), Some("https://cdn.test/a.png"));
        }
        assert!(matches!(events[5], Ok(RunEvent::Complete)));
        // Shared across the batch.
        assert_eq!(adapter.calls(), 1);
    }

    #[tokio::test]
    async fn test_run_all_reports_failures_and_continues() {
        let host = MockHost::with_documents([asset("/a.png")]);
        let (rewriter, _, _) = rewriter(host, MockAdapter::default(), Options::default());
        let pages = vec![page("/ok.html", "/a.png"), page("/broken.html", "/missing.png")];
        let events: Vec<_> = rewriter.run_all(pages).collect().await;

        assert_eq!(events.len(), 5);
        assert_eq!(events.iter().filter(|event| event.is_err()).count(), 1);
        assert!(matches!(events.last(), Some(Ok(RunEvent::Complete))));
    }

    #[tokio::test]
    async fn test_run_all_empty_batch() {
        let (rewriter, _, _) = rewriter(MockHost::default(), MockAdapter::default(), Options::default());
        let events: Vec<_> = rewriter.run_all(Vec::new()).collect().await;
        assert_eq!(events.len(), 3);
        assert!(matches!(events[1], Ok(RunEvent::DiscoveryComplete(0))));
    }
}
