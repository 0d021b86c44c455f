use crate::consts::MAX_REFERENCE_DEPTH;
use crate::error::{ErrorKind, Result};
use cdnify_document::Document;

/// Where in the reference graph a document is being rewritten.
///
/// Carries the chain of ancestor paths (to refuse cycles) and the path that
/// relative references are resolved against. Synthetic documents inherit
/// their parent's referrer, since an inline `<style>` block's `url(img.png)`
/// is relative to the page, not to the block.
#[derive(Debug, Clone, Default)]
pub(crate) struct Scope {
    trail: Vec<String>,
    referrer: String,
}

impl Scope {
    pub(crate) fn enter(&self, document: &Document) -> Result<Self> {
        if self.trail.len() >= MAX_REFERENCE_DEPTH || self.contains(&document.path) {
            exn::bail!(ErrorKind::Cycle(document.path.clone()));
        }
        let mut trail = self.trail.clone();
        trail.push(document.path.clone());
        let referrer = if document.flags.is_virtual && !self.referrer.is_empty() {
            self.referrer.clone()
        } else {
            document.path.clone()
        };
        Ok(Self { trail, referrer })
    }

    pub(crate) fn contains(&self, path: &str) -> bool {
        self.trail.iter().any(|ancestor| ancestor == path)
    }

    pub(crate) fn referrer(&self) -> &str {
        &self.referrer
    }
}
