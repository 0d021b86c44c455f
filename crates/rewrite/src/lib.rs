//! Resource reference discovery, resolution and rewriting.
//!
//! Given a [`Document`](cdnify_document::Document) from a host build
//! pipeline, a [`Rewriter`] finds every reference to another resource
//! (HTML tag attributes, CSS `url(...)` and `src=` values, JavaScript
//! `{cdn: "..."}.cdn` literals), resolves each one to a final URL, and
//! returns the document with those references replaced.
//!
//! Resolving a reference means running the same pipeline on the referenced
//! document first, so a stylesheet's URL is computed from its *rewritten*
//! bytes. Leaves (images, fonts, ...) are handed to an [`Adapter`], which
//! decides the URL; results are cached by content hash.
//!
//! The rewriter never parses, loads, or writes files itself. Those are the
//! [`Host`]'s job.

mod adapter;
mod batch;
mod consts;
mod css;
pub mod error;
mod host;
mod html;
mod js;
mod memo;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod registry;
mod result;
mod rewriter;
mod scope;
mod tags;
mod url;

pub use crate::adapter::{Adapter, AdapterHandle};
pub use crate::batch::RunEvent;
pub use crate::host::{Host, HostHandle};
#[cfg(any(test, feature = "mock"))]
pub use crate::mock::{MockAdapter, MockHost};
pub use crate::registry::SyntheticRegistry;
pub use crate::result::RewriteResult;
pub use crate::rewriter::Rewriter;
