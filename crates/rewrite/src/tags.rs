use crate::consts::DEFAULT_TAG_ATTRS;
use cdnify_config::AttrList;
use std::collections::{BTreeMap, HashMap};

/// Merged `tag -> resource attributes` table: the built-in defaults plus
/// whatever the run options add. Tag names are lower-cased; an attribute
/// listed by both sources is only visited once.
#[derive(Debug, Clone, Default)]
pub(crate) struct TagAttrs(HashMap<String, Vec<String>>);

impl TagAttrs {
    pub(crate) fn new(extra: &BTreeMap<String, AttrList>) -> Self {
        let mut table = Self::default();
        for (tag, attrs) in DEFAULT_TAG_ATTRS {
            table.extend(tag, attrs.iter().copied());
        }
        for (tag, attrs) in extra {
            table.extend(tag, attrs.iter());
        }
        table
    }

    fn extend<'a>(&mut self, tag: &str, attrs: impl Iterator<Item = &'a str>) {
        let entry = self.0.entry(tag.trim().to_ascii_lowercase()).or_default();
        for attr in attrs.map(str::trim).filter(|a| !a.is_empty()) {
            if !entry.iter().any(|known| known.eq_ignore_ascii_case(attr)) {
                entry.push(attr.to_string());
            }
        }
    }

    /// Attributes to inspect on `tag` (already lower-cased).
    pub(crate) fn get(&self, tag: &str) -> &[String] {
        self.0.get(tag).map(Vec::as_slice).unwrap_or_default()
    }
}
