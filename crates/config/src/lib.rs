//! Run options for the reference rewriter.
//!
//! Options are layered with [`figment`]: an optional configuration file
//! (TOML, YAML or JSON, chosen by extension) and then `CDNIFY_`-prefixed
//! environment variables, with `__` separating nested keys
//! (`CDNIFY_TAG_ATTRS__VIDEO=poster`). Anything not set falls back to
//! [`Options::default`].
//!
//! Keys also accept their camel-case spellings (`tagAttrs`,
//! `notUpdateResource`), and unknown keys are kept in [`Options::extra`] so
//! resolution adapters can read their own settings from the same file.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Toml, Yaml};
use regex::{Regex, RegexSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "CDNIFY_";
const CONFIG_FILE_NAME: &str = "cdnify.toml";

/// One attribute name or a list of them, as written in `tag_attrs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrList {
    One(String),
    Many(Vec<String>),
}

impl AttrList {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let slice = match self {
            Self::One(attr) => std::slice::from_ref(attr),
            Self::Many(attrs) => attrs.as_slice(),
        };
        slice.iter().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Product name; selects the reference cache namespace.
    pub product: Option<String>,
    /// Consult and populate the reference cache.
    pub cache: bool,
    /// Persist the reference cache in a SQLite database at this path.
    #[serde(alias = "cachePath")]
    pub cache_path: Option<PathBuf>,
    /// Extra `tag -> attribute(s)` pairs to rewrite, on top of the built-in table.
    #[serde(alias = "tagAttrs")]
    pub tag_attrs: BTreeMap<String, AttrList>,
    /// `<link rel>` values besides `stylesheet` whose `href` is rewritten.
    pub rels: Vec<String>,
    /// Regular expressions; matching references are left untouched.
    pub exclude: Vec<String>,
    /// Resolve references but do not write rewritten scripts and stylesheets back.
    #[serde(alias = "notUpdateResource", alias = "suppress_rewrite", alias = "suppressRewrite")]
    pub not_update_resource: bool,
    /// Unrecognised keys, passed through to the resolution adapter.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            product: None,
            cache: true,
            cache_path: None,
            tag_attrs: BTreeMap::new(),
            rels: Vec::new(),
            exclude: Vec::new(),
            not_update_resource: false,
            extra: BTreeMap::new(),
        }
    }
}

impl Options {
    /// Load options from `path` (or the per-user default file, if it exists)
    /// and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let figment = match path {
            Some(path) => {
                if !path.is_file() {
                    exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
                }
                merge_file(Figment::new(), path)?
            },
            None => match default_config_path().filter(|p| p.is_file()) {
                Some(path) => {
                    tracing::debug!(path = %path.display(), "Using default configuration file");
                    merge_file(Figment::new(), &path)?
                },
                None => Figment::new(),
            },
        };
        Self::from_figment(&figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Extract and validate options from an already layered [`Figment`].
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let options: Self = figment.extract().or_raise(|| ErrorKind::Load)?;
        // Fail at load time rather than halfway through a build.
        options.exclude_set()?;
        Ok(options)
    }

    /// Compile [`exclude`](Self::exclude) into a matcher.
    pub fn exclude_set(&self) -> Result<ExcludeSet> {
        ExcludeSet::new(&self.exclude)
    }
}

/// Per-user configuration file location (e.g. `~/.config/cdnify/cdnify.toml`).
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "cdnify").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
    let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    Ok(match extension.as_deref() {
        Some("toml") => figment.merge(Toml::file(path)),
        Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
        Some("json") => figment.merge(Json::file(path)),
        _ => exn::bail!(ErrorKind::UnsupportedFormat(path.display().to_string())),
    })
}

/// Compiled exclusion patterns.
///
/// An empty set excludes nothing.
#[derive(Debug, Clone, Default)]
pub struct ExcludeSet(Option<RegexSet>);

impl ExcludeSet {
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(|p| p.as_ref().to_string()).collect();
        if patterns.is_empty() {
            return Ok(Self(None));
        }
        // Compile one by one first so the error names the offending pattern.
        for pattern in &patterns {
            Regex::new(pattern).or_raise(|| ErrorKind::InvalidPattern(pattern.clone()))?;
        }
        let set = RegexSet::new(&patterns).or_raise(|| ErrorKind::InvalidPattern(patterns.join(", ")))?;
        Ok(Self(Some(set)))
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.0.as_ref().is_some_and(|set| set.is_match(path))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;
    use std::ops::Deref;

    fn write(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let options = Options::default();
        assert!(options.cache);
        assert!(!options.not_update_resource);
        assert!(options.exclude_set().unwrap().is_empty());
        let extracted = Options::from_figment(&Figment::new()).unwrap();
        assert_eq!(extracted, options);
    }

    #[test]
    fn test_load_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "cdnify.toml",
            r#"
                product = "shop"
                cache = false
                rels = ["preload"]
                exclude = ["^/static/raw/"]
                not_update_resource = true
                bucket = "assets-eu"

                [tag_attrs]
                video = ["src", "poster"]
                div = "data-src"
            "#,
        );
        let options = Options::load(Some(path.as_path())).unwrap();
        assert_eq!(options.product.as_deref(), Some("shop"));
        assert!(!options.cache);
        assert!(options.not_update_resource);
        assert_eq!(options.rels, ["preload"]);
        assert_eq!(options.tag_attrs["video"].iter().collect::<Vec<_>>(), ["src", "poster"]);
        assert_eq!(options.tag_attrs["div"].iter().collect::<Vec<_>>(), ["data-src"]);
        assert_eq!(options.extra["bucket"], serde_json::json!("assets-eu"));
    }

    #[test]
    fn test_load_yaml_with_camel_case_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "cdnify.yaml",
            "tagAttrs:\n  img: data-original\nnotUpdateResource: true\ncachePath: /tmp/refs.sqlite\n",
        );
        let options = Options::load(Some(path.as_path())).unwrap();
        assert!(options.not_update_resource);
        assert_eq!(options.tag_attrs["img"], AttrList::One("data-original".to_string()));
        assert_eq!(options.cache_path.as_deref(), Some(Path::new("/tmp/refs.sqlite")));
    }

    #[test]
    fn test_load_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "cdnify.json", r#"{"product": "blog", "exclude": ["\\.svg$"]}"#);
        let options = Options::load(Some(path.as_path())).unwrap();
        assert_eq!(options.product.as_deref(), Some("blog"));
        assert!(options.exclude_set().unwrap().is_match("/img/logo.svg"));
    }

    #[rstest]
    #[case("cdnify.ini")]
    #[case("cdnify")]
    fn test_unsupported_format(#[case] name: &str) {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, name, "product = shop");
        let err = Options::load(Some(path.as_path())).unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::UnsupportedFormat(_)));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Options::load(Some(dir.path().join("nope.toml").as_path())).unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::NotFound(_)));
    }

    #[test]
    fn test_invalid_exclude_pattern_fails_load() {
        let figment = Figment::from(Toml::string(r#"exclude = ["^/ok/", "(unclosed"]"#));
        let err = Options::from_figment(&figment).unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::InvalidPattern(p) if p == "(unclosed"));
    }

    #[rstest]
    #[case("/static/raw/a.png", true)]
    #[case("/img/keep.gif", true)]
    #[case("/img/a.png", false)]
    #[case("", false)]
    fn test_exclude_set(#[case] path: &str, #[case] expected: bool) {
        let set = ExcludeSet::new(["^/static/raw/", r"keep\.gif$"]).unwrap();
        assert_eq!(set.is_match(path), expected);
    }

    #[test]
    fn test_empty_exclude_set_matches_nothing() {
        let set = ExcludeSet::new(Vec::<String>::new()).unwrap();
        assert!(set.is_empty());
        assert!(!set.is_match("/anything"));
    }
}
