//! Packer options and the JSON configuration file they can be loaded from.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::graph::BuildType;

const DEFAULT_CONFIG_FILE: &str = "pack.config.json";

/// Callback deciding whether a reference (`url`, target file) is inlined.
pub type InlinePredicate = Arc<dyn Fn(&str, &Path) -> bool + Send + Sync>;

/// Callback computing a cache-busting postfix from (`name?query`, target file).
pub type PostfixFn = Arc<dyn Fn(&str, &Path) -> String + Send + Sync>;

/// Hook allowed to rewrite a specifier before resolution.
///
/// Receives the specifier, the referencing file and whether the reference is a
/// `require()`. Returning `None` keeps the specifier unchanged.
pub type Importer = Arc<dyn Fn(&str, &Path, bool) -> Option<String> + Send + Sync>;

/// Global inlining policy. When unset, the `__inline` query flag decides.
#[derive(Clone, Deserialize)]
#[serde(from = "InlineSetting")]
pub enum InlinePolicy {
  /// Never inline, regardless of query flags.
  Never,
  /// Always inline every eligible reference.
  Always,
  /// Inline targets strictly smaller than the given number of bytes.
  Below(u64),
  /// Inline whenever the predicate returns `true`.
  Predicate(InlinePredicate),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InlineSetting {
  Flag(bool),
  Limit(u64),
}

impl From<InlineSetting> for InlinePolicy {
  fn from(setting: InlineSetting) -> Self {
    match setting {
      InlineSetting::Flag(true) => Self::Always,
      InlineSetting::Flag(false) => Self::Never,
      InlineSetting::Limit(limit) => Self::Below(limit),
    }
  }
}

impl fmt::Debug for InlinePolicy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Never => f.write_str("Never"),
      Self::Always => f.write_str("Always"),
      Self::Below(limit) => f.debug_tuple("Below").field(limit).finish(),
      Self::Predicate(_) => f.write_str("Predicate(..)"),
    }
  }
}

/// Token appended to emitted URLs, usually to bust caches.
#[derive(Clone, Deserialize)]
#[serde(from = "String")]
pub enum UrlPostfix {
  /// Template expanded with the target file's `<name>`, `<ext>` and `<hash>`.
  Template(String),
  /// Callback whose result is expanded the same way as a template.
  Computed(PostfixFn),
}

impl From<String> for UrlPostfix {
  fn from(template: String) -> Self {
    Self::Template(template)
  }
}

impl fmt::Debug for UrlPostfix {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Template(template) => f.debug_tuple("Template").field(template).finish(),
      Self::Computed(_) => f.write_str("Computed(..)"),
    }
  }
}

/// Options recognised by the resolver, scanners and packer.
#[derive(Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PackOptions {
  /// Project root. Module names are relative to it and `paths` are resolved against it.
  pub root: PathBuf,
  /// Parse `#include`, `#exclude` and `#moduletype` inside comments.
  pub resolve_comments: bool,
  /// Rewrite synchronous `require("x")` calls.
  pub resolve_common_js_requires: bool,
  /// Rewrite array-form `require([...], fn)` calls.
  pub resolve_async_requires: bool,
  /// Flag modules touching `exports.` or `module.` as CommonJS.
  pub resolve_common_js_exports: bool,
  /// Expand `?__url` query directives.
  pub resolve_urls: bool,
  /// Rewrite `url()` and `@import` in stylesheets.
  pub resolve_css_url: bool,
  /// Map Node core modules through `native_modules` and flag Node globals.
  pub resolve_node_native_modules: bool,
  /// Search ancestor `node_modules` directories for bare `require()` specifiers.
  pub search_node_modules: bool,
  /// Extra search roots for bare specifiers, in priority order.
  pub paths: Vec<PathBuf>,
  /// Extensions tried, in order, when a candidate path does not exist as written.
  pub extensions: Vec<String>,
  /// Inlining policy; `None` defers to the `__inline` query flag.
  pub inline: Option<InlinePolicy>,
  /// Cache-busting token appended to emitted URLs.
  pub url_postfix: Option<UrlPostfix>,
  /// Wrapper format assigned to JavaScript modules before any `#moduletype`.
  pub build_type: BuildType,
  /// Browser implementations of Node core modules, keyed by module name.
  pub native_modules: BTreeMap<String, PathBuf>,
  /// Specifier rewriting hook.
  #[serde(skip)]
  pub importer: Option<Importer>,
}

impl Default for PackOptions {
  fn default() -> Self {
    Self {
      root: PathBuf::from("."),
      resolve_comments: true,
      resolve_common_js_requires: true,
      resolve_async_requires: true,
      resolve_common_js_exports: true,
      resolve_urls: true,
      resolve_css_url: true,
      resolve_node_native_modules: true,
      search_node_modules: true,
      paths: Vec::new(),
      extensions: Vec::new(),
      inline: None,
      url_postfix: None,
      build_type: BuildType::Module,
      native_modules: BTreeMap::new(),
      importer: None,
    }
  }
}

impl fmt::Debug for PackOptions {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PackOptions")
      .field("root", &self.root)
      .field("resolve_comments", &self.resolve_comments)
      .field("resolve_common_js_requires", &self.resolve_common_js_requires)
      .field("resolve_async_requires", &self.resolve_async_requires)
      .field("resolve_common_js_exports", &self.resolve_common_js_exports)
      .field("resolve_urls", &self.resolve_urls)
      .field("resolve_css_url", &self.resolve_css_url)
      .field("resolve_node_native_modules", &self.resolve_node_native_modules)
      .field("search_node_modules", &self.search_node_modules)
      .field("paths", &self.paths)
      .field("extensions", &self.extensions)
      .field("inline", &self.inline)
      .field("url_postfix", &self.url_postfix)
      .field("build_type", &self.build_type)
      .field("native_modules", &self.native_modules)
      .field("importer", &self.importer.is_some())
      .finish()
  }
}

impl PackOptions {
  /// Load options from `pack.config.json` inside `dir`.
  ///
  /// A missing or unparsable file yields the defaults so a bare project still builds.
  /// A relative `root` in the file is taken relative to `dir`.
  pub fn discover(dir: &Path) -> Self {
    let candidate = dir.join(DEFAULT_CONFIG_FILE);
    match Self::from_path(&candidate) {
      Ok(options) => options,
      Err(err) => {
        if candidate.exists() {
          log::warn!("ignoring {}: {err:#}", candidate.display());
        }
        Self {
          root: dir.to_path_buf(),
          ..Self::default()
        }
      }
    }
  }

  /// Read options from a specific JSON file.
  pub fn from_path(path: &Path) -> Result<Self> {
    let content =
      fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let mut options: Self = serde_json::from_str(&content)
      .with_context(|| format!("failed to parse {}", path.display()))?;
    if options.root.is_relative() {
      let base = path.parent().unwrap_or(Path::new("."));
      options.root = base.join(&options.root);
    }
    Ok(options)
  }

  /// Builder-style setter for the inline policy.
  pub fn with_inline(mut self, inline: InlinePolicy) -> Self {
    self.inline = Some(inline);
    self
  }

  /// Builder-style setter for the specifier rewriting hook.
  pub fn with_importer(
    mut self,
    importer: impl Fn(&str, &Path, bool) -> Option<String> + Send + Sync + 'static,
  ) -> Self {
    self.importer = Some(Arc::new(importer));
    self
  }
}
