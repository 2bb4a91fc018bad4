//! Per-kind scanners that discover references and rewrite module content.
//!
//! Each scanner runs once per module, right after the module is registered. Scanning
//! may load further modules, which are scanned before the current one finishes.

mod attributes;
mod css;
mod directives;
mod html;
mod js;

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::builder::PackBuilder;
use crate::graph::{ModuleId, ModuleKind};
use crate::inline::InlineMode;
use crate::store::FileStore;

pub use attributes::{encode_attribute, get_attr, remove_attr, set_attr};
pub(crate) use directives::CommentStyle;

fn url_directive_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r#"([^\s'",=()\[\]{}<>]*)[?&]__url\b"#).expect("invalid __url regex")
  })
}

/// Strip one pair of matching single or double quotes.
pub(crate) fn unquote(value: &str) -> &str {
  let value = value.trim();
  for quote in ['"', '\''] {
    if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
      return &value[1..value.len() - 1];
    }
  }
  value
}

impl<S: FileStore> PackBuilder<S> {
  /// Scan module `id` according to its kind, storing the rewritten content.
  pub(crate) fn scan(&mut self, id: ModuleId) {
    match self.graph.module(id).kind {
      ModuleKind::Html => self.scan_html(id),
      ModuleKind::Js => self.scan_js(id),
      ModuleKind::Css => self.scan_css(id),
      ModuleKind::Text => self.scan_text(id),
      ModuleKind::Resource => {}
    }
  }

  fn scan_text(&mut self, id: ModuleId) {
    let content = self.graph.module(id).content().into_owned();
    let content = self.expand_url_directives(id, &content);
    self.graph.module_mut(id).set_content(content);
  }

  /// Replace every `path?__url` marker with the final URL of `path`.
  pub(crate) fn expand_url_directives(&mut self, id: ModuleId, content: &str) -> String {
    if !self.options.resolve_urls || !content.contains("__url") {
      return content.to_string();
    }
    url_directive_pattern()
      .replace_all(content, |captures: &Captures| {
        let url = &captures[1];
        if url.is_empty() {
          return captures[0].to_string();
        }
        self.resolve_reference(id, url, InlineMode::DataUrl).into_string()
      })
      .into_owned()
  }
}
