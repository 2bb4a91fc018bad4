//! Stylesheet scanning: `@import`, `url()` and comment directives.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use super::CommentStyle;
use crate::builder::PackBuilder;
use crate::graph::ModuleId;
use crate::inline::{InlineMode, Reference};
use crate::store::FileStore;

fn token_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(concat!(
      r"/\*(?P<comment>[\s\S]*?)(?:\*/|$)",
      r#"|(?P<import>@import\s+)?(?P<open>url\(\s*)(?:'(?P<single>[^'\r\n]*)'|"(?P<double>[^"\r\n]*)"|(?P<bare>[^)'"\s]*))(?P<close>\s*\))"#,
      r#"|@import\s+(?:'(?P<import_single>[^'\r\n]*)'|"(?P<import_double>[^"\r\n]*)")"#,
      r#"|'(?:[^\\'\r\n]|\\[\s\S])*'|"(?:[^\\"\r\n]|\\[\s\S])*""#,
    ))
    .expect("invalid stylesheet token regex")
  })
}

impl<S: FileStore> PackBuilder<S> {
  pub(crate) fn scan_css(&mut self, id: ModuleId) {
    self.graph.module_mut(id).flags.has_style_loader = true;
    let content = self.graph.module(id).content().into_owned();
    let content = token_pattern()
      .replace_all(&content, |captures: &Captures| self.rewrite_css_token(id, captures))
      .into_owned();
    let content = self.expand_url_directives(id, &content);
    self.graph.module_mut(id).set_content(content);
  }

  fn rewrite_css_token(&mut self, id: ModuleId, captures: &Captures<'_>) -> String {
    let all = &captures[0];

    if let Some(body) = captures.name("comment") {
      return self
        .expand_comment(id, body.as_str(), CommentStyle::Block)
        .unwrap_or_else(|| all.to_string());
    }
    if !self.options.resolve_css_url {
      return all.to_string();
    }

    let quoted_url = captures
      .name("single")
      .map(|url| ('\'', url))
      .or_else(|| captures.name("double").map(|url| ('"', url)));
    let bare_url = captures.name("bare");
    if let Some(url) = quoted_url.map(|(_, url)| url).or(bare_url) {
      let url = url.as_str().trim();
      if url.is_empty() {
        return all.to_string();
      }
      let quote = quoted_url.map(|(quote, _)| quote.to_string()).unwrap_or_default();
      let import = captures.name("import").map_or("", |import| import.as_str());

      let mode = if import.is_empty() {
        InlineMode::DataUrl
      } else {
        InlineMode::Content
      };
      return match self.resolve_reference(id, url, mode) {
        Reference::Inline(content) => content,
        Reference::Url(url) => format!(
          "{import}{}{quote}{url}{quote}{}",
          &captures["open"], &captures["close"]
        ),
      };
    }

    let imported = captures
      .name("import_single")
      .map(|url| ('\'', url))
      .or_else(|| captures.name("import_double").map(|url| ('"', url)));
    if let Some((quote, url)) = imported {
      let url = url.as_str().trim();
      if url.is_empty() {
        return all.to_string();
      }
      return match self.resolve_reference(id, url, InlineMode::Content) {
        Reference::Inline(content) => content,
        Reference::Url(url) => format!("@import {quote}{url}{quote}"),
      };
    }

    all.to_string()
  }
}
