//! Deciding whether a reference is spliced in, embedded as a data URL, or linked.

use std::sync::OnceLock;

use base64::{Engine as _, engine::general_purpose};
use regex::Regex;

use crate::builder::PackBuilder;
use crate::config::{InlinePolicy, UrlPostfix};
use crate::diagnostics::Warning;
use crate::graph::{Module, ModuleId};
use crate::resolve::Resolution;
use crate::store::{FileStore, extension_to_mime};

/// How a reference site may consume an inlined target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineMode {
  /// The site can take the target's text (`<script src>`, `@import`, ...).
  Content,
  /// The site needs a URL, but a `data:` URL is acceptable (`<img src>`, `url()`).
  DataUrl,
  /// The site always gets a plain URL (`<object data>`, non-stylesheet `<link>`).
  Never,
}

/// What a reference was turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
  /// Text to splice in place of the reference.
  Inline(String),
  /// URL to write back into the reference site.
  Url(String),
}

impl Reference {
  /// The URL, or the inlined text when the site cannot tell the difference.
  pub fn into_string(self) -> String {
    match self {
      Self::Inline(value) | Self::Url(value) => value,
    }
  }
}

fn inline_flag_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r"\b__inline\b(?:\s*=\s*(\d+))?").expect("invalid __inline regex")
  })
}

/// Inline policy requested by the `__inline` / `__inline=N` query flag, if present.
pub fn query_inline_policy(query: &str) -> Option<InlinePolicy> {
  let captures = inline_flag_pattern().captures(query)?;
  match captures.get(1) {
    Some(limit) => Some(
      limit
        .as_str()
        .parse()
        .map_or(InlinePolicy::Always, InlinePolicy::Below),
    ),
    None => Some(InlinePolicy::Always),
  }
}

fn policy_allows(policy: &InlinePolicy, url: &str, target: &Module) -> bool {
  match policy {
    InlinePolicy::Never => false,
    InlinePolicy::Always => true,
    InlinePolicy::Below(limit) => (target.size() as u64) < *limit,
    InlinePolicy::Predicate(predicate) => predicate(url, target.path()),
  }
}

/// `query` without its `__url` marker, which only asks for the reference to be resolved.
fn strip_url_marker(query: &str) -> String {
  let Some(separator) = query.chars().next() else {
    return String::new();
  };
  let kept: Vec<&str> = query[separator.len_utf8()..]
    .split('&')
    .filter(|param| !param.is_empty() && *param != "__url" && !param.starts_with("__url="))
    .collect();
  if kept.is_empty() {
    String::new()
  } else {
    format!("{separator}{}", kept.join("&"))
  }
}

/// Encode a module's current content as a `data:` URL.
pub fn data_url(module: &Module) -> String {
  if !module.kind.is_text() {
    return module.file.base64_url();
  }
  format!(
    "data:{};base64,{}",
    extension_to_mime(&module.file.extension),
    general_purpose::STANDARD.encode(module.content().as_bytes())
  )
}

impl<S: FileStore> PackBuilder<S> {
  /// Resolve a URL-like reference found in module `id` and apply the inline policy.
  ///
  /// Missing targets are reported and the reference is returned unchanged. Text targets
  /// inlined at a [`InlineMode::Content`] site are spliced through graph inclusion,
  /// falling back to a URL when that would create an include cycle.
  pub(crate) fn resolve_reference(&mut self, id: ModuleId, url: &str, mode: InlineMode) -> Reference {
    let (path, query) = match self.resolve(id, url, false) {
      Resolution::External => return Reference::Url(url.to_string()),
      Resolution::NotFound { .. } => {
        let module = self.graph.module(id).name().to_string();
        self.diagnostics.warn(Warning::ReferenceNotFound {
          module,
          specifier: url.to_string(),
        });
        return Reference::Url(url.to_string());
      }
      Resolution::Found { path, query } => (path, query),
    };

    let target = self.load_dependency(&path);
    if mode != InlineMode::Never && self.should_inline(url, target, &query) {
      let kind = self.graph.module(target).kind;
      if mode == InlineMode::Content && kind.is_text() {
        match self.include_module(id, target) {
          Some(content) => return Reference::Inline(content),
          None => {
            let module = self.graph.module(id).name().to_string();
            self.diagnostics.warn(Warning::CircularInclude {
              module,
              specifier: url.to_string(),
            });
          }
        }
      } else {
        return Reference::Url(data_url(self.graph.module(target)));
      }
    }

    Reference::Url(self.final_url(id, target, &query))
  }

  fn should_inline(&self, url: &str, target: ModuleId, query: &str) -> bool {
    let target = self.graph.module(target);
    match &self.options.inline {
      Some(policy) => policy_allows(policy, url, target),
      None => query_inline_policy(query)
        .is_some_and(|policy| policy_allows(&policy, url, target)),
    }
  }

  /// URL of `target` as seen from module `id`, with its query and cache-busting postfix.
  pub(crate) fn final_url(&self, id: ModuleId, target: ModuleId, query: &str) -> String {
    let from_dir = self.graph.module(id).file.dir();
    let file = &self.graph.module(target).file;
    let query = strip_url_marker(query);
    let query = query.as_str();
    let mut url = file.relative_url(from_dir);
    url.push_str(query);

    let token = match &self.options.url_postfix {
      Some(UrlPostfix::Template(template)) => template.clone(),
      Some(UrlPostfix::Computed(postfix)) => postfix(&format!("{}{}", file.name, query), &file.path),
      None => String::new(),
    };
    let token = file.format_name(&token);
    if !token.is_empty() {
      url.push(if query.is_empty() { '?' } else { '&' });
      url.push_str(&token);
    }
    url
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::PackOptions;
  use std::fs;
  use std::path::Path;
  use std::sync::Arc;
  use tempfile::tempdir;

  fn write_file(path: &Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
  }

  fn builder(root: &Path, options: PackOptions) -> PackBuilder {
    PackBuilder::new(PackOptions {
      root: root.to_path_buf(),
      ..options
    })
  }

  #[test]
  fn parses_query_inline_flags() {
    assert!(matches!(query_inline_policy("?__inline"), Some(InlinePolicy::Always)));
    assert!(matches!(query_inline_policy("?v=1&__inline=200"), Some(InlinePolicy::Below(200))));
    assert!(matches!(query_inline_policy("?__inline = 5"), Some(InlinePolicy::Below(5))));
    assert!(query_inline_policy("?__inlined").is_none());
    assert!(query_inline_policy("").is_none());
  }

  #[test]
  fn numeric_policy_inlines_only_small_targets() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_file(&root.join("index.html"), b"");
    write_file(&root.join("small.png"), &[7u8; 50]);
    write_file(&root.join("large.png"), &[7u8; 500]);

    let mut builder = builder(root, PackOptions::default().with_inline(InlinePolicy::Below(100)));
    let page = builder.load(&root.join("index.html")).unwrap();

    let small = builder.resolve_reference(page, "small.png", InlineMode::DataUrl);
    assert!(matches!(small, Reference::Url(ref url) if url.starts_with("data:image/png;base64,")));

    let large = builder.resolve_reference(page, "large.png", InlineMode::DataUrl);
    assert_eq!(large, Reference::Url("large.png".into()));
  }

  #[test]
  fn query_flag_controls_inlining_without_global_policy() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_file(&root.join("index.html"), b"");
    write_file(&root.join("style.css"), b"body { color: red; }");

    let mut builder = builder(root, PackOptions::default());
    let page = builder.load(&root.join("index.html")).unwrap();

    assert_eq!(
      builder.resolve_reference(page, "style.css?__inline", InlineMode::Content),
      Reference::Inline("body { color: red; }".into())
    );
    assert_eq!(
      builder.resolve_reference(page, "style.css?__inline=4", InlineMode::Content),
      Reference::Url("style.css?__inline=4".into())
    );
    assert_eq!(
      builder.resolve_reference(page, "style.css", InlineMode::Content),
      Reference::Url("style.css".into())
    );
  }

  #[test]
  fn never_mode_ignores_inline_policy() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_file(&root.join("index.html"), b"");
    write_file(&root.join("icon.png"), &[1u8; 4]);

    let mut builder = builder(root, PackOptions::default().with_inline(InlinePolicy::Always));
    let page = builder.load(&root.join("index.html")).unwrap();

    assert_eq!(
      builder.resolve_reference(page, "icon.png", InlineMode::Never),
      Reference::Url("icon.png".into())
    );
  }

  #[test]
  fn predicate_policy_receives_reference() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_file(&root.join("index.html"), b"");
    write_file(&root.join("a.png"), &[1u8; 4]);
    write_file(&root.join("b.png"), &[1u8; 4]);

    let options = PackOptions::default().with_inline(InlinePolicy::Predicate(Arc::new(
      |url: &str, _: &Path| url.starts_with("a"),
    )));
    let mut builder = builder(root, options);
    let page = builder.load(&root.join("index.html")).unwrap();

    assert!(builder.resolve_reference(page, "a.png", InlineMode::DataUrl).into_string().starts_with("data:"));
    assert_eq!(builder.resolve_reference(page, "b.png", InlineMode::DataUrl).into_string(), "b.png");
  }

  #[test]
  fn appends_url_postfix_with_matching_separator() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_file(&root.join("pages/index.html"), b"");
    write_file(&root.join("img/logo.png"), b"png");

    let options = PackOptions {
      url_postfix: Some(UrlPostfix::Template("v=<name>".into())),
      ..PackOptions::default()
    };
    let mut builder = builder(root, options);
    let page = builder.load(&root.join("pages/index.html")).unwrap();

    assert_eq!(
      builder.resolve_reference(page, "../img/logo.png", InlineMode::DataUrl).into_string(),
      "../img/logo.png?v=logo"
    );
    assert_eq!(
      builder.resolve_reference(page, "../img/logo.png?x=1", InlineMode::DataUrl).into_string(),
      "../img/logo.png?x=1&v=logo"
    );
  }

  #[test]
  fn url_marker_is_dropped_from_final_urls() {
    assert_eq!(strip_url_marker("?__url"), "");
    assert_eq!(strip_url_marker("?v=2&__url"), "?v=2");
    assert_eq!(strip_url_marker("&__url&v=2"), "&v=2");
    assert_eq!(strip_url_marker("?__urls=1"), "?__urls=1");
    assert_eq!(strip_url_marker(""), "");
  }

  #[test]
  fn missing_targets_warn_and_keep_reference() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_file(&root.join("index.html"), b"");

    let mut builder = builder(root, PackOptions::default());
    let page = builder.load(&root.join("index.html")).unwrap();

    assert_eq!(
      builder.resolve_reference(page, "gone.png", InlineMode::DataUrl),
      Reference::Url("gone.png".into())
    );
    assert!(matches!(
      builder.warnings(),
      [Warning::ReferenceNotFound { specifier, .. }] if specifier == "gone.png"
    ));
  }
}
