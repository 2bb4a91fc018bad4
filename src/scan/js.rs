//! JavaScript scanning: `require()` calls, comment directives and Node globals.

use std::sync::OnceLock;

use regex::{Captures, Match, Regex};

use super::{CommentStyle, unquote};
use crate::builder::PackBuilder;
use crate::diagnostics::Warning;
use crate::graph::ModuleId;
use crate::pack::js_string;
use crate::resolve::Resolution;
use crate::store::FileStore;

// Strings, template literals and comments come first so that anything inside them is
// consumed before the require and symbol alternatives get a chance to match.
fn token_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(concat!(
      r#"'(?:[^\\'\r\n]|\\[\s\S])*'"#,
      r#"|"(?:[^\\"\r\n]|\\[\s\S])*""#,
      r"|`(?:[^\\`]|\\[\s\S])*`",
      r"|//(?P<line>[^\r\n]*)",
      r"|/\*(?P<block>[\s\S]*?)(?:\*/|$)",
      r#"|\brequire\s*\(\s*(?P<sync>'(?:[^\\'\r\n]|\\[\s\S])*'|"(?:[^\\"\r\n]|\\[\s\S])*")\s*\)"#,
      r"|\brequire\s*\(\s*(?P<async>\[[^\]]*\])",
      r"|\b(?P<symbol>exports\.|module\.|process\.|global\.|Buffer\b|setImmediate\b|clearImmediate\b)",
    ))
    .expect("invalid JavaScript token regex")
  })
}

fn string_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r#"'(?:[^\\'\r\n]|\\[\s\S])*'|"(?:[^\\"\r\n]|\\[\s\S])*""#)
      .expect("invalid string literal regex")
  })
}

/// Replace the `part` of the whole match in `captures` with `replacement`.
fn splice(captures: &Captures<'_>, part: Match<'_>, replacement: &str) -> String {
  let whole = &captures[0];
  let offset = captures.get(0).map_or(0, |m| m.start());
  format!(
    "{}{}{}",
    &whole[..part.start() - offset],
    replacement,
    &whole[part.end() - offset..]
  )
}

impl<S: FileStore> PackBuilder<S> {
  pub(crate) fn scan_js(&mut self, id: ModuleId) {
    let content = self.graph.module(id).content().into_owned();
    let content = token_pattern()
      .replace_all(&content, |captures: &Captures| self.rewrite_js_token(id, captures))
      .into_owned();
    self.require_native_providers(id);
    let content = self.expand_url_directives(id, &content);
    self.graph.module_mut(id).set_content(content);
  }

  fn rewrite_js_token(&mut self, id: ModuleId, captures: &Captures<'_>) -> String {
    let all = &captures[0];

    if let Some(body) = captures.name("line") {
      return self
        .expand_comment(id, body.as_str(), CommentStyle::Line)
        .unwrap_or_else(|| all.to_string());
    }
    if let Some(body) = captures.name("block") {
      return self
        .expand_comment(id, body.as_str(), CommentStyle::Block)
        .unwrap_or_else(|| all.to_string());
    }

    if let Some(literal) = captures.name("sync") {
      if !self.options.resolve_common_js_requires {
        return all.to_string();
      }
      let name = self.require_module(id, unquote(literal.as_str()));
      return splice(captures, literal, &js_string(&name));
    }

    if let Some(array) = captures.name("async") {
      if !self.options.resolve_async_requires {
        return all.to_string();
      }
      let rewritten = string_pattern()
        .replace_all(array.as_str(), |literal: &Captures| {
          let url = self.require_async(id, unquote(&literal[0]));
          js_string(&url)
        })
        .into_owned();
      return splice(captures, array, &rewritten);
    }

    if let Some(symbol) = captures.name("symbol") {
      self.mark_symbol(id, symbol.as_str());
    }
    all.to_string()
  }

  /// Link a synchronous `require()` and return the module name it should use.
  fn require_module(&mut self, id: ModuleId, specifier: &str) -> String {
    self.graph.module_mut(id).flags.common_js = true;

    if self.options.resolve_node_native_modules && self.options.native_modules.contains_key(specifier) {
      self.require_native(id, specifier);
      return specifier.to_string();
    }

    match self.resolve(id, specifier, true) {
      Resolution::External => specifier.to_string(),
      Resolution::NotFound { .. } => {
        let module = self.graph.module(id).name().to_string();
        self.diagnostics.warn(Warning::ModuleNotFound {
          module,
          specifier: specifier.to_string(),
        });
        specifier.to_string()
      }
      Resolution::Found { path, .. } => {
        let target = self.load_dependency(&path);
        if !self.graph.require(id, target) {
          let module = self.graph.module(id).name().to_string();
          self.diagnostics.warn(Warning::CircularRequire {
            module,
            specifier: specifier.to_string(),
          });
        }
        self.graph.module(target).name().to_string()
      }
    }
  }

  /// Resolve one entry of an array-form `require()` to the URL it is fetched from.
  fn require_async(&mut self, id: ModuleId, specifier: &str) -> String {
    self.graph.module_mut(id).flags.has_async_require = true;

    match self.resolve(id, specifier, true) {
      Resolution::External => specifier.to_string(),
      Resolution::NotFound { .. } => {
        let module = self.graph.module(id).name().to_string();
        self.diagnostics.warn(Warning::ModuleNotFound {
          module,
          specifier: specifier.to_string(),
        });
        specifier.to_string()
      }
      Resolution::Found { path, query } => {
        let target = self.load_dependency(&path);
        self.final_url(id, target, &query)
      }
    }
  }

  fn mark_symbol(&mut self, id: ModuleId, symbol: &str) {
    let exports = self.options.resolve_common_js_exports;
    let native = self.options.resolve_node_native_modules;
    let flags = &mut self.graph.module_mut(id).flags;
    match symbol {
      "exports." | "module." => flags.common_js |= exports,
      "process." => flags.process |= native,
      "global." => flags.global |= native,
      "Buffer" => flags.buffer |= native,
      "setImmediate" => flags.set_immediate |= native,
      "clearImmediate" => flags.clear_immediate |= native,
      _ => {}
    }
  }

  fn require_native_providers(&mut self, id: ModuleId) {
    let flags = self.graph.module(id).flags;
    let providers = [
      (flags.process, "process"),
      (flags.buffer, "buffer"),
      (flags.set_immediate || flags.clear_immediate, "timers"),
    ];
    for (needed, name) in providers {
      if needed {
        self.require_native(id, name);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::PackOptions;
  use pretty_assertions::assert_eq;
  use std::fs;
  use std::path::Path;
  use tempfile::tempdir;

  fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
  }

  fn options(root: &Path) -> PackOptions {
    PackOptions {
      root: root.to_path_buf(),
      extensions: vec![".js".into()],
      ..PackOptions::default()
    }
  }

  fn content_of(builder: &PackBuilder, root: &Path, name: &str) -> String {
    let id = builder.module_id(&root.join(name)).unwrap();
    builder.graph().module(id).content().into_owned()
  }

  #[test]
  fn rewrites_requires_to_module_names() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_file(&root.join("src/main.js"), "var util = require( './util' );\n");
    write_file(&root.join("src/util.js"), "exports.x = 1;\n");

    let mut builder = PackBuilder::new(options(root));
    let main = builder.load(&root.join("src/main.js")).unwrap();
    let util = builder.module_id(&root.join("src/util.js")).unwrap();

    assert_eq!(
      content_of(&builder, root, "src/main.js"),
      "var util = require( \"src/util.js\" );\n"
    );
    assert!(builder.graph().module(main).required().contains(&util));
    assert!(builder.graph().module(main).flags.common_js);
    assert!(builder.graph().module(util).flags.common_js);
  }

  #[test]
  fn ignores_requires_inside_strings_and_comments() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    let source = concat!(
      "var a = \"require('./x')\";\n",
      "var b = `require('./y')`;\n",
      "// require('./z')\n",
      "/* require('./w') */\n",
    );
    write_file(&root.join("main.js"), source);

    let mut builder = PackBuilder::new(options(root));
    let main = builder.load(&root.join("main.js")).unwrap();

    assert_eq!(content_of(&builder, root, "main.js"), source);
    assert!(builder.warnings().is_empty());
    assert!(builder.graph().module(main).required().is_empty());
    assert!(!builder.graph().module(main).flags.common_js);
  }

  #[test]
  fn array_requires_become_urls() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_file(
      &root.join("app/main.js"),
      "require(['../lazy/page', './missing'], function (page) {});\n",
    );
    write_file(&root.join("lazy/page.js"), "exports.page = 1;\n");

    let mut builder = PackBuilder::new(options(root));
    let main = builder.load(&root.join("app/main.js")).unwrap();

    assert_eq!(
      content_of(&builder, root, "app/main.js"),
      "require([\"../lazy/page.js\", \"./missing\"], function (page) {});\n"
    );
    let module = builder.graph().module(main);
    assert!(module.flags.has_async_require);
    assert!(module.required().is_empty());
    assert!(matches!(
      builder.warnings(),
      [Warning::ModuleNotFound { specifier, .. }] if specifier == "./missing"
    ));
  }

  #[test]
  fn node_symbols_set_flags() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_file(
      &root.join("main.js"),
      "global.x = Buffer.from('a'); setImmediate(f); module.exports = process.env;\n",
    );

    let mut builder = PackBuilder::new(options(root));
    let main = builder.load(&root.join("main.js")).unwrap();
    let flags = builder.graph().module(main).flags;

    assert!(flags.global && flags.buffer && flags.set_immediate && flags.process);
    assert!(flags.common_js);
    assert!(!flags.clear_immediate);
  }

  #[test]
  fn disabled_passes_leave_source_alone() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_file(&root.join("main.js"), "require('./dep'); exports.a = process.argv;\n");
    write_file(&root.join("dep.js"), "");

    let mut builder = PackBuilder::new(PackOptions {
      resolve_common_js_requires: false,
      resolve_common_js_exports: false,
      resolve_node_native_modules: false,
      ..options(root)
    });
    let main = builder.load(&root.join("main.js")).unwrap();

    assert_eq!(
      content_of(&builder, root, "main.js"),
      "require('./dep'); exports.a = process.argv;\n"
    );
    let module = builder.graph().module(main);
    assert_eq!(module.flags, crate::graph::Flags::default());
    assert!(module.required().is_empty());
  }

  #[test]
  fn includes_are_spliced_into_scripts() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_file(&root.join("main.js"), "/* #include ./banner.js */\nrun();\n");
    write_file(&root.join("banner.js"), "var banner = require('./dep');");
    write_file(&root.join("dep.js"), "");

    let mut builder = PackBuilder::new(options(root));
    let main = builder.load(&root.join("main.js")).unwrap();
    let dep = builder.module_id(&root.join("dep.js")).unwrap();

    assert_eq!(
      content_of(&builder, root, "main.js"),
      "var banner = require(\"dep.js\");\nrun();\n"
    );
    assert!(builder.graph().module(main).required().contains(&dep));
    assert!(builder.graph().module(main).flags.common_js);
  }
}
