//! `#include`, `#exclude` and `#moduletype` directives written inside comments.

use std::sync::OnceLock;

use regex::Regex;

use super::unquote;
use crate::builder::PackBuilder;
use crate::diagnostics::Warning;
use crate::graph::{BuildType, ModuleId};
use crate::resolve::Resolution;
use crate::store::FileStore;

/// Comment syntax a directive was found in, used to re-wrap directives that fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CommentStyle {
  /// `// ...`
  Line,
  /// `/* ... */`
  Block,
  /// `<!-- ... -->`
  Html,
}

impl CommentStyle {
  fn wrap(self, body: &str) -> String {
    match self {
      Self::Line => format!("// {body}"),
      Self::Block => format!("/* {body} */"),
      Self::Html => format!("<!-- {body} -->"),
    }
  }
}

fn directive_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| Regex::new(r"#(\w+)[ \t]+([^\r\n]*)").expect("invalid directive regex"))
}

fn flush_comment(output: &mut String, kept: &mut String, style: CommentStyle) {
  let text = kept.trim();
  if !text.is_empty() {
    output.push_str(&style.wrap(text));
  }
  kept.clear();
}

fn directive_argument(raw: &str, style: CommentStyle) -> &str {
  let raw = raw.trim();
  let raw = match style {
    CommentStyle::Block => raw.trim_end_matches("*/"),
    CommentStyle::Html => raw.trim_end_matches("-->"),
    CommentStyle::Line => raw,
  };
  unquote(raw)
}

impl<S: FileStore> PackBuilder<S> {
  /// Apply the directives in a comment `body` (delimiters stripped) found in module `id`.
  ///
  /// Returns the text that replaces the whole comment, or `None` to keep the comment
  /// byte-for-byte when no directive took effect. Exclusions and module types are
  /// dropped from the comment. Each successful include closes the comment written so
  /// far and is followed by the included content. Remaining text, including failed
  /// includes, is re-wrapped in the comment syntax.
  pub(crate) fn expand_comment(&mut self, id: ModuleId, body: &str, style: CommentStyle) -> Option<String> {
    if !self.options.resolve_comments || !body.contains('#') {
      return None;
    }

    let mut output = String::new();
    let mut kept = String::new();
    let mut changed = false;
    let mut last = 0;
    for captures in directive_pattern().captures_iter(body) {
      let Some(directive) = captures.get(0) else {
        continue;
      };
      kept.push_str(&body[last..directive.start()]);
      last = directive.end();

      let argument = directive_argument(&captures[2], style);
      match &captures[1] {
        "include" => match self.include_directive(id, argument) {
          Some(content) => {
            flush_comment(&mut output, &mut kept, style);
            if style == CommentStyle::Line && !output.is_empty() {
              output.push('\n');
            }
            output.push_str(&content);
            changed = true;
          }
          None => kept.push_str(directive.as_str()),
        },
        "exclude" => {
          self.exclude_directive(id, argument);
          changed = true;
        }
        "moduletype" => {
          self.module_type_directive(id, argument);
          changed = true;
        }
        _ => kept.push_str(directive.as_str()),
      }
    }
    if !changed {
      return None;
    }

    kept.push_str(&body[last..]);
    flush_comment(&mut output, &mut kept, style);
    Some(output)
  }

  fn include_directive(&mut self, id: ModuleId, argument: &str) -> Option<String> {
    let module = self.graph.module(id).name().to_string();
    match self.resolve(id, argument, false) {
      Resolution::External => {
        self.diagnostics.warn(Warning::RemoteInclude {
          module,
          specifier: argument.to_string(),
        });
        None
      }
      Resolution::NotFound { .. } => {
        self.diagnostics.warn(Warning::IncludeNotFound {
          module,
          specifier: argument.to_string(),
        });
        None
      }
      Resolution::Found { path, .. } => {
        let target = self.load_dependency(&path);
        let content = self.include_module(id, target);
        if content.is_none() {
          self.diagnostics.warn(Warning::CircularInclude {
            module,
            specifier: argument.to_string(),
          });
        }
        content
      }
    }
  }

  fn exclude_directive(&mut self, id: ModuleId, argument: &str) {
    match self.resolve(id, argument, true) {
      Resolution::Found { path, .. } => {
        let target = self.load_dependency(&path);
        self.graph.exclude(id, target);
      }
      Resolution::External => {}
      Resolution::NotFound { .. } => {
        let module = self.graph.module(id).name().to_string();
        self.diagnostics.warn(Warning::ModuleNotFound {
          module,
          specifier: argument.to_string(),
        });
      }
    }
  }

  fn module_type_directive(&mut self, id: ModuleId, argument: &str) {
    match BuildType::from_directive(argument) {
      Some(build_type) => self.graph.module_mut(id).build_type = build_type,
      None => {
        let module = self.graph.module(id).name().to_string();
        self.diagnostics.warn(Warning::UnknownModuleType {
          module,
          value: argument.to_string(),
        });
      }
    }
  }
}
