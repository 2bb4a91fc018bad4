//! A single node of the dependency graph and the small value types it carries.

use std::borrow::Cow;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::path::Path;
use std::str::FromStr;

use indexmap::IndexSet;
use serde::Deserialize;

use crate::store::SourceFile;

/// Index of a module inside its [`crate::graph::ModuleGraph`].
pub type ModuleId = usize;

/// Content kind, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
  /// HTML-like pages and server templates.
  Html,
  /// JavaScript.
  Js,
  /// Stylesheets.
  Css,
  /// Plain text; only `?__url` directives are expanded.
  Text,
  /// Opaque binary content, never scanned.
  Resource,
}

impl ModuleKind {
  /// Classify a file by its extension (leading dot optional, case-insensitive).
  pub fn from_extension(extension: &str) -> Self {
    match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
      "html" | "htm" | "inc" | "jsp" | "asp" | "php" | "aspx" | "ashx" => Self::Html,
      "js" => Self::Js,
      "css" => Self::Css,
      "txt" | "text" | "md" => Self::Text,
      _ => Self::Resource,
    }
  }

  /// Whether content of this kind can be spliced into another text module.
  pub fn is_text(self) -> bool {
    !matches!(self, Self::Resource)
  }
}

/// Wrapper format for packed JavaScript output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildType {
  /// Plain global script.
  Global,
  /// Self-contained module; unwrapped when nothing needs the loader.
  #[default]
  Module,
  /// Never wrapped.
  NonModule,
  /// AMD `define()`.
  Amd,
  /// Universal module definition.
  Umd,
  /// CMD (SeaJS-style) `define()`.
  Cmd,
  /// CommonJS `module.exports`.
  CommonJs,
}

impl BuildType {
  /// Value accepted by a `#moduletype` directive, matched case-insensitively.
  pub fn from_directive(value: &str) -> Option<Self> {
    match value.to_ascii_lowercase().as_str() {
      "global" => Some(Self::Global),
      "amd" => Some(Self::Amd),
      "cmd" => Some(Self::Cmd),
      "umd" => Some(Self::Umd),
      "commonjs" => Some(Self::CommonJs),
      _ => None,
    }
  }

  /// Lower-case name as written in configuration.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Global => "global",
      Self::Module => "module",
      Self::NonModule => "nonmodule",
      Self::Amd => "amd",
      Self::Umd => "umd",
      Self::Cmd => "cmd",
      Self::CommonJs => "commonjs",
    }
  }
}

impl FromStr for BuildType {
  type Err = String;

  fn from_str(value: &str) -> Result<Self, Self::Err> {
    match value.to_ascii_lowercase().as_str() {
      "module" => Ok(Self::Module),
      "nonmodule" => Ok(Self::NonModule),
      other => Self::from_directive(other).ok_or_else(|| {
        format!(
          "unknown build type '{value}', expected one of global, module, nonmodule, amd, umd, cmd, commonjs"
        )
      }),
    }
  }
}

impl fmt::Display for BuildType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Capabilities a module (or anything spliced into it) relies on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
  /// Uses `require()`, `exports.` or `module.`.
  pub common_js: bool,
  /// Uses array-form asynchronous `require()`.
  pub has_async_require: bool,
  /// Needs the runtime style inserter.
  pub has_style_loader: bool,
  /// Touches Node's `global`.
  pub global: bool,
  /// Touches Node's `process`.
  pub process: bool,
  /// Touches Node's `Buffer`.
  pub buffer: bool,
  /// Calls `setImmediate`.
  pub set_immediate: bool,
  /// Calls `clearImmediate`.
  pub clear_immediate: bool,
}

impl Flags {
  /// Whether packing must emit the loader runtime.
  pub fn needs_loader(&self) -> bool {
    self.common_js || self.has_async_require
  }
}

impl BitOr for Flags {
  type Output = Self;

  fn bitor(self, rhs: Self) -> Self {
    Self {
      common_js: self.common_js || rhs.common_js,
      has_async_require: self.has_async_require || rhs.has_async_require,
      has_style_loader: self.has_style_loader || rhs.has_style_loader,
      global: self.global || rhs.global,
      process: self.process || rhs.process,
      buffer: self.buffer || rhs.buffer,
      set_immediate: self.set_immediate || rhs.set_immediate,
      clear_immediate: self.clear_immediate || rhs.clear_immediate,
    }
  }
}

impl BitOrAssign for Flags {
  fn bitor_assign(&mut self, rhs: Self) {
    *self = *self | rhs;
  }
}

/// Compiled unit of one file.
#[derive(Debug)]
pub struct Module {
  /// Position in the owning graph.
  pub id: ModuleId,
  /// Backing file.
  pub file: SourceFile,
  /// Content kind.
  pub kind: ModuleKind,
  /// Wrapper format used when this module is packed as an entry.
  pub build_type: BuildType,
  /// Accumulated capability flags.
  pub flags: Flags,
  pub(crate) required: IndexSet<ModuleId>,
  pub(crate) excluded: IndexSet<ModuleId>,
  pub(crate) included: IndexSet<ModuleId>,
  content_override: Option<String>,
  name_override: Option<String>,
  pub(crate) inline_blocks: usize,
}

impl Module {
  pub(crate) fn new(id: ModuleId, file: SourceFile, build_type: BuildType) -> Self {
    let kind = ModuleKind::from_extension(&file.extension);
    Self {
      id,
      file,
      kind,
      build_type,
      flags: Flags::default(),
      required: IndexSet::new(),
      excluded: IndexSet::new(),
      included: IndexSet::new(),
      content_override: None,
      name_override: None,
      inline_blocks: 0,
    }
  }

  /// Name used in `define()`/`require()` and diagnostics.
  pub fn name(&self) -> &str {
    self.name_override.as_deref().unwrap_or(&self.file.name)
  }

  /// Replace the module name, e.g. with the bare specifier of a Node core module.
  pub fn set_name(&mut self, name: impl Into<String>) {
    self.name_override = Some(name.into());
  }

  /// Path of the backing file.
  pub fn path(&self) -> &Path {
    &self.file.path
  }

  /// Rewritten content if scanning changed it, otherwise the file content.
  pub fn content(&self) -> Cow<'_, str> {
    match &self.content_override {
      Some(content) => Cow::Borrowed(content),
      None => String::from_utf8_lossy(self.file.bytes()),
    }
  }

  /// Shadow the file content from now on.
  pub fn set_content(&mut self, content: String) {
    self.content_override = Some(content);
  }

  /// Size in bytes of the current content.
  pub fn size(&self) -> usize {
    match &self.content_override {
      Some(content) => content.len(),
      None => self.file.bytes().len(),
    }
  }

  /// Direct runtime dependencies, in discovery order.
  pub fn required(&self) -> &IndexSet<ModuleId> {
    &self.required
  }

  /// Modules removed from this module's packed closure.
  pub fn excluded(&self) -> &IndexSet<ModuleId> {
    &self.excluded
  }

  /// Modules spliced verbatim into this module.
  pub fn included(&self) -> &IndexSet<ModuleId> {
    &self.included
  }
}
