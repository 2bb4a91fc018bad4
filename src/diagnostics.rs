//! Non-fatal warnings raised while resolving and packing modules.

use std::path::PathBuf;

/// A recoverable problem found while building the module graph.
///
/// None of these abort a build: the offending reference is left as written and
/// packing continues with whatever could be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
  /// A URL-like reference (`src`, `href`, `url()`, `?__url`) points at nothing on disk.
  ReferenceNotFound {
    /// Name of the module containing the reference.
    module: String,
    /// Reference as written in the source.
    specifier: String,
  },
  /// A `require()` target could not be located.
  ModuleNotFound {
    /// Name of the requiring module.
    module: String,
    /// Specifier passed to `require()`.
    specifier: String,
  },
  /// `#include` pointed at an external URL.
  RemoteInclude {
    /// Name of the including module.
    module: String,
    /// Path given to the directive.
    specifier: String,
  },
  /// `#include` pointed at a missing file.
  IncludeNotFound {
    /// Name of the including module.
    module: String,
    /// Path given to the directive.
    specifier: String,
  },
  /// Including the target would make the include relation cyclic.
  CircularInclude {
    /// Name of the including module.
    module: String,
    /// Path given to the directive.
    specifier: String,
  },
  /// A `require()` edge closed a cycle. The edge is still registered.
  CircularRequire {
    /// Name of the requiring module.
    module: String,
    /// Specifier passed to `require()`.
    specifier: String,
  },
  /// `#moduletype` named something other than a supported wrapper format.
  UnknownModuleType {
    /// Name of the module carrying the directive.
    module: String,
    /// Value given to the directive.
    value: String,
  },
  /// A resolved dependency exists but could not be read.
  Unreadable {
    /// Path of the file.
    path: PathBuf,
    /// Underlying I/O error message.
    error: String,
  },
}

impl std::fmt::Display for Warning {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::ReferenceNotFound { module, specifier } => {
        write!(f, "{module}: reference not found: '{specifier}'")
      }
      Self::ModuleNotFound { module, specifier } => {
        write!(f, "{module}: cannot find module '{specifier}'")
      }
      Self::RemoteInclude { module, specifier } => {
        write!(f, "{module}: cannot include remote path: {specifier}")
      }
      Self::IncludeNotFound { module, specifier } => {
        write!(f, "{module}: include not found: {specifier}")
      }
      Self::CircularInclude { module, specifier } => {
        write!(f, "{module}: circular include with {specifier}")
      }
      Self::CircularRequire { module, specifier } => {
        write!(f, "{module}: circular reference with '{specifier}'")
      }
      Self::UnknownModuleType { module, value } => write!(
        f,
        "{module}: #moduletype can only be one of 'global', 'cmd', 'amd', 'umd' and 'commonjs', got '{value}'"
      ),
      Self::Unreadable { path, error } => {
        write!(f, "failed to read {}: {}", path.display(), error)
      }
    }
  }
}

/// Ordered record of every warning raised during a build.
#[derive(Debug, Default)]
pub struct Diagnostics {
  warnings: Vec<Warning>,
}

impl Diagnostics {
  /// Record a warning and forward it to the `log` facade.
  pub fn warn(&mut self, warning: Warning) {
    log::warn!("{warning}");
    self.warnings.push(warning);
  }

  /// Warnings in the order they were raised.
  pub fn warnings(&self) -> &[Warning] {
    &self.warnings
  }

  /// Drain the recorded warnings, leaving the sink empty.
  pub fn take(&mut self) -> Vec<Warning> {
    std::mem::take(&mut self.warnings)
  }

  /// Number of recorded warnings matching `predicate`.
  pub fn count(&self, predicate: impl Fn(&Warning) -> bool) -> usize {
    self.warnings.iter().filter(|warning| predicate(warning)).count()
  }
}
