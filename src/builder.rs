//! Build orchestrator: owns the module graph and drives loading, scanning and packing.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use indexmap::IndexMap;
use same_file::is_same_file;

use crate::config::PackOptions;
use crate::diagnostics::{Diagnostics, Warning};
use crate::graph::{ModuleGraph, ModuleId, ModuleKind};
use crate::pack::pack_module;
use crate::resolve::{Resolution, Resolver};
use crate::store::{DiskStore, FileStore, SourceFile, module_name};

/// Inline `<script>`/`<style>` bodies gathered into a separate file via `__dest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFile {
  /// Absolute path the file would have next to its sources.
  pub path: PathBuf,
  /// Name relative to the project root.
  pub name: String,
  /// Every body extracted into the file, in document order.
  pub content: String,
}

/// Result of building one entry file.
#[derive(Debug)]
pub struct PackOutput {
  /// Root-relative name of the entry module.
  pub name: String,
  /// Content kind of the entry module.
  pub kind: ModuleKind,
  /// Packed text, or `None` for binary resources that are emitted unchanged.
  pub content: Option<String>,
  /// Files assembled from `__dest` blocks while building.
  pub extracted: Vec<ExtractedFile>,
  /// Warnings raised while building, in order.
  pub warnings: Vec<Warning>,
}

/// Loads modules into a [`ModuleGraph`], scans them and packs the result.
///
/// Every file is loaded and scanned at most once per builder; later references reuse
/// the existing module.
#[derive(Debug)]
pub struct PackBuilder<S: FileStore = DiskStore> {
  pub(crate) options: PackOptions,
  pub(crate) store: S,
  pub(crate) root: PathBuf,
  pub(crate) graph: ModuleGraph,
  pub(crate) diagnostics: Diagnostics,
  pub(crate) extracted: IndexMap<PathBuf, ExtractedFile>,
}

impl PackBuilder<DiskStore> {
  /// Create a builder reading from the local filesystem.
  pub fn new(options: PackOptions) -> Self {
    Self::with_store(options, DiskStore)
  }
}

impl<S: FileStore> PackBuilder<S> {
  /// Create a builder over a custom [`FileStore`].
  pub fn with_store(options: PackOptions, store: S) -> Self {
    let root = store.canonicalize(&options.root);
    Self {
      options,
      store,
      root,
      graph: ModuleGraph::new(),
      diagnostics: Diagnostics::default(),
      extracted: IndexMap::new(),
    }
  }

  /// Options the builder was created with.
  pub fn options(&self) -> &PackOptions {
    &self.options
  }

  /// Every module loaded so far.
  pub fn graph(&self) -> &ModuleGraph {
    &self.graph
  }

  /// Warnings raised so far, in order.
  pub fn warnings(&self) -> &[Warning] {
    self.diagnostics.warnings()
  }

  /// Id of the module backed by `path`, if it has been loaded.
  pub fn module_id(&self, path: &Path) -> Option<ModuleId> {
    self.graph.id_by_path(&self.store.canonicalize(path))
  }

  /// Load and scan an entry file, reusing the module when it is already known.
  pub fn load(&mut self, path: &Path) -> Result<ModuleId> {
    let canonical = self.store.canonicalize(path);
    if let Some(id) = self.graph.id_by_path(&canonical) {
      return Ok(id);
    }
    let bytes = self
      .store
      .read(&canonical)
      .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(self.create_and_scan(canonical, bytes))
  }

  /// Pack the module and its runtime dependencies, or `None` for binary resources.
  pub fn pack(&self, id: ModuleId) -> Option<String> {
    pack_module(&self.graph, id)
  }

  /// Load `entry`, pack it and drain the warnings raised along the way.
  pub fn build(&mut self, entry: &Path) -> Result<PackOutput> {
    let id = self.load(entry)?;
    let content = self.pack(id);
    let module = self.graph.module(id);
    log::info!("packed {} ({} modules loaded)", module.name(), self.graph.len());
    Ok(PackOutput {
      name: module.name().to_string(),
      kind: module.kind,
      content,
      extracted: self.extracted.drain(..).map(|(_, file)| file).collect(),
      warnings: self.diagnostics.take(),
    })
  }

  /// Load a file referenced from another module.
  ///
  /// Unreadable files are reported and registered with empty content so the
  /// reference still resolves to a module.
  pub(crate) fn load_dependency(&mut self, path: &Path) -> ModuleId {
    let canonical = self.store.canonicalize(path);
    if let Some(id) = self.graph.id_by_path(&canonical) {
      return id;
    }
    let bytes = match self.store.read(&canonical) {
      Ok(bytes) => bytes,
      Err(error) => {
        self.diagnostics.warn(Warning::Unreadable {
          path: canonical.clone(),
          error: error.to_string(),
        });
        Vec::new()
      }
    };
    self.create_and_scan(canonical, bytes)
  }

  fn create_and_scan(&mut self, path: PathBuf, bytes: Vec<u8>) -> ModuleId {
    let name = module_name(&self.root, &path);
    let id = self
      .graph
      .insert(SourceFile::new(path, name, bytes), self.options.build_type);
    log::debug!("loaded {}", self.graph.module(id).name());
    self.scan(id);
    id
  }

  /// Register an inline `<script>`/`<style>` body of `owner` as a virtual module,
  /// scan it and return its packed content.
  pub(crate) fn compile_inline_block(&mut self, owner: ModuleId, content: &str, extension: &str) -> String {
    let owner_module = self.graph.module_mut(owner);
    let index = owner_module.inline_blocks;
    owner_module.inline_blocks += 1;

    let suffix = format!("#inline{index}{extension}");
    let name = format!("{}{}", owner_module.name(), suffix);
    let mut path = owner_module.path().as_os_str().to_os_string();
    path.push(&suffix);

    let file = SourceFile::new(PathBuf::from(path), name, content.as_bytes().to_vec());
    let id = self.graph.insert_virtual(file, self.options.build_type);
    self.scan(id);
    self
      .pack(id)
      .unwrap_or_else(|| self.graph.module(id).content().into_owned())
  }

  /// Resolve `specifier` as written in module `id`.
  pub(crate) fn resolve(&self, id: ModuleId, specifier: &str, require_mode: bool) -> Resolution {
    Resolver::new(&self.store, &self.options, &self.root).resolve(
      specifier,
      self.graph.module(id).path(),
      require_mode,
    )
  }

  /// Splice `source` into `into`, or `None` when `source` already includes `into`.
  ///
  /// A module whose own scan is still running contributes its content as it stands.
  pub(crate) fn include_module(&mut self, into: ModuleId, source: ModuleId) -> Option<String> {
    self.graph.include(into, source)
  }

  /// Append `content` to the extracted file at `path` and return that file.
  pub(crate) fn extract(&mut self, path: PathBuf, content: &str) -> &ExtractedFile {
    let name = module_name(&self.root, &path);
    let file = self.extracted.entry(path.clone()).or_insert_with(|| ExtractedFile {
      path,
      name,
      content: String::new(),
    });
    if !file.content.is_empty() && !file.content.ends_with('\n') {
      file.content.push('\n');
    }
    file.content.push_str(content);
    log::debug!("extracted {} bytes into {}", content.len(), file.name);
    file
  }

  /// Require the module configured for a Node core name, renaming it to that name.
  ///
  /// Returns `None` when native-module support is off or `name` has no mapping.
  pub(crate) fn require_native(&mut self, id: ModuleId, name: &str) -> Option<ModuleId> {
    if !self.options.resolve_node_native_modules {
      return None;
    }
    let mapped = self.options.native_modules.get(name)?;
    let path = self.root.join(mapped);
    if !self.store.is_file(&path) {
      let module = self.graph.module(id).name().to_string();
      self.diagnostics.warn(Warning::ModuleNotFound {
        module,
        specifier: name.to_string(),
      });
      return None;
    }

    let target = self.load_dependency(&path);
    if target != id {
      self.graph.module_mut(id).flags.common_js = true;
      self.graph.module_mut(target).set_name(name);
      self.graph.require(id, target);
    }
    Some(target)
  }
}

/// Write a build result to `dest`, refusing to overwrite the entry file itself.
///
/// Binary resources have no packed content and are linked or copied from `entry`.
/// Extracted files are written beside `dest`, at the same relative location they
/// have to `entry`.
pub fn write_output(entry: &Path, output: &PackOutput, dest: &Path) -> Result<()> {
  if dest.exists() && is_same_file(entry, dest)? {
    bail!("refusing to overwrite source file {}", entry.display());
  }
  if let Some(parent) = dest.parent() {
    fs::create_dir_all(parent)?;
  }

  match &output.content {
    Some(content) => fs::write(dest, content)
      .with_context(|| format!("failed to write {}", dest.display()))?,
    None => install_resource(entry, dest)
      .with_context(|| format!("failed to copy {} to {}", entry.display(), dest.display()))?,
  }
  log::info!("wrote {}", dest.display());

  if output.extracted.is_empty() {
    return Ok(());
  }
  let entry_dir = fs::canonicalize(entry)
    .with_context(|| format!("failed to resolve {}", entry.display()))?
    .parent()
    .map(Path::to_path_buf)
    .unwrap_or_default();
  let dest_dir = dest.parent().unwrap_or(Path::new(""));
  for file in &output.extracted {
    let relative = pathdiff::diff_paths(&file.path, &entry_dir)
      .with_context(|| format!("cannot place {} relative to {}", file.name, entry_dir.display()))?;
    let target = dest_dir.join(relative);
    if target.exists() && file.path.exists() && is_same_file(&file.path, &target)? {
      bail!("refusing to overwrite source file {}", file.path.display());
    }
    if let Some(parent) = target.parent() {
      fs::create_dir_all(parent)?;
    }
    fs::write(&target, &file.content)
      .with_context(|| format!("failed to write {}", target.display()))?;
    log::info!("wrote {}", target.display());
  }
  Ok(())
}

fn install_resource(source: &Path, destination: &Path) -> std::io::Result<()> {
  if destination.exists() {
    fs::remove_file(destination)?;
  }

  match fs::hard_link(source, destination) {
    Ok(_) => Ok(()),
    Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(()),
    Err(_) => fs::copy(source, destination).map(|_| ()),
  }
}
