//! Arena of modules with the require, include and exclude relations between them.
//!
//! `required` edges may form cycles and every traversal over them carries a visited
//! set. `included` edges are kept acyclic: [`ModuleGraph::include`] refuses any edge
//! that would close a loop.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use indexmap::IndexSet;

use super::module::{BuildType, Flags, Module, ModuleId};
use crate::store::SourceFile;

/// All modules known to a build, deduplicated by canonical path.
#[derive(Debug, Default)]
pub struct ModuleGraph {
  modules: Vec<Module>,
  by_path: HashMap<PathBuf, ModuleId>,
}

impl ModuleGraph {
  /// Create an empty graph.
  pub fn new() -> Self {
    Self::default()
  }

  /// Module previously registered for `canonical_path`.
  pub fn id_by_path(&self, canonical_path: &Path) -> Option<ModuleId> {
    self.by_path.get(canonical_path).copied()
  }

  /// Register a module for a file on disk. `file.path` must be canonical.
  pub fn insert(&mut self, file: SourceFile, build_type: BuildType) -> ModuleId {
    if let Some(id) = self.by_path.get(&file.path) {
      return *id;
    }
    let id = self.modules.len();
    self.by_path.insert(file.path.clone(), id);
    self.modules.push(Module::new(id, file, build_type));
    id
  }

  /// Register a module with no on-disk identity, such as an inline `<script>` body.
  pub fn insert_virtual(&mut self, file: SourceFile, build_type: BuildType) -> ModuleId {
    let id = self.modules.len();
    self.modules.push(Module::new(id, file, build_type));
    id
  }

  /// Borrow a module.
  ///
  /// # Panics
  ///
  /// Panics when `id` was not produced by this graph.
  pub fn module(&self, id: ModuleId) -> &Module {
    &self.modules[id]
  }

  /// Mutably borrow a module.
  pub fn module_mut(&mut self, id: ModuleId) -> &mut Module {
    &mut self.modules[id]
  }

  /// Number of modules.
  pub fn len(&self) -> usize {
    self.modules.len()
  }

  /// Whether the graph holds no modules.
  pub fn is_empty(&self) -> bool {
    self.modules.is_empty()
  }

  /// Iterate modules in creation order.
  pub fn iter(&self) -> impl Iterator<Item = &Module> {
    self.modules.iter()
  }

  /// Record that `from` requires `to`.
  ///
  /// The edge is always kept. Returns `false` when `to` already reaches `from`,
  /// i.e. the new edge closes a require cycle. Self edges are ignored.
  pub fn require(&mut self, from: ModuleId, to: ModuleId) -> bool {
    if from == to {
      return false;
    }
    let acyclic = !self.has_require(to, from);
    self.modules[from].required.insert(to);
    acyclic
  }

  /// Whether `target` is `from` or reachable from it through `required` edges.
  pub fn has_require(&self, from: ModuleId, target: ModuleId) -> bool {
    self.reaches(from, target, |module| &module.required)
  }

  /// Whether `target` is `from` or spliced into it, directly or transitively.
  pub fn has_include(&self, from: ModuleId, target: ModuleId) -> bool {
    self.reaches(from, target, |module| &module.included)
  }

  /// Splice `source` into `into`, returning the content to substitute.
  ///
  /// The flags, requirements and exclusions of `source` become those of `into` as
  /// well. Returns `None`, leaving both modules untouched, when `source` already
  /// includes `into`.
  pub fn include(&mut self, into: ModuleId, source: ModuleId) -> Option<String> {
    if self.has_include(source, into) {
      return None;
    }

    self.modules[into].included.insert(source);

    let flags = self.modules[source].flags;
    self.modules[into].flags |= flags;

    let required: Vec<ModuleId> = self.modules[source].required.iter().copied().collect();
    for dependency in required {
      self.require(into, dependency);
    }
    let excluded: Vec<ModuleId> = self.modules[source].excluded.iter().copied().collect();
    for exclusion in excluded {
      self.exclude(into, exclusion);
    }

    Some(self.modules[source].content().into_owned())
  }

  /// Remove `target` (and what it requires) from the packed closure of `from`.
  ///
  /// Returns `false` if the exclusion was already recorded.
  pub fn exclude(&mut self, from: ModuleId, target: ModuleId) -> bool {
    self.modules[from].excluded.insert(target)
  }

  /// `root` and every module it transitively requires, in discovery order.
  pub fn require_closure(&self, root: ModuleId) -> IndexSet<ModuleId> {
    let mut seen = IndexSet::new();
    let mut pending = vec![root];
    while let Some(id) = pending.pop() {
      if seen.insert(id) {
        pending.extend(self.modules[id].required.iter().rev().copied());
      }
    }
    seen
  }

  /// Union of the flags of `root` and everything it transitively requires.
  pub fn closure_flags(&self, root: ModuleId) -> Flags {
    self
      .require_closure(root)
      .into_iter()
      .fold(Flags::default(), |flags, id| flags | self.modules[id].flags)
  }

  /// Modules never emitted when packing `root`: its exclusions plus everything they require.
  pub fn suppression_set(&self, root: ModuleId) -> HashSet<ModuleId> {
    let mut suppressed = HashSet::new();
    for &excluded in &self.modules[root].excluded {
      suppressed.extend(self.require_closure(excluded));
    }
    suppressed
  }

  /// Emission order for packing `root`.
  ///
  /// Depth-first over `required` edges, each module after its dependencies, skipping
  /// the suppression set. A module is visited at most once, so require cycles end
  /// where they close.
  pub fn pack_order(&self, root: ModuleId) -> Vec<ModuleId> {
    let mut visited = self.suppression_set(root);
    let mut order = Vec::new();
    if !visited.insert(root) {
      return order;
    }

    let mut stack = vec![(root, 0usize)];
    while let Some(&(id, index)) = stack.last() {
      match self.modules[id].required.get_index(index) {
        Some(&dependency) => {
          if let Some(top) = stack.last_mut() {
            top.1 += 1;
          }
          if visited.insert(dependency) {
            stack.push((dependency, 0));
          }
        }
        None => {
          order.push(id);
          stack.pop();
        }
      }
    }
    order
  }

  fn reaches(
    &self,
    from: ModuleId,
    target: ModuleId,
    edges: impl Fn(&Module) -> &IndexSet<ModuleId>,
  ) -> bool {
    let mut seen = HashSet::new();
    let mut pending = vec![from];
    while let Some(id) = pending.pop() {
      if id == target {
        return true;
      }
      if seen.insert(id) {
        pending.extend(edges(&self.modules[id]).iter().copied());
      }
    }
    false
  }
}
