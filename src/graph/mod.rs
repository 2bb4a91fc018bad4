//! Dependency graph built while scanning: one [`Module`] per file.

mod module;
mod module_graph;

pub use module::{BuildType, Flags, Module, ModuleId, ModuleKind};
pub use module_graph::ModuleGraph;
