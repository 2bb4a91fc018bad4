#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod builder;
pub mod config;
pub mod diagnostics;
pub mod graph;
pub mod inline;
pub mod pack;
pub mod resolve;
pub mod scan;
pub mod store;

pub use builder::{ExtractedFile, PackBuilder, PackOutput, write_output};
pub use config::{InlinePolicy, PackOptions, UrlPostfix};
pub use diagnostics::{Diagnostics, Warning};
pub use graph::{BuildType, Flags, Module, ModuleGraph, ModuleId, ModuleKind};
pub use store::{DiskStore, FileStore, SourceFile};
