use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::candidates::{CandidateContext, generate_candidates};
use super::specifier::{is_external, split_query};
use crate::config::PackOptions;
use crate::store::FileStore;

/// Outcome of resolving one specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The reference is an external URL and is left alone.
    External,
    /// The reference names a local file.
    Found {
        /// Path of the file that matched.
        path: PathBuf,
        /// Query suffix of the original reference, including its separator.
        query: String,
    },
    /// Nothing on disk matched.
    NotFound {
        /// Specifier after any importer rewrite.
        specifier: String,
        /// Query suffix of the original reference.
        query: String,
    },
}

/// Turns textual references into files according to the configured search rules.
#[derive(Debug)]
pub struct Resolver<'a, S: FileStore> {
    store: &'a S,
    options: &'a PackOptions,
    root: &'a Path,
}

impl<'a, S: FileStore> Resolver<'a, S> {
    /// Create a resolver over `store`, with search roots relative to `root`.
    pub fn new(store: &'a S, options: &'a PackOptions, root: &'a Path) -> Self {
        Self {
            store,
            options,
            root,
        }
    }

    /// Resolve `specifier` as written in `from_file`.
    ///
    /// Candidates are tried in priority order and, within each candidate, first as
    /// written and then with every configured extension appended.
    pub fn resolve(&self, specifier: &str, from_file: &Path, require_mode: bool) -> Resolution {
        let rewritten = self
            .options
            .importer
            .as_ref()
            .and_then(|importer| importer(specifier, from_file, require_mode));
        let specifier = rewritten.as_deref().unwrap_or(specifier);

        if is_external(specifier) {
            return Resolution::External;
        }

        let (path, query) = split_query(specifier);
        let context = CandidateContext {
            from_dir: from_file.parent().unwrap_or(Path::new("")),
            root: self.root,
            search_paths: &self.options.paths,
            require_mode,
            search_node_modules: self.options.search_node_modules,
        };

        for candidate in generate_candidates(&context, path) {
            if let Some(found) = self.find_candidate(&candidate) {
                log::debug!("resolved '{}' to {}", specifier, found.display());
                return Resolution::Found {
                    path: found,
                    query: query.to_string(),
                };
            }
        }

        Resolution::NotFound {
            specifier: specifier.to_string(),
            query: query.to_string(),
        }
    }

    fn find_candidate(&self, candidate: &Path) -> Option<PathBuf> {
        if self.store.is_file(candidate) {
            return Some(candidate.to_path_buf());
        }

        self.options.extensions.iter().find_map(|extension| {
            let mut with_extension = OsString::from(candidate.as_os_str());
            with_extension.push(extension);
            let with_extension = PathBuf::from(with_extension);
            self.store.is_file(&with_extension).then_some(with_extension)
        })
    }
}
