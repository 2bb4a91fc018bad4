use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::store::normalize;

/// Where and how a specifier is being resolved from.
#[derive(Debug, Clone, Copy)]
pub struct CandidateContext<'a> {
    /// Directory of the referencing module.
    pub from_dir: &'a Path,
    /// Project root that relative search paths hang off.
    pub root: &'a Path,
    /// Configured search roots, in priority order.
    pub search_paths: &'a [PathBuf],
    /// `require()` resolution: bare names skip the local directory and may walk `node_modules`.
    pub require_mode: bool,
    /// Whether ancestor `node_modules` directories are searched in require mode.
    pub search_node_modules: bool,
}

/// Generate candidate files for a specifier path, in strict priority order.
///
/// Paths starting with `.` or `/` only ever resolve against the referencing module's
/// directory, OS-absolute paths only ever resolve to themselves, and bare names expand
/// into the local directory, the search roots and the ancestor `node_modules` chain.
pub fn generate_candidates(context: &CandidateContext<'_>, path: &str) -> Vec<PathBuf> {
    if path.is_empty() {
        return Vec::new();
    }

    let mut builder = CandidateBuilder::new(context, path);

    if path.starts_with(['.', '/']) {
        builder.add_relative_candidate();
    } else if Path::new(path).is_absolute() {
        builder.add_absolute_candidate();
    } else {
        if !context.require_mode {
            builder.add_relative_candidate();
        }
        builder.add_search_path_candidates();
        if context.require_mode && context.search_node_modules {
            builder.add_node_modules_candidates();
        }
    }

    builder.finish()
}

struct CandidateBuilder<'a> {
    context: &'a CandidateContext<'a>,
    path: &'a str,
    seen: BTreeSet<PathBuf>,
    result: Vec<PathBuf>,
}

impl<'a> CandidateBuilder<'a> {
    fn new(context: &'a CandidateContext<'a>, path: &'a str) -> Self {
        Self {
            context,
            path,
            seen: BTreeSet::new(),
            result: Vec::new(),
        }
    }

    fn add_relative_candidate(&mut self) {
        self.push(self.context.from_dir.join(self.path));
    }

    fn add_absolute_candidate(&mut self) {
        self.push(PathBuf::from(self.path));
    }

    fn add_search_path_candidates(&mut self) {
        for search_path in self.context.search_paths {
            let base = self.context.root.join(search_path);
            self.push(base.join(self.path));
        }
    }

    fn add_node_modules_candidates(&mut self) {
        for ancestor in self.context.from_dir.ancestors() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            self.push(ancestor.join("node_modules").join(self.path));
        }
    }

    fn finish(self) -> Vec<PathBuf> {
        self.result
    }

    fn push(&mut self, candidate: PathBuf) {
        let candidate = normalize(&candidate);
        if self.seen.insert(candidate.clone()) {
            self.result.push(candidate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context<'a>(search_paths: &'a [PathBuf], require_mode: bool) -> CandidateContext<'a> {
        CandidateContext {
            from_dir: Path::new("/project/src"),
            root: Path::new("/project"),
            search_paths,
            require_mode,
            search_node_modules: true,
        }
    }

    #[test]
    fn returns_empty_for_blank_paths() {
        assert!(generate_candidates(&context(&[], false), "").is_empty());
    }

    #[test]
    fn relative_paths_resolve_once_against_module_dir() {
        let search = [PathBuf::from("lib")];
        let candidates = generate_candidates(&context(&search, true), "../shared/a.js");
        assert_eq!(candidates, vec![PathBuf::from("/project/shared/a.js")]);
    }

    #[test]
    fn bare_names_try_local_then_search_paths() {
        let search = [PathBuf::from("lib"), PathBuf::from("/vendor")];
        let candidates = generate_candidates(&context(&search, false), "util");
        assert_eq!(candidates, vec![
            PathBuf::from("/project/src/util"),
            PathBuf::from("/project/lib/util"),
            PathBuf::from("/vendor/util"),
        ]);
    }

    #[test]
    fn require_mode_walks_node_modules_nearest_first() {
        let search = [PathBuf::from("lib")];
        let candidates = generate_candidates(&context(&search, true), "lodash");
        assert_eq!(candidates, vec![
            PathBuf::from("/project/lib/lodash"),
            PathBuf::from("/project/src/node_modules/lodash"),
            PathBuf::from("/project/node_modules/lodash"),
            PathBuf::from("/node_modules/lodash"),
        ]);
    }

    #[test]
    fn node_modules_search_can_be_disabled() {
        let mut context = context(&[], true);
        context.search_node_modules = false;
        assert!(generate_candidates(&context, "lodash").is_empty());
    }
}
