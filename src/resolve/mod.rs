//! Turning textual references into files on disk.
//!
//! The work is split the same way a reference is processed: [`specifier`] recognises
//! external URLs and splits off query strings, [`candidates`] expands a path into the
//! ordered list of places it may live, and [`resolver`] tries those candidates with
//! the configured extensions.

mod candidates;
mod resolver;
mod specifier;

pub use candidates::{CandidateContext, generate_candidates};
pub use resolver::{Resolution, Resolver};
pub use specifier::{is_external, split_query};
