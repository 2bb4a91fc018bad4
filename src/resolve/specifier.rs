use regex::Regex;

fn external_reference_patterns() -> &'static [Regex] {
    use std::sync::OnceLock;

    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            vec![
                Regex::new(r"^(\w+:)?//").expect("invalid scheme regex"),
                Regex::new(r"(?i)^data:").expect("invalid data URI regex"),
                Regex::new(r"(?i)^mailto:").expect("invalid mailto regex"),
            ]
        })
        .as_slice()
}

/// Determine whether a reference points outside the local filesystem.
///
/// Scheme URLs (`https://`, `file://`), protocol-relative `//host` references and
/// data or mailto URIs are never resolved to files.
pub fn is_external(value: &str) -> bool {
    external_reference_patterns()
        .iter()
        .any(|pattern| pattern.is_match(value))
}

/// Split a reference into its path and its `?`/`&` query suffix.
///
/// The query keeps its leading separator so it can be appended back verbatim.
pub fn split_query(value: &str) -> (&str, &str) {
    match value.find(['?', '&']) {
        Some(index) => value.split_at(index),
        None => (value, ""),
    }
}
