//! Reading and rewriting attributes inside a single HTML start tag.

use std::sync::OnceLock;

use regex::{Captures, Regex};

// One attribute per match: leading whitespace and the full name, then an optional value.
// Values are consumed whole, so text inside them is never taken for another attribute.
fn attribute_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(\s+([^\s"'=<>/]+))(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#)
            .expect("invalid attribute regex")
    })
}

fn tag_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^<[^\s/>]+").expect("invalid tag name regex"))
}

/// First attribute of `tag` named exactly `name`, ignoring ASCII case.
fn find_attribute<'a>(tag: &'a str, name: &str) -> Option<Captures<'a>> {
    attribute_pattern()
        .captures_iter(tag)
        .find(|captures| captures[2].eq_ignore_ascii_case(name))
}

fn attribute_value<'a>(captures: &Captures<'a>) -> &'a str {
    (3..=5)
        .find_map(|group| captures.get(group))
        .map_or("", |value| value.as_str())
}

/// Escape the quote characters of a value written inside a quoted attribute.
pub fn encode_attribute(value: &str) -> String {
    value.replace('"', "&quot;").replace('\'', "&#39;")
}

/// Value of attribute `name` in `tag`.
///
/// Returns `Some("")` for attributes written without a value and `None` when the
/// attribute is absent.
pub fn get_attr(tag: &str, name: &str) -> Option<String> {
    find_attribute(tag, name).map(|captures| attribute_value(&captures).to_string())
}

/// Set attribute `name` to `value`, appending it after the tag name when missing.
///
/// A single-quoted value stays single-quoted; everything else is written
/// double-quoted. Embedded quotes are escaped.
pub fn set_attr(tag: &str, name: &str, value: &str) -> String {
    let encoded = encode_attribute(value);
    if let Some(captures) = find_attribute(tag, name) {
        let (Some(whole), Some(key)) = (captures.get(0), captures.get(1)) else {
            return tag.to_string();
        };
        let quote = if captures.get(4).is_some() { '\'' } else { '"' };
        return format!(
            "{}{}={quote}{}{quote}{}",
            &tag[..whole.start()],
            key.as_str(),
            encoded,
            &tag[whole.end()..]
        );
    }

    match tag_name_pattern().find(tag) {
        Some(tag_name) => format!(
            "{} {}=\"{}\"{}",
            tag_name.as_str(),
            name,
            encoded,
            &tag[tag_name.end()..]
        ),
        None => tag.to_string(),
    }
}

/// Remove the first occurrence of attribute `name`.
pub fn remove_attr(tag: &str, name: &str) -> String {
    match find_attribute(tag, name).and_then(|captures| captures.get(0)) {
        Some(whole) => format!("{}{}", &tag[..whole.start()], &tag[whole.end()..]),
        None => tag.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_quoted_unquoted_and_bare_attributes() {
        let tag = r#"<script src="a.js" type='text/template' data-x=1 defer>"#;
        assert_eq!(get_attr(tag, "src").as_deref(), Some("a.js"));
        assert_eq!(get_attr(tag, "TYPE").as_deref(), Some("text/template"));
        assert_eq!(get_attr(tag, "data-x").as_deref(), Some("1"));
        assert_eq!(get_attr(tag, "defer").as_deref(), Some(""));
        assert_eq!(get_attr(tag, "async"), None);
    }

    #[test]
    fn does_not_confuse_prefixed_names() {
        let tag = r#"<img data-src="lazy.png" src="a.png">"#;
        assert_eq!(get_attr(tag, "src").as_deref(), Some("a.png"));
        assert_eq!(get_attr(tag, "data-src").as_deref(), Some("lazy.png"));
    }

    #[test]
    fn hyphenated_names_do_not_shadow_shorter_ones() {
        let tag = r#"<object data-kind="x" data="../movie.swf">"#;
        assert_eq!(get_attr(tag, "data").as_deref(), Some("../movie.swf"));
        assert_eq!(
            set_attr(tag, "data", "movie.swf?v=1"),
            r#"<object data-kind="x" data="movie.swf?v=1">"#
        );
        assert_eq!(
            remove_attr(r#"<script src-map="m" src="a.js">"#, "src"),
            r#"<script src-map="m">"#
        );
        assert_eq!(get_attr(r#"<link href-lang="x">"#, "href"), None);
    }

    #[test]
    fn ignores_names_inside_values() {
        let tag = r#"<img alt="a src=b.png" src="c.png">"#;
        assert_eq!(get_attr(tag, "src").as_deref(), Some("c.png"));
    }

    #[test]
    fn keeps_single_quotes_and_quotes_bare_values() {
        assert_eq!(
            set_attr("<img src='a.png' alt=x>", "src", "b.png"),
            "<img src='b.png' alt=x>"
        );
        assert_eq!(
            set_attr("<img alt=x src=a.png>", "src", "b.png"),
            r#"<img alt=x src="b.png">"#
        );
    }

    #[test]
    fn appends_missing_attributes_after_tag_name() {
        assert_eq!(
            set_attr("<link rel=stylesheet>", "href", "a.css"),
            r#"<link href="a.css" rel=stylesheet>"#
        );
        assert_eq!(set_attr("<br/>", "class", "x"), r#"<br class="x"/>"#);
    }

    #[test]
    fn escapes_quotes_in_values() {
        assert_eq!(
            set_attr("<a>", "href", r#"say "hi" & 'bye'?a=1&b=2"#),
            r#"<a href="say &quot;hi&quot; & &#39;bye&#39;?a=1&b=2">"#
        );
    }

    #[test]
    fn removes_attributes() {
        assert_eq!(
            remove_attr(r#"<script type="text/javascript" src="a.js">"#, "src"),
            r#"<script type="text/javascript">"#
        );
        assert_eq!(remove_attr("<script>", "src"), "<script>");
    }
}
