//! HTML scanning: script, style and link blocks, resource tags and comment directives.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use super::CommentStyle;
use super::attributes::{get_attr, remove_attr, set_attr};
use crate::builder::PackBuilder;
use crate::config::InlinePolicy;
use crate::graph::ModuleId;
use crate::inline::{InlineMode, Reference};
use crate::resolve::{is_external, split_query};
use crate::store::{FileStore, mime_to_extension, relative_url};

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(concat!(
            r#"(?is)(?P<script_open><script\b(?:'[^']*'|"[^"]*"|[^>])*>)(?P<script_body>.*?)(?P<script_close></script\s*>|$)"#,
            r#"|(?P<style_open><style\b(?:'[^']*'|"[^"]*"|[^>])*>)(?P<style_body>.*?)(?P<style_close></style\s*>|$)"#,
            r"|<!--(?P<comment>.*?)(?:-->|$)",
            r#"|<(?P<tag>img|embed|audio|video|link|object|source)\b(?:'[^']*'|"[^"]*"|[^>])*>"#,
        ))
        .expect("invalid HTML token regex")
    })
}

impl<S: FileStore> PackBuilder<S> {
    pub(crate) fn scan_html(&mut self, id: ModuleId) {
        let content = self.graph.module(id).content().into_owned();
        let content = token_pattern()
            .replace_all(&content, |captures: &Captures| self.rewrite_html_token(id, captures))
            .into_owned();
        let content = self.expand_url_directives(id, &content);
        self.graph.module_mut(id).set_content(content);
    }

    fn rewrite_html_token(&mut self, id: ModuleId, captures: &Captures<'_>) -> String {
        let all = &captures[0];

        if let Some(open) = captures.name("script_open") {
            return self.rewrite_script(
                id,
                open.as_str(),
                &captures["script_body"],
                &captures["script_close"],
            );
        }
        if let Some(open) = captures.name("style_open") {
            return self.rewrite_style(
                id,
                open.as_str(),
                &captures["style_body"],
                &captures["style_close"],
            );
        }
        if let Some(body) = captures.name("comment") {
            return self
                .expand_comment(id, body.as_str(), CommentStyle::Html)
                .unwrap_or_else(|| all.to_string());
        }

        match captures.name("tag").map(|tag| tag.as_str().to_ascii_lowercase()) {
            Some(tag) if tag == "link" => self.rewrite_link(id, all),
            Some(tag) if tag == "object" => self.rewrite_attr(id, all, "data", InlineMode::Never),
            Some(_) => {
                let tag = self.rewrite_srcset(id, all);
                let tag = self.rewrite_attr(id, &tag, "src", InlineMode::DataUrl);
                self.rewrite_attr(id, &tag, "data-src", InlineMode::DataUrl)
            }
            None => all.to_string(),
        }
    }

    fn rewrite_script(&mut self, id: ModuleId, open: &str, body: &str, close: &str) -> String {
        let (open, body) = match get_attr(open, "src").filter(|src| !src.is_empty()) {
            Some(src) => match self.resolve_reference(id, &src, InlineMode::Content) {
                Reference::Inline(content) => (remove_attr(open, "src"), content),
                Reference::Url(url) => {
                    return format!("{}{}{}", set_attr(open, "src", &url), body, close);
                }
            },
            None => {
                let extension = match get_attr(open, "type") {
                    Some(mime) if !mime.trim().is_empty() => mime_to_extension(&mime),
                    _ => Some(".js"),
                };
                (open.to_string(), self.compile_block(id, body, extension))
            }
        };

        match self.extract_to_dest(id, &open, &body) {
            Some(url) => format!("{}{}", set_attr(&remove_attr(&open, "__dest"), "src", &url), close),
            None => format!("{open}{body}{close}"),
        }
    }

    fn rewrite_style(&mut self, id: ModuleId, open: &str, body: &str, close: &str) -> String {
        let extension = match get_attr(open, "type") {
            Some(mime) if !mime.trim().is_empty() => mime_to_extension(&mime),
            _ => Some(".css"),
        };
        let body = self.compile_block(id, body, extension);

        match self.extract_to_dest(id, open, &body) {
            Some(url) => {
                let link = format!("<link{}", open.get("<style".len()..).unwrap_or(">"));
                let link = set_attr(&remove_attr(&link, "__dest"), "rel", "stylesheet");
                set_attr(&link, "href", &url)
            }
            None => format!("{open}{body}{close}"),
        }
    }

    fn compile_block(&mut self, id: ModuleId, body: &str, extension: Option<&str>) -> String {
        match extension {
            Some(extension) if !body.trim().is_empty() => {
                self.compile_inline_block(id, body, extension)
            }
            _ => body.to_string(),
        }
    }

    /// Move a block body into the file named by the tag's `__dest` attribute.
    ///
    /// Returns the URL the tag should load instead, or `None` to keep the body in
    /// place: no usable `__dest`, an empty body, or inlining switched off.
    fn extract_to_dest(&mut self, id: ModuleId, open: &str, body: &str) -> Option<String> {
        if matches!(self.options.inline, Some(InlinePolicy::Never)) || body.trim().is_empty() {
            return None;
        }
        let dest = get_attr(open, "__dest").filter(|dest| !dest.is_empty() && !is_external(dest))?;
        let (path, query) = split_query(&dest);

        let from_dir = self.graph.module(id).file.dir().to_path_buf();
        let target = self.store.canonicalize(&from_dir.join(path));
        let file = self.extract(target, body);
        let url = relative_url(&file.path, &from_dir).unwrap_or_else(|| file.name.clone());
        Some(format!("{url}{query}"))
    }

    fn rewrite_link(&mut self, id: ModuleId, tag: &str) -> String {
        let Some(href) = get_attr(tag, "href").filter(|href| !href.is_empty()) else {
            return tag.to_string();
        };
        let rel = get_attr(tag, "rel").unwrap_or_default().trim().to_ascii_lowercase();

        match rel.as_str() {
            "" | "stylesheet" => match self.resolve_reference(id, &href, InlineMode::Content) {
                Reference::Inline(content) => {
                    let stripped = remove_attr(&remove_attr(tag, "rel"), "href");
                    let attributes = stripped["<link".len()..]
                        .trim_end_matches('>')
                        .trim_end_matches('/')
                        .trim_end();
                    format!("<style{attributes}>\n{content}\n</style>")
                }
                Reference::Url(url) => set_attr(tag, "href", &url),
            },
            "html" => match self.resolve_reference(id, &href, InlineMode::Content) {
                Reference::Inline(content) => content,
                Reference::Url(url) => set_attr(tag, "href", &url),
            },
            _ => self.rewrite_attr(id, tag, "href", InlineMode::Never),
        }
    }

    fn rewrite_attr(&mut self, id: ModuleId, tag: &str, name: &str, mode: InlineMode) -> String {
        match get_attr(tag, name).filter(|value| !value.is_empty()) {
            Some(value) => {
                let url = self.resolve_reference(id, &value, mode).into_string();
                set_attr(tag, name, &url)
            }
            None => tag.to_string(),
        }
    }

    fn rewrite_srcset(&mut self, id: ModuleId, tag: &str) -> String {
        let Some(srcset) = get_attr(tag, "srcset").filter(|value| !value.trim().is_empty()) else {
            return tag.to_string();
        };

        let candidates: Vec<String> = srcset
            .split(',')
            .map(|candidate| {
                let candidate = candidate.trim();
                let (url, descriptor) = candidate
                    .split_once(char::is_whitespace)
                    .unwrap_or((candidate, ""));
                let url = self.resolve_reference(id, url, InlineMode::DataUrl).into_string();
                if descriptor.trim().is_empty() {
                    url
                } else {
                    format!("{} {}", url, descriptor.trim())
                }
            })
            .collect();
        set_attr(tag, "srcset", &candidates.join(", "))
    }
}
