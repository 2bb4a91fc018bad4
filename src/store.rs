//! Access to source files on disk and the per-file helpers the scanners need.

use std::io;
use std::path::{Component, Path, PathBuf};

use base64::{Engine as _, engine::general_purpose};

/// Storage backend consulted by the resolver and the module graph.
pub trait FileStore {
  /// Returns `true` when `path` names an existing regular file.
  fn is_file(&self, path: &Path) -> bool;

  /// Read the full contents of `path`.
  fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

  /// Canonical identity of `path`, used to deduplicate modules.
  fn canonicalize(&self, path: &Path) -> PathBuf;
}

/// [`FileStore`] backed by the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskStore;

impl FileStore for DiskStore {
  fn is_file(&self, path: &Path) -> bool {
    path.is_file()
  }

  fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
    std::fs::read(path)
  }

  fn canonicalize(&self, path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| normalize(path))
  }
}

/// Lexically resolve `.` and `..` components without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
  let mut result = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        if !result.pop() {
          result.push(component);
        }
      }
      other => result.push(other),
    }
  }
  result
}

/// Root-relative, forward-slash name of `path`, or the full path when it lies outside `root`.
pub fn module_name(root: &Path, path: &Path) -> String {
  let relative = path.strip_prefix(root).unwrap_or(path);
  relative.to_string_lossy().replace('\\', "/")
}

/// Forward-slash path of `path` relative to `from_dir`, if one exists.
pub fn relative_url(path: &Path, from_dir: &Path) -> Option<String> {
  pathdiff::diff_paths(path, from_dir).map(|relative| relative.to_string_lossy().replace('\\', "/"))
}

/// One source file loaded into memory.
#[derive(Debug, Clone)]
pub struct SourceFile {
  /// Absolute path of the file (virtual for inline blocks).
  pub path: PathBuf,
  /// Display name, relative to the project root.
  pub name: String,
  /// Extension including the leading dot, or empty.
  pub extension: String,
  bytes: Vec<u8>,
}

impl SourceFile {
  /// Wrap already-loaded content.
  pub fn new(path: PathBuf, name: String, bytes: Vec<u8>) -> Self {
    let extension = extension_of(&name);
    Self {
      path,
      name,
      extension,
      bytes,
    }
  }

  /// Raw file content.
  pub fn bytes(&self) -> &[u8] {
    &self.bytes
  }

  /// File content decoded as UTF-8, replacing invalid sequences.
  pub fn text(&self) -> String {
    String::from_utf8_lossy(&self.bytes).into_owned()
  }

  /// Directory containing the file.
  pub fn dir(&self) -> &Path {
    self.path.parent().unwrap_or(Path::new(""))
  }

  /// Encode the file as a `data:` URL.
  pub fn base64_url(&self) -> String {
    format!(
      "data:{};base64,{}",
      extension_to_mime(&self.extension),
      general_purpose::STANDARD.encode(&self.bytes)
    )
  }

  /// Forward-slash path of this file relative to `from_dir`.
  pub fn relative_url(&self, from_dir: &Path) -> String {
    relative_url(&self.path, from_dir).unwrap_or_else(|| self.name.clone())
  }

  /// Expand `<name>`, `<ext>` and `<hash>` placeholders in `template`.
  ///
  /// `<hash>` is the first eight hex digits of the content digest.
  pub fn format_name(&self, template: &str) -> String {
    let stem = self
      .path
      .file_stem()
      .map(|stem| stem.to_string_lossy().into_owned())
      .unwrap_or_default();
    let mut result = template
      .replace("<name>", &stem)
      .replace("<ext>", self.extension.trim_start_matches('.'));
    if result.contains("<hash>") {
      let digest = blake3::hash(&self.bytes).to_hex();
      result = result.replace("<hash>", &digest.as_str()[..8]);
    }
    result
  }
}

fn extension_of(name: &str) -> String {
  let file_name = name.rsplit('/').next().unwrap_or(name);
  match file_name.rfind('.') {
    Some(index) if index > 0 => file_name[index..].to_string(),
    _ => String::new(),
  }
}

/// MIME type used when embedding a file with the given extension.
pub fn extension_to_mime(extension: &str) -> &'static str {
  match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
    "png" => "image/png",
    "jpg" | "jpeg" => "image/jpeg",
    "gif" => "image/gif",
    "svg" => "image/svg+xml",
    "webp" => "image/webp",
    "ico" => "image/x-icon",
    "bmp" => "image/bmp",
    "woff" => "font/woff",
    "woff2" => "font/woff2",
    "ttf" => "font/ttf",
    "otf" => "font/otf",
    "eot" => "application/vnd.ms-fontobject",
    "mp3" => "audio/mpeg",
    "ogg" => "audio/ogg",
    "wav" => "audio/wav",
    "mp4" => "video/mp4",
    "webm" => "video/webm",
    "js" => "text/javascript",
    "css" => "text/css",
    "html" | "htm" => "text/html",
    "json" => "application/json",
    "txt" | "text" | "md" => "text/plain",
    "wasm" => "application/wasm",
    _ => "application/octet-stream",
  }
}

/// Extension that source in a `<script type>` / `<style type>` block should be treated as.
pub fn mime_to_extension(mime: &str) -> Option<&'static str> {
  match mime.trim().to_ascii_lowercase().as_str() {
    "text/javascript" | "application/javascript" | "application/x-javascript" | "module" => {
      Some(".js")
    }
    "text/css" => Some(".css"),
    "text/html" | "text/template" | "text/x-template" => Some(".html"),
    "text/plain" => Some(".txt"),
    "application/json" => Some(".json"),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn file(path: &str, bytes: &[u8]) -> SourceFile {
    let path = PathBuf::from(path);
    let name = module_name(Path::new("/site"), &path);
    SourceFile::new(path, name, bytes.to_vec())
  }

  #[test]
  fn normalizes_parent_components() {
    assert_eq!(normalize(Path::new("/a/b/../c/./d.js")), PathBuf::from("/a/c/d.js"));
    assert_eq!(normalize(Path::new("../x")), PathBuf::from("../x"));
  }

  #[test]
  fn names_are_root_relative_with_forward_slashes() {
    let source = file("/site/assets/logo.png", b"");
    assert_eq!(source.name, "assets/logo.png");
    assert_eq!(source.extension, ".png");
  }

  #[test]
  fn encodes_data_urls_with_mime_type() {
    let source = file("/site/pixel.gif", &[0u8, 1, 2]);
    assert_eq!(source.base64_url(), "data:image/gif;base64,AAEC");
  }

  #[test]
  fn computes_relative_urls() {
    let source = file("/site/assets/logo.png", b"");
    assert_eq!(source.relative_url(Path::new("/site/pages")), "../assets/logo.png");
    assert_eq!(source.relative_url(Path::new("/site")), "assets/logo.png");
  }

  #[test]
  fn formats_name_placeholders() {
    let source = file("/site/app.js", b"content");
    let formatted = source.format_name("<name>.<ext>@<hash>");
    assert!(formatted.starts_with("app.js@"));
    assert_eq!(formatted.len(), "app.js@".len() + 8);
  }

  #[test]
  fn maps_script_types_to_extensions() {
    assert_eq!(mime_to_extension("text/css"), Some(".css"));
    assert_eq!(mime_to_extension("TEXT/TEMPLATE"), Some(".html"));
    assert_eq!(mime_to_extension("text/x-unknown"), None);
  }

  #[test]
  fn ignores_leading_dot_in_extension() {
    assert_eq!(extension_of(".gitignore"), "");
    assert_eq!(extension_of("dir.v2/file"), "");
    assert_eq!(extension_of("a/b.min.js"), ".js");
  }
}
