//! JavaScript snippets emitted around packed modules.

use crate::graph::{BuildType, Flags};

const LOADER_HEAD: &str = r#"var __packer__ = (function () {
  var modules = Object.create(null);
  function define(name, factory) {
    modules[name] = { factory: factory, module: { exports: {} }, loaded: false };
  }
  function require(name, callback) {
    if (Array.isArray(name)) {
      var pending = name.length;
      var done = function () {
        if (--pending <= 0 && callback) {
          callback();
        }
      };
      if (!pending) {
        done();
      }
      name.forEach(function (url) {
        var script = document.createElement("script");
        script.src = url;
        script.onload = script.onerror = done;
        (document.head || document.documentElement).appendChild(script);
      });
      return;
    }
    var record = modules[name];
    if (!record) {
      throw new Error("Cannot find module: " + name);
    }
    if (!record.loaded) {
      record.loaded = true;
      record.factory.call(record.module.exports, record.module.exports, record.module, require);
    }
    return record.module.exports;
  }
"#;

const STYLE_LOADER: &str = r#"  function insertStyle(css) {
    var style = document.createElement("style");
    style.type = "text/css";
    style.appendChild(document.createTextNode(css));
    (document.head || document.getElementsByTagName("head")[0]).appendChild(style);
  }
"#;

const UMD_TRAILER: &str = r#"(function (root, factory) {
  if (typeof define === "function" && define.amd) {
    define([], factory);
  } else if (typeof module === "object" && module.exports) {
    module.exports = factory();
  } else {
    var exports = factory();
    for (var key in exports) {
      root[key] = exports[key];
    }
  }
})(this, function () {
  return __packer__.require(__ROOT__);
});
"#;

/// Double-quoted JavaScript string literal for `value`.
pub fn js_string(value: &str) -> String {
  serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value.escape_default()))
}

/// Loader runtime defining the `__packer__` namespace.
pub fn preamble(style_loader: bool) -> String {
  let mut output = String::from(LOADER_HEAD);
  if style_loader {
    output.push_str(STYLE_LOADER);
    output.push_str("  return { define: define, require: require, insertStyle: insertStyle };\n");
  } else {
    output.push_str("  return { define: define, require: require };\n");
  }
  output.push_str("})();\n");
  output
}

/// Registration of a JavaScript module.
pub fn define(name: &str, content: &str) -> String {
  format!(
    "__packer__.define({}, function (exports, module, require) {{\n{}\n}});\n",
    js_string(name),
    content
  )
}

/// Runtime insertion of a stylesheet.
pub fn insert_style(content: &str) -> String {
  format!("__packer__.insertStyle({});\n", js_string(content))
}

/// Assignments exposing Node globals for the flags that are set.
///
/// `global` needs no provider. The other shims read a provider module (`process`,
/// `buffer` or `timers`) and are emitted only when `defined` reports that module
/// as registered in the bundle.
pub fn shims(flags: &Flags, defined: impl Fn(&str) -> bool) -> String {
  let mut output = String::new();
  if flags.global {
    output.push_str("this.global = (function () { return this; })();\n");
  }
  let provided = [
    (flags.process, "process", "this.process = __packer__.require(\"process\");\n"),
    (flags.buffer, "buffer", "this.Buffer = __packer__.require(\"buffer\").Buffer;\n"),
    (
      flags.set_immediate,
      "timers",
      "this.setImmediate = __packer__.require(\"timers\").setImmediate;\n",
    ),
    (
      flags.clear_immediate,
      "timers",
      "this.clearImmediate = __packer__.require(\"timers\").clearImmediate;\n",
    ),
  ];
  for (used, provider, shim) in provided {
    if !used {
      continue;
    }
    if defined(provider) {
      output.push_str(shim);
    } else {
      log::debug!("no {provider} module in the bundle, leaving the global to the host");
    }
  }
  output
}

/// Statement that runs the root module in the shape `build_type` expects.
pub fn trailer(build_type: BuildType, root_name: &str) -> String {
  let root = js_string(root_name);
  match build_type {
    BuildType::Module | BuildType::Global | BuildType::NonModule => {
      format!("__packer__.require({root});\n")
    }
    BuildType::CommonJs => format!("module.exports = __packer__.require({root});\n"),
    BuildType::Amd => format!("define([], function () {{ return __packer__.require({root}); }});\n"),
    BuildType::Cmd => format!(
      "define(function (require, exports, module) {{ module.exports = __packer__.require({root}); }});\n"
    ),
    BuildType::Umd => UMD_TRAILER.replace("__ROOT__", &root),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn style_loader_is_optional() {
    assert!(!preamble(false).contains("insertStyle"));
    assert!(preamble(true).contains("insertStyle: insertStyle"));
    assert!(preamble(false).starts_with("var __packer__ = "));
    assert!(preamble(false).ends_with("})();\n"));
  }

  #[test]
  fn shims_only_cover_set_flags() {
    let flags = Flags {
      buffer: true,
      clear_immediate: true,
      ..Flags::default()
    };
    assert_eq!(
      shims(&flags, |_| true),
      "this.Buffer = __packer__.require(\"buffer\").Buffer;\n\
       this.clearImmediate = __packer__.require(\"timers\").clearImmediate;\n"
    );
    assert_eq!(shims(&Flags::default(), |_| true), "");
  }

  #[test]
  fn shims_need_their_provider() {
    let flags = Flags {
      global: true,
      process: true,
      set_immediate: true,
      ..Flags::default()
    };
    assert_eq!(
      shims(&flags, |name| name == "timers"),
      "this.global = (function () { return this; })();\n\
       this.setImmediate = __packer__.require(\"timers\").setImmediate;\n"
    );
  }

  #[test]
  fn trailers_follow_build_type() {
    assert_eq!(trailer(BuildType::Global, "a.js"), "__packer__.require(\"a.js\");\n");
    assert_eq!(
      trailer(BuildType::CommonJs, "a.js"),
      "module.exports = __packer__.require(\"a.js\");\n"
    );
    assert_eq!(
      trailer(BuildType::Cmd, "a.js"),
      "define(function (require, exports, module) { module.exports = __packer__.require(\"a.js\"); });\n"
    );
    let umd = trailer(BuildType::Umd, "a.js");
    assert!(umd.contains("define.amd"));
    assert!(umd.contains("return __packer__.require(\"a.js\");"));
  }

  #[test]
  fn escapes_names_and_styles() {
    assert_eq!(
      insert_style("a::before { content: \"x\"; }\n"),
      "__packer__.insertStyle(\"a::before { content: \\\"x\\\"; }\\n\");\n"
    );
    assert!(define("dir/a\".js", "x").starts_with("__packer__.define(\"dir/a\\\".js\", "));
  }
}
