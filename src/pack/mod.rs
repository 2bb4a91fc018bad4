//! Packing a scanned module graph into one output text.

mod runtime;

pub use runtime::js_string;

use std::collections::HashSet;

use crate::graph::{BuildType, Flags, ModuleGraph, ModuleId, ModuleKind};

/// Packed output for module `root`, or `None` for binary resources.
///
/// Non-script modules are returned as scanned. Scripts are returned unchanged when
/// their build type is `nonmodule`, or `module`/`global` with nothing in their
/// require closure needing the loader. Everything else is wrapped with the
/// `__packer__` runtime, one registration per module in the closure, shims for the
/// Node globals whose providers are bundled and a trailer matching the build type.
pub fn pack_module(graph: &ModuleGraph, root: ModuleId) -> Option<String> {
  let module = graph.module(root);
  match module.kind {
    ModuleKind::Resource => None,
    ModuleKind::Js => Some(pack_script(graph, root)),
    ModuleKind::Html | ModuleKind::Css | ModuleKind::Text => Some(module.content().into_owned()),
  }
}

fn pack_script(graph: &ModuleGraph, root: ModuleId) -> String {
  let module = graph.module(root);
  let unwrapped = match module.build_type {
    BuildType::NonModule => true,
    BuildType::Module | BuildType::Global => !graph.closure_flags(root).needs_loader(),
    _ => false,
  };
  if unwrapped {
    return module.content().into_owned();
  }

  let order = graph.pack_order(root);
  let mut flags = Flags::default();
  let mut defined = HashSet::new();
  let mut body = String::new();
  for &id in &order {
    let dependency = graph.module(id);
    flags |= dependency.flags;
    match dependency.kind {
      ModuleKind::Js => {
        defined.insert(dependency.name());
        body.push_str(&runtime::define(dependency.name(), &dependency.content()));
      }
      ModuleKind::Css => body.push_str(&runtime::insert_style(&dependency.content())),
      ModuleKind::Html => {
        body.push_str(&js_string(&dependency.content()));
        body.push_str(";\n");
      }
      ModuleKind::Text | ModuleKind::Resource => {}
    }
  }
  log::debug!("packing {} with {} modules", module.name(), order.len());

  let mut output = runtime::preamble(flags.has_style_loader);
  output.push_str(&body);
  output.push_str(&runtime::shims(&flags, |name| defined.contains(name)));
  output.push_str(&runtime::trailer(module.build_type, module.name()));
  output
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::SourceFile;
  use pretty_assertions::assert_eq;
  use std::path::PathBuf;

  fn add(graph: &mut ModuleGraph, name: &str, content: &str) -> ModuleId {
    let file = SourceFile::new(
      PathBuf::from("/site").join(name),
      name.to_string(),
      content.as_bytes().to_vec(),
    );
    graph.insert(file, BuildType::Module)
  }

  #[test]
  fn resources_have_no_packed_form() {
    let mut graph = ModuleGraph::new();
    let image = add(&mut graph, "a.png", "png");
    let page = add(&mut graph, "a.html", "<p>");
    assert_eq!(pack_module(&graph, image), None);
    assert_eq!(pack_module(&graph, page).as_deref(), Some("<p>"));
  }

  #[test]
  fn plain_scripts_take_the_fast_path() {
    let mut graph = ModuleGraph::new();
    let main = add(&mut graph, "main.js", "run();");
    let helper = add(&mut graph, "helper.js", "help();");
    graph.require(main, helper);
    assert_eq!(pack_module(&graph, main).as_deref(), Some("run();"));

    graph.module_mut(helper).flags.has_async_require = true;
    assert!(pack_module(&graph, main).unwrap().starts_with("var __packer__"));

    graph.module_mut(main).build_type = BuildType::NonModule;
    assert_eq!(pack_module(&graph, main).as_deref(), Some("run();"));
  }

  #[test]
  fn emits_dependencies_before_dependents() {
    let mut graph = ModuleGraph::new();
    let main = add(&mut graph, "main.js", "require(\"a.js\");");
    let a = add(&mut graph, "a.js", "require(\"b.js\");");
    let b = add(&mut graph, "b.js", "exports.b = 1;");
    let style = add(&mut graph, "b.css", "p {}");
    let page = add(&mut graph, "t.html", "<b>");
    graph.require(main, a);
    graph.require(a, b);
    graph.require(b, style);
    graph.require(b, page);
    graph.module_mut(main).flags.common_js = true;
    graph.module_mut(style).flags.has_style_loader = true;

    let output = pack_module(&graph, main).unwrap();
    let body = output.split("})();\n").nth(1).unwrap();
    assert_eq!(
      body,
      concat!(
        "__packer__.insertStyle(\"p {}\");\n",
        "\"<b>\";\n",
        "__packer__.define(\"b.js\", function (exports, module, require) {\nexports.b = 1;\n});\n",
        "__packer__.define(\"a.js\", function (exports, module, require) {\nrequire(\"b.js\");\n});\n",
        "__packer__.define(\"main.js\", function (exports, module, require) {\nrequire(\"a.js\");\n});\n",
        "__packer__.require(\"main.js\");\n",
      )
    );
    assert!(output.contains("insertStyle: insertStyle"));
  }

  #[test]
  fn omits_style_loader_without_stylesheets() {
    let mut graph = ModuleGraph::new();
    let main = add(&mut graph, "main.js", "exports.a = 1;");
    graph.module_mut(main).flags.common_js = true;
    graph.module_mut(main).build_type = BuildType::CommonJs;

    let output = pack_module(&graph, main).unwrap();
    assert!(!output.contains("insertStyle"));
    assert!(output.ends_with("module.exports = __packer__.require(\"main.js\");\n"));
  }

  #[test]
  fn shims_follow_closure_flags() {
    let mut graph = ModuleGraph::new();
    let main = add(&mut graph, "main.js", "");
    let dep = add(&mut graph, "dep.js", "");
    graph.require(main, dep);
    graph.module_mut(main).flags.common_js = true;
    graph.module_mut(dep).flags.global = true;

    let output = pack_module(&graph, main).unwrap();
    assert!(output.contains("this.global = (function () { return this; })();\n"));
    assert!(!output.contains("this.process"));
  }
}
