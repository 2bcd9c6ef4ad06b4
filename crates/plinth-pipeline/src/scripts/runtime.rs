//! Bundle runtime: a module registry and the prelude every factory relies on.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use super::graph::ModuleGraph;
use super::helpers;

const PRELUDE: &str = r#"var __plinth_cache = {};
function __plinth_esm(exports) {
  if (!exports.__esModule) Object.defineProperty(exports, "__esModule", { value: true });
}
function __plinth_export(exports, getters) {
  __plinth_esm(exports);
  for (var name in getters) Object.defineProperty(exports, name, { enumerable: true, get: getters[name] });
}
function __plinth_star(exports, ns) {
  __plinth_esm(exports);
  Object.keys(ns).forEach(function (key) {
    if (key === "default" || Object.prototype.hasOwnProperty.call(exports, key)) return;
    Object.defineProperty(exports, key, { enumerable: true, get: function () { return ns[key]; } });
  });
}
function __plinth_interop(m) {
  if (m && m.__esModule) return m;
  var ns = { "default": m };
  if (m && typeof m === "object") for (var key in m) if (key !== "default") ns[key] = m[key];
  return ns;
}
function __plinth_require(id) {
  var cached = __plinth_cache[id];
  if (cached) return cached.exports;
  var entry = __plinth_modules[id];
  if (!entry) throw new Error("Module not found: " + id);
  var module = __plinth_cache[id] = { exports: {} };
  entry[0].call(module.exports, module, module.exports, function (specifier) {
    return __plinth_require(entry[1][specifier]);
  });
  return module.exports;
}
"#;

/// Render the bundle.
///
/// With `eval_modules`, each factory body is evaluated from a string that
/// carries its inline source map and a `sourceURL`, so browser devtools show
/// every module as its own file.
pub fn render(graph: &ModuleGraph, eval_modules: bool) -> String {
    let mut out = String::from("(function () {\n");
    out.push_str(PRELUDE);

    let used: BTreeSet<String> = graph
        .modules
        .iter()
        .filter(|m| !m.vendored)
        .flat_map(|m| helpers::referenced(&m.code))
        .collect();
    out.push_str(&helpers::prelude(used.iter().map(String::as_str)));
    out.push_str("var __plinth_modules = {\n");

    for module in &graph.modules {
        let deps = serde_json::to_string(&module.dependencies).unwrap_or_else(|_| "{}".to_string());
        let body = if eval_modules {
            eval_body(&module.id, &module.code, module.source_map.as_deref())
        } else {
            module.code.clone()
        };

        let _ = writeln!(
            out,
            "{}: [function (module, exports, require) {{\n{}\n}}, {}],",
            json_string(&module.id),
            body,
            deps
        );
    }
    out.push_str("};\n");

    for entry in &graph.entries {
        let _ = writeln!(out, "__plinth_require({});", json_string(entry));
    }
    out.push_str("})();\n");

    out
}

fn eval_body(id: &str, code: &str, source_map: Option<&str>) -> String {
    let mut source = code.to_string();
    if let Some(map) = source_map {
        source.push_str("\n//# sourceMappingURL=");
        source.push_str(map);
    }
    source.push_str("\n//# sourceURL=plinth:///");
    source.push_str(id);

    format!("eval({});", json_string(&source))
}

fn json_string(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{text}\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripts::graph::Module;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn graph() -> ModuleGraph {
        let mut deps = BTreeMap::new();
        deps.insert("./b".to_string(), "src/js/b.js".to_string());

        ModuleGraph {
            modules: vec![
                Module {
                    id: "src/js/a.js".to_string(),
                    path: PathBuf::from("src/js/a.js"),
                    vendored: false,
                    code: "var b = require(\"./b\");\nconsole.log(b);".to_string(),
                    source_map: Some("data:application/json;base64,e30=".to_string()),
                    dependencies: deps,
                },
                Module {
                    id: "src/js/b.js".to_string(),
                    path: PathBuf::from("src/js/b.js"),
                    vendored: false,
                    code: "module.exports = 1;".to_string(),
                    source_map: None,
                    dependencies: BTreeMap::new(),
                },
            ],
            entries: vec!["src/js/a.js".to_string()],
        }
    }

    #[test]
    fn renders_registry_and_entry_calls() {
        let out = render(&graph(), false);

        assert!(out.starts_with("(function () {"));
        assert!(out.contains(r#""src/js/a.js": [function (module, exports, require) {"#));
        assert!(out.contains(r#"}, {"./b":"src/js/b.js"}],"#));
        assert!(out.contains("module.exports = 1;"));
        assert!(out.trim_end().ends_with("__plinth_require(\"src/js/a.js\");\n})();"));
    }

    #[test]
    fn eval_mode_embeds_map_and_source_url() {
        let out = render(&graph(), true);

        assert!(out.contains("eval(\"var b = require(\\\"./b\\\");\\nconsole.log(b);"));
        assert!(out.contains("//# sourceMappingURL=data:application/json;base64,e30="));
        assert!(out.contains("//# sourceURL=plinth:///src/js/b.js"));
    }

    #[test]
    fn declares_helpers_used_by_project_modules() {
        let mut graph = graph();
        graph.modules[1].code = "module.exports = babelHelpers.objectSpread2({}, {});".to_string();

        let out = render(&graph, false);

        assert!(out.contains("function _objectSpread2(e) {"));
        assert!(out.contains("var babelHelpers = { objectSpread2: _objectSpread2 };"));
        assert!(out.find("var babelHelpers").unwrap() < out.find("var __plinth_modules").unwrap());
    }

    #[test]
    fn vendored_code_does_not_pull_helpers() {
        let mut graph = graph();
        graph.modules[1].vendored = true;
        graph.modules[1].code = "module.exports = babelHelpers.extends({}, {});".to_string();

        let out = render(&graph, false);

        assert!(!out.contains("var babelHelpers"));
    }

    #[test]
    fn empty_graph_is_valid_bundle() {
        let out = render(&ModuleGraph::default(), false);

        assert!(out.contains("var __plinth_modules = {\n};"));
        assert!(!out.contains("__plinth_require(\""));
    }
}
