//! Module graph discovery.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Component, Path, PathBuf};

use super::resolve::resolve;
use super::rewrite::rewrite;
use super::transpile::transpile;
use super::ScriptError;

/// Options that shape how each module is prepared.
#[derive(Debug, Clone)]
pub struct GraphOptions<'a> {
    pub root: &'a Path,
    pub target: &'a str,
    pub source_maps: bool,
}

/// One module of the bundle.
#[derive(Debug, Clone)]
pub struct Module {
    /// Root-relative path with `/` separators
    pub id: String,
    pub path: PathBuf,

    /// Lives under `node_modules` (not transpiled)
    pub vendored: bool,

    /// Factory body
    pub code: String,

    /// Inline source map of the transpiled body
    pub source_map: Option<String>,

    /// Specifier to module id
    pub dependencies: BTreeMap<String, String>,
}

/// Every module reachable from the sources, in discovery order.
#[derive(Debug, Default)]
pub struct ModuleGraph {
    pub modules: Vec<Module>,
    pub entries: Vec<String>,
}

impl ModuleGraph {
    /// Walk the graph breadth-first from `sources` (in order).
    pub fn build(sources: &[PathBuf], options: &GraphOptions) -> Result<Self, ScriptError> {
        let root = fs::canonicalize(options.root).unwrap_or_else(|_| options.root.to_path_buf());

        let mut queue: VecDeque<PathBuf> = VecDeque::new();
        let mut seen = HashSet::new();
        let mut project = Vec::new();

        for source in sources {
            let path = canonical(source)?;
            project.push(module_id(&root, &path));
            if seen.insert(path.clone()) {
                queue.push_back(path);
            }
        }

        let mut modules = Vec::new();
        while let Some(path) = queue.pop_front() {
            let module = prepare(&path, &root, options)?;

            for dependency in module.dependencies.values() {
                // Ids outside the root are absolute and replace it on join
                let dep_path = root.join(dependency);
                if seen.insert(dep_path.clone()) {
                    queue.push_back(dep_path);
                }
            }

            modules.push(module);
        }

        let entries = find_entries(&modules, &project);

        Ok(Self { modules, entries })
    }

    pub fn get(&self, id: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.id == id)
    }
}

fn prepare(path: &Path, root: &Path, options: &GraphOptions) -> Result<Module, ScriptError> {
    let id = module_id(root, path);
    let vendored = path
        .components()
        .any(|c| matches!(c, Component::Normal(n) if n == "node_modules"));

    let source = fs::read_to_string(path).map_err(|e| ScriptError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    let (code, source_map) = if vendored {
        (source, None)
    } else {
        let out = transpile(&source, path, &id, options.target, options.source_maps)?;
        (out.code, out.source_map)
    };

    let rewritten = rewrite(&code, path)?;

    let mut dependencies = BTreeMap::new();
    for specifier in rewritten.specifiers {
        let resolved = resolve(&specifier, path, root).ok_or_else(|| ScriptError::Resolve {
            specifier: specifier.clone(),
            from: path.to_path_buf(),
        })?;
        let resolved = canonical(&resolved)?;
        dependencies.insert(specifier, module_id(root, &resolved));
    }

    tracing::debug!("Prepared module {} ({} deps)", id, dependencies.len());

    Ok(Module {
        id,
        path: path.to_path_buf(),
        vendored,
        code: rewritten.code,
        source_map,
        dependencies,
    })
}

/// Project modules that no other project module imports.
///
/// When every project module is imported by another (a cycle), all of them
/// are entries.
fn find_entries(modules: &[Module], project: &[String]) -> Vec<String> {
    let project_set: HashSet<&str> = project.iter().map(String::as_str).collect();

    let mut imported: HashMap<&str, usize> = HashMap::new();
    for module in modules.iter().filter(|m| project_set.contains(m.id.as_str())) {
        for dep in module.dependencies.values() {
            if dep != &module.id {
                *imported.entry(dep.as_str()).or_default() += 1;
            }
        }
    }

    let entries: Vec<String> = project
        .iter()
        .filter(|id| !imported.contains_key(id.as_str()))
        .cloned()
        .collect();

    if entries.is_empty() {
        project.to_vec()
    } else {
        entries
    }
}

fn canonical(path: &Path) -> Result<PathBuf, ScriptError> {
    fs::canonicalize(path).map_err(|e| ScriptError::Read {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Root-relative id with `/` separators; absolute for files outside the root.
pub fn module_id(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(relative) => relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn options(root: &Path) -> GraphOptions<'_> {
        GraphOptions {
            root,
            target: "es2015",
            source_maps: false,
        }
    }

    #[test]
    fn discovers_dependencies_and_entries() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        let main = write(root, "src/js/main.js", "import { add } from './math';\nconsole.log(add(1, 2));\n");
        let math = write(root, "src/js/math.js", "import pad from 'pad';\nexport const add = (a, b) => pad(a + b);\n");
        write(root, "node_modules/pad/index.js", "module.exports = function (x) { return x; };\n");

        let graph = ModuleGraph::build(&[main, math], &options(root)).unwrap();

        let ids: Vec<&str> = graph.modules.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["src/js/main.js", "src/js/math.js", "node_modules/pad/index.js"]);
        assert_eq!(graph.entries, vec!["src/js/main.js".to_string()]);

        let main = graph.get("src/js/main.js").unwrap();
        assert_eq!(main.dependencies.get("./math").map(String::as_str), Some("src/js/math.js"));

        let pad = graph.get("node_modules/pad/index.js").unwrap();
        assert!(pad.vendored);
        assert!(pad.code.contains("module.exports"));
    }

    #[test]
    fn follows_commonjs_requires_inside_packages() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        let main = write(root, "src/js/main.js", "import pkg from 'pkg';\nconsole.log(pkg);\n");
        write(root, "node_modules/pkg/index.js", "module.exports = require('./lib');\n");
        write(root, "node_modules/pkg/lib.js", "module.exports = 42;\n");

        let graph = ModuleGraph::build(&[main], &options(root)).unwrap();

        assert_eq!(graph.modules.len(), 3);
        let index = graph.get("node_modules/pkg/index.js").unwrap();
        assert_eq!(
            index.dependencies.get("./lib").map(String::as_str),
            Some("node_modules/pkg/lib.js")
        );
        assert!(graph.get("node_modules/pkg/lib.js").is_some());
    }

    #[test]
    fn independent_files_are_all_entries() {
        let temp = tempdir().unwrap();
        let a = write(temp.path(), "src/js/a.js", "console.log('a');\n");
        let b = write(temp.path(), "src/js/b.js", "console.log('b');\n");

        let graph = ModuleGraph::build(&[a, b], &options(temp.path())).unwrap();

        assert_eq!(graph.entries, vec!["src/js/a.js".to_string(), "src/js/b.js".to_string()]);
    }

    #[test]
    fn cycle_makes_every_module_an_entry() {
        let temp = tempdir().unwrap();
        let a = write(temp.path(), "src/js/a.js", "import './b';\n");
        let b = write(temp.path(), "src/js/b.js", "import './a';\n");

        let graph = ModuleGraph::build(&[a, b], &options(temp.path())).unwrap();

        assert_eq!(graph.modules.len(), 2);
        assert_eq!(graph.entries.len(), 2);
    }

    #[test]
    fn unresolved_import_names_importer() {
        let temp = tempdir().unwrap();
        let main = write(temp.path(), "src/js/main.js", "import x from './nope';\n");

        let err = ModuleGraph::build(&[main], &options(temp.path())).unwrap_err();

        match err {
            ScriptError::Resolve { specifier, from } => {
                assert_eq!(specifier, "./nope");
                assert!(from.ends_with("src/js/main.js"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn module_ids_use_forward_slashes() {
        let id = module_id(Path::new("/p"), Path::new("/p/src/js/main.js"));

        assert_eq!(id, "src/js/main.js");
    }
}
