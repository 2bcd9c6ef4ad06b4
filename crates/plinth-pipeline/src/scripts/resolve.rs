//! Module specifier resolution.
//!
//! Relative specifiers resolve against the importing file. Bare specifiers
//! resolve into `<root>/node_modules/<package>`, honouring the package's
//! `exports` map, then `module`, then `main`, then `index.js`.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

/// File suffixes tried for a specifier, in order.
const SUFFIXES: &[&str] = &["", ".js", ".mjs", "/index.js"];

/// Export conditions tried for a package `exports` entry, in order.
const CONDITIONS: &[&str] = &["browser", "import", "module", "default", "require"];

/// Resolve `specifier` imported from `from`.
pub fn resolve(specifier: &str, from: &Path, root: &Path) -> Option<PathBuf> {
    if is_relative(specifier) {
        let dir = from.parent().unwrap_or(Path::new(""));
        return resolve_file(&dir.join(specifier));
    }

    resolve_package(specifier, root)
}

fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/')
}

fn resolve_file(base: &Path) -> Option<PathBuf> {
    let text = base.to_string_lossy();
    SUFFIXES
        .iter()
        .map(|suffix| PathBuf::from(format!("{text}{suffix}")))
        .find(|candidate| candidate.is_file())
}

/// Split `@scope/name/sub/path` or `name/sub/path` into package and subpath.
pub fn split_package(specifier: &str) -> (&str, Option<&str>) {
    let segments = if specifier.starts_with('@') { 2 } else { 1 };

    let mut end = 0;
    for _ in 0..segments {
        match specifier[end..].find('/') {
            Some(i) => end += i + 1,
            None => return (specifier, None),
        }
    }

    let package = &specifier[..end - 1];
    let sub = &specifier[end..];
    (package, (!sub.is_empty()).then_some(sub))
}

fn resolve_package(specifier: &str, root: &Path) -> Option<PathBuf> {
    let (name, subpath) = split_package(specifier);
    let dir = root.join("node_modules").join(name);
    if !dir.is_dir() {
        return None;
    }

    let manifest: Option<Value> = fs::read_to_string(dir.join("package.json"))
        .ok()
        .and_then(|text| serde_json::from_str(&text).ok());

    if let Some(exports) = manifest.as_ref().and_then(|m| m.get("exports")) {
        let key = match subpath {
            Some(sub) => format!("./{sub}"),
            None => ".".to_string(),
        };
        if let Some(target) = resolve_exports(exports, &key) {
            if let Some(found) = resolve_file(&dir.join(target.trim_start_matches("./"))) {
                return Some(found);
            }
        }
    }

    if let Some(sub) = subpath {
        return resolve_file(&dir.join(sub));
    }

    let entry = manifest.as_ref().and_then(|m| {
        ["module", "main"]
            .iter()
            .find_map(|field| m.get(*field).and_then(Value::as_str))
            .map(str::to_string)
    });

    match entry {
        Some(entry) => resolve_file(&dir.join(entry.trim_start_matches("./")))
            .or_else(|| resolve_file(&dir.join("index"))),
        None => resolve_file(&dir.join("index")),
    }
}

/// Look `key` (`"."` or `"./sub"`) up in a package `exports` field.
pub fn resolve_exports(exports: &Value, key: &str) -> Option<String> {
    match exports {
        Value::String(target) if key == "." => Some(target.clone()),
        Value::Object(map) if map.keys().any(|k| k.starts_with('.')) => {
            if let Some(target) = map.get(key) {
                return pick_target(target, None);
            }

            map.iter().find_map(|(pattern, target)| {
                let (prefix, suffix) = pattern.split_once('*')?;
                let middle = key.strip_prefix(prefix)?.strip_suffix(suffix)?;
                pick_target(target, Some(middle))
            })
        }
        // A bare conditions object applies to "."
        Value::Object(_) | Value::Array(_) if key == "." => pick_target(exports, None),
        _ => None,
    }
}

fn pick_target(target: &Value, wildcard: Option<&str>) -> Option<String> {
    match target {
        Value::String(s) => Some(match wildcard {
            Some(w) => s.replace('*', w),
            None => s.clone(),
        }),
        Value::Object(conditions) => CONDITIONS
            .iter()
            .find_map(|c| conditions.get(*c).and_then(|t| pick_target(t, wildcard))),
        Value::Array(targets) => targets.iter().find_map(|t| pick_target(t, wildcard)),
        _ => None,
    }
}
