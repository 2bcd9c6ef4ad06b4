//! `@@include` directive expansion.
//!
//! ```text
//! @@include('partials/header.html')
//! @@include("partials/card.html", { "title": "Hello", "count": 3 })
//! ```
//!
//! Paths resolve against the directory of the including file. The optional
//! JSON object is merged over the parent context; inside the included file
//! `@@name` is replaced by the value of `name` when the context has it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};

/// Variables visible to an included file.
pub type Context = Map<String, Value>;

const DIRECTIVE: &str = "@@include(";

static VARIABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@@([A-Za-z_][A-Za-z0-9_]*)").expect("Invalid include variable regex")
});

/// Errors raised while expanding includes.
#[derive(Debug, thiserror::Error)]
pub enum IncludeError {
    #[error("Failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("{from}:{line}: included file not found: {target}")]
    NotFound {
        target: PathBuf,
        from: PathBuf,
        line: usize,
    },

    #[error("{file}:{line}: malformed include: {message}")]
    Malformed {
        file: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Include cycle: {chain}")]
    Cycle { chain: String },
}

/// Expand every include reachable from `path`.
pub fn expand_file(path: &Path) -> Result<String, IncludeError> {
    let mut stack = Vec::new();
    expand(path, &Context::new(), &mut stack)
}

fn expand(path: &Path, context: &Context, stack: &mut Vec<PathBuf>) -> Result<String, IncludeError> {
    let canonical = fs::canonicalize(path).map_err(|e| IncludeError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    if let Some(start) = stack.iter().position(|p| *p == canonical) {
        let chain = stack[start..]
            .iter()
            .chain(std::iter::once(&canonical))
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(" -> ");
        return Err(IncludeError::Cycle { chain });
    }

    let source = fs::read_to_string(&canonical).map_err(|e| IncludeError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    let source = substitute(&source, context);

    stack.push(canonical);
    let result = expand_directives(path, &source, context, stack);
    stack.pop();

    result
}

fn expand_directives(
    path: &Path,
    source: &str,
    context: &Context,
    stack: &mut Vec<PathBuf>,
) -> Result<String, IncludeError> {
    let dir = path.parent().unwrap_or(Path::new(""));
    let mut output = String::with_capacity(source.len());
    let mut rest = source;
    let mut consumed = 0;

    while let Some(found) = rest.find(DIRECTIVE) {
        output.push_str(&rest[..found]);
        let offset = consumed + found;
        let line = line_of(source, offset);

        let directive = parse_directive(&rest[found + DIRECTIVE.len()..]).map_err(|message| {
            IncludeError::Malformed {
                file: path.to_path_buf(),
                line,
                message,
            }
        })?;

        let target = dir.join(&directive.target);
        if !target.is_file() {
            return Err(IncludeError::NotFound {
                target,
                from: path.to_path_buf(),
                line,
            });
        }

        let mut child = context.clone();
        child.extend(directive.context);
        output.push_str(&expand(&target, &child, stack)?);

        let advance = found + DIRECTIVE.len() + directive.length;
        consumed += advance;
        rest = &rest[advance..];
    }

    output.push_str(rest);
    Ok(output)
}

/// A parsed directive; `length` counts bytes after `@@include(` through `)`.
struct Directive {
    target: String,
    context: Context,
    length: usize,
}

fn parse_directive(input: &str) -> Result<Directive, String> {
    let mut pos = skip_whitespace(input, 0);

    let quote = input[pos..]
        .chars()
        .next()
        .filter(|c| *c == '\'' || *c == '"')
        .ok_or_else(|| "expected a quoted path".to_string())?;
    pos += 1;

    let close = input[pos..]
        .find(quote)
        .ok_or_else(|| "unterminated path string".to_string())?;
    let target = input[pos..pos + close].to_string();
    if target.is_empty() {
        return Err("empty include path".to_string());
    }
    pos = skip_whitespace(input, pos + close + 1);

    let mut context = Context::new();
    if input[pos..].starts_with(',') {
        pos = skip_whitespace(input, pos + 1);

        let mut stream = serde_json::Deserializer::from_str(&input[pos..]).into_iter::<Context>();
        match stream.next() {
            Some(Ok(map)) => context = map,
            Some(Err(e)) => return Err(format!("invalid context object: {e}")),
            None => return Err("expected a context object".to_string()),
        }
        pos = skip_whitespace(input, pos + stream.byte_offset());
    }

    if !input[pos..].starts_with(')') {
        return Err("expected ')'".to_string());
    }

    Ok(Directive {
        target,
        context,
        length: pos + 1,
    })
}

fn skip_whitespace(input: &str, from: usize) -> usize {
    let trimmed = input[from..].trim_start();
    input.len() - trimmed.len()
}

fn line_of(source: &str, offset: usize) -> usize {
    source[..offset].matches('\n').count() + 1
}

/// Replace `@@name` tokens that have a value in `context`.
fn substitute(source: &str, context: &Context) -> String {
    if context.is_empty() {
        return source.to_string();
    }

    VARIABLE_RE
        .replace_all(source, |caps: &Captures| {
            let name = &caps[1];
            match context.get(name) {
                Some(_) if name == "include" => caps[0].to_string(),
                Some(Value::String(s)) => s.clone(),
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
