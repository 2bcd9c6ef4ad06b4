//! ES module syntax to registry factory bodies.
//!
//! Import declarations become `require` calls, export declarations lose
//! their `export` keyword and every exported name is published through a
//! getter on `exports`. CommonJS `require("...")` calls are left in place
//! and recorded as dependencies. Edits never add or remove newlines, so line numbers
//! in the rewritten body match the input.

use std::path::Path;

use oxc::allocator::Allocator;
use oxc::ast::ast::{
    CallExpression, Declaration, ExportDefaultDeclarationKind, ImportDeclarationSpecifier,
    ModuleExportName, Statement,
};
use oxc::ast_visit::{walk, Visit};
use oxc::parser::Parser;
use oxc::span::{GetSpan, SourceType};

use super::ScriptError;

/// Local binding that holds an anonymous default export.
const DEFAULT_LOCAL: &str = "__plinth_default";

/// A module body ready to be wrapped in a factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenModule {
    pub code: String,

    /// Module specifiers: ESM sources first, then `require` calls, each in
    /// first-appearance order
    pub specifiers: Vec<String>,
}

struct Edit {
    start: usize,
    end: usize,
    text: String,
}

#[derive(Default)]
struct Rewriter {
    edits: Vec<Edit>,
    getters: Vec<(String, String)>,
    specifiers: Vec<String>,
    namespaces: usize,
}

impl Rewriter {
    fn replace(&mut self, start: u32, end: u32, text: impl Into<String>) {
        self.edits.push(Edit {
            start: start as usize,
            end: end as usize,
            text: text.into(),
        });
    }

    fn depend(&mut self, specifier: &str) {
        if !self.specifiers.iter().any(|s| s == specifier) {
            self.specifiers.push(specifier.to_string());
        }
    }

    fn require(&mut self, specifier: &str) -> String {
        self.depend(specifier);
        format!("require({})", quote(specifier))
    }

    fn namespace(&mut self) -> String {
        let name = format!("__plinth_m{}", self.namespaces);
        self.namespaces += 1;
        name
    }

    fn export(&mut self, exported: &str, expression: String) {
        self.getters.push((exported.to_string(), expression));
    }
}

/// Rewrite one module.
pub fn rewrite(source: &str, path: &Path) -> Result<RewrittenModule, ScriptError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::mjs()).parse();
    if let Some(error) = ret.errors.first() {
        return Err(ScriptError::Syntax {
            path: path.to_path_buf(),
            message: error.to_string(),
        });
    }

    let mut rw = Rewriter::default();

    for statement in &ret.program.body {
        match statement {
            Statement::ImportDeclaration(decl) => {
                let call = rw.require(decl.source.value.as_str());
                let text = match &decl.specifiers {
                    Some(specifiers) if !specifiers.is_empty() => {
                        let ns = rw.namespace();
                        let mut text = format!("var {ns} = __plinth_interop({call});");
                        for specifier in specifiers {
                            let (local, member) = match specifier {
                                ImportDeclarationSpecifier::ImportSpecifier(s) => {
                                    (s.local.name.as_str(), Some(export_name(&s.imported)))
                                }
                                ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                                    (s.local.name.as_str(), Some("default".to_string()))
                                }
                                ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                                    (s.local.name.as_str(), None)
                                }
                            };
                            match member {
                                Some(member) => {
                                    text.push_str(&format!(" var {local} = {ns}[{}];", quote(&member)))
                                }
                                None => text.push_str(&format!(" var {local} = {ns};")),
                            }
                        }
                        text
                    }
                    _ => format!("{call};"),
                };
                rw.replace(decl.span.start, decl.span.end, text);
            }

            Statement::ExportNamedDeclaration(decl) => {
                if let Some(declaration) = &decl.declaration {
                    for name in declared_names(declaration) {
                        rw.export(&name, name.clone());
                    }
                    rw.replace(decl.span.start, declaration.span().start, "");
                    continue;
                }

                match &decl.source {
                    Some(source) => {
                        let call = rw.require(source.value.as_str());
                        let ns = rw.namespace();
                        for specifier in &decl.specifiers {
                            let expression =
                                format!("{ns}[{}]", quote(&export_name(&specifier.local)));
                            rw.export(&export_name(&specifier.exported), expression);
                        }
                        rw.replace(
                            decl.span.start,
                            decl.span.end,
                            format!("var {ns} = __plinth_interop({call});"),
                        );
                    }
                    None => {
                        for specifier in &decl.specifiers {
                            rw.export(&export_name(&specifier.exported), export_name(&specifier.local));
                        }
                        rw.replace(decl.span.start, decl.span.end, "");
                    }
                }
            }

            Statement::ExportDefaultDeclaration(decl) => {
                let inner = decl.declaration.span();
                let named = match &decl.declaration {
                    ExportDefaultDeclarationKind::FunctionDeclaration(f) => {
                        f.id.as_ref().map(|id| id.name.to_string())
                    }
                    ExportDefaultDeclarationKind::ClassDeclaration(c) => {
                        c.id.as_ref().map(|id| id.name.to_string())
                    }
                    _ => None,
                };

                match named {
                    Some(name) => {
                        rw.replace(decl.span.start, inner.start, "");
                        rw.export("default", name);
                    }
                    None => {
                        rw.replace(decl.span.start, inner.start, format!("var {DEFAULT_LOCAL} = "));
                        if decl.span.end == inner.end {
                            rw.replace(inner.end, inner.end, ";");
                        }
                        rw.export("default", DEFAULT_LOCAL.to_string());
                    }
                }
            }

            Statement::ExportAllDeclaration(decl) => {
                let call = rw.require(decl.source.value.as_str());
                let text = match &decl.exported {
                    Some(exported) => {
                        let ns = rw.namespace();
                        rw.export(&export_name(exported), ns.clone());
                        format!("var {ns} = __plinth_interop({call});")
                    }
                    None => format!("__plinth_star(exports, __plinth_interop({call}));"),
                };
                rw.replace(decl.span.start, decl.span.end, text);
            }

            _ => {}
        }
    }

    let mut requires = RequireCalls::default();
    requires.visit_program(&ret.program);
    for specifier in &requires.specifiers {
        rw.depend(specifier);
    }

    Ok(RewrittenModule {
        code: apply(source, rw.edits, &rw.getters),
        specifiers: rw.specifiers,
    })
}

/// Static `require("...")` calls anywhere in a module.
#[derive(Default)]
struct RequireCalls {
    specifiers: Vec<String>,
}

impl<'a> Visit<'a> for RequireCalls {
    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if let Some(literal) = call.common_js_require() {
            self.specifiers.push(literal.value.to_string());
        }
        walk::walk_call_expression(self, call);
    }
}

fn apply(source: &str, mut edits: Vec<Edit>, getters: &[(String, String)]) -> String {
    edits.sort_by_key(|e| (e.start, e.end));

    let mut out = String::with_capacity(source.len() + 64);
    if !getters.is_empty() {
        let entries = getters
            .iter()
            .map(|(name, expr)| format!("{}: function () {{ return {expr}; }}", quote(name)))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!("__plinth_export(exports, {{ {entries} }}); "));
    }

    let mut cursor = 0;
    for edit in edits {
        if edit.start < cursor {
            continue;
        }
        out.push_str(&source[cursor..edit.start]);
        // Keep line numbers stable when a multi-line statement is replaced
        let newlines = source[edit.start..edit.end].matches('\n').count();
        out.push_str(&edit.text);
        out.push_str(&"\n".repeat(newlines));
        cursor = edit.end;
    }
    out.push_str(&source[cursor..]);

    out
}

fn declared_names(declaration: &Declaration) -> Vec<String> {
    match declaration {
        Declaration::VariableDeclaration(var) => var
            .declarations
            .iter()
            .flat_map(|d| d.id.get_binding_identifiers())
            .map(|id| id.name.to_string())
            .collect(),
        Declaration::FunctionDeclaration(f) => {
            f.id.iter().map(|id| id.name.to_string()).collect()
        }
        Declaration::ClassDeclaration(c) => c.id.iter().map(|id| id.name.to_string()).collect(),
        _ => Vec::new(),
    }
}

fn export_name(name: &ModuleExportName) -> String {
    name.name().to_string()
}

fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{text}\""))
}
