//! Transpilation and minification with oxc.

use std::path::{Path, PathBuf};

use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::semantic::SemanticBuilder;
use oxc::span::SourceType;
use oxc::transformer::{HelperLoaderMode, TransformOptions, Transformer};

use super::{helpers, ScriptError};

/// Output of [`transpile`].
#[derive(Debug, Clone)]
pub struct Transpiled {
    pub code: String,

    /// Inline `data:` URL of the source map, when one was requested
    pub source_map: Option<String>,
}

/// Lower a module to `target` syntax.
///
/// Helpers are referenced as `babelHelpers.<name>`; the bundle runtime
/// supplies them. `id` is the name recorded as the source in the map.
pub fn transpile(
    source: &str,
    path: &Path,
    id: &str,
    target: &str,
    source_map: bool,
) -> Result<Transpiled, ScriptError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::mjs()).parse();
    if let Some(error) = ret.errors.first() {
        return Err(ScriptError::Syntax {
            path: path.to_path_buf(),
            message: error.to_string(),
        });
    }
    let mut program = ret.program;

    let mut options = TransformOptions::from_target(target).map_err(|e| ScriptError::Transform {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    options.helper_loader.mode = HelperLoaderMode::External;

    let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();
    let ret = Transformer::new(&allocator, path, &options).build_with_scoping(scoping, &mut program);
    if let Some(error) = ret.errors.first() {
        return Err(ScriptError::Transform {
            path: path.to_path_buf(),
            message: error.to_string(),
        });
    }

    let output = Codegen::new()
        .with_options(CodegenOptions {
            source_map_path: source_map.then(|| PathBuf::from(id)),
            ..CodegenOptions::default()
        })
        .build(&program);

    if let Some(name) = helpers::unsupported(&output.code).into_iter().next() {
        return Err(ScriptError::Transform {
            path: path.to_path_buf(),
            message: format!("lowering to {target} needs the unsupported helper '{name}'"),
        });
    }

    Ok(Transpiled {
        code: output.code,
        source_map: output.map.map(|map| map.to_data_url()),
    })
}

/// Compress and mangle a script.
pub fn minify(source: &str) -> Result<String, ScriptError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::cjs()).parse();
    if let Some(error) = ret.errors.first() {
        return Err(ScriptError::Minify(error.to_string()));
    }
    let mut program = ret.program;

    let options = MinifierOptions {
        mangle: Some(MangleOptions::default()),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);

    Ok(Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program)
        .code)
}
