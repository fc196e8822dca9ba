// src/tasks/minify.rs

//! Production minification of script bundles.

use std::path::PathBuf;

use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;

/// Minified code plus its source map (JSON).
#[derive(Debug)]
pub struct Minified {
    pub code: String,
    pub map: String,
}

/// Minify a concatenated bundle. `name` is the bundle file name recorded in
/// the source map.
///
/// Bundles are loaded as classic scripts, so their top-level declarations
/// are globals other scripts may use. They are parsed in script mode and
/// top-level names are never mangled, which also keeps the compressor from
/// dropping them as unused.
pub fn minify_js(source: &str, name: &str) -> Result<Minified, String> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::script()).parse();
    if let Some(err) = ret.errors.first() {
        return Err(err.to_string());
    }

    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions {
            top_level: Some(false),
            ..MangleOptions::default()
        }),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);

    let out = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            source_map_path: Some(PathBuf::from(name)),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program);

    let map = out
        .map
        .ok_or_else(|| "code generator produced no source map".to_string())?;

    Ok(Minified {
        code: out.code,
        map: map.to_json_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minified_output_is_smaller_and_mapped() {
        let source = "// FILE: a.js\nvar X = 1;\n\n// FILE: b.js\nfunction add(first, second) {\n  return first + second;\n}\n";
        let out = minify_js(source, "app.js").unwrap();

        assert!(out.code.len() < source.len());
        assert!(!out.code.contains("FILE:"));
        assert!(out.map.contains("\"version\":3"));
    }

    #[test]
    fn top_level_globals_survive() {
        let out = minify_js("var X = 1;\n", "app.js").unwrap();
        assert!(out.code.contains("X=1"), "{}", out.code);

        let source = "var X = 1;\nvar Y = 2;\nfunction greet(name) {\n  var greeting = 'hi ' + name;\n  return greeting;\n}\n";
        let out = minify_js(source, "app.js").unwrap();
        for global in ["X", "Y", "greet"] {
            assert!(out.code.contains(global), "{global} missing from {}", out.code);
        }
        assert!(!out.code.contains("greeting"));
    }

    #[test]
    fn unparsable_input_is_an_error() {
        assert!(minify_js("var = ;", "app.js").is_err());
    }
}
