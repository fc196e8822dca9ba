// src/files.rs

//! Glob compilation and expansion.
//!
//! Patterns are written relative to the project root with forward slashes.
//! Expansion keeps the order in which patterns are declared; within a single
//! wildcard pattern, matches are returned sorted by path so the result never
//! depends on directory enumeration order.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

/// Characters that make a path segment a glob rather than a literal.
const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// A source file found by expanding a glob.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceFile {
    /// Path as used for I/O (project root joined with the relative path).
    pub path: PathBuf,
    /// Path relative to the glob's base directory; this is what gets
    /// mirrored into an output directory.
    pub relative: PathBuf,
    /// Path relative to the project root, with forward slashes.
    pub display: String,
}

pub fn is_glob(pattern: &str) -> bool {
    pattern.contains(GLOB_META)
}

/// The literal directory prefix of a pattern.
///
/// `source/assets/images/**/*.png` → `source/assets/images`;
/// for a literal file path it is the file's parent directory.
pub fn glob_base(pattern: &str) -> PathBuf {
    let mut base = PathBuf::new();
    let segments: Vec<&str> = pattern.split('/').collect();

    for (idx, segment) in segments.iter().enumerate() {
        let last = idx + 1 == segments.len();
        if segment.contains(GLOB_META) || last {
            break;
        }
        if !segment.is_empty() && *segment != "." {
            base.push(segment);
        }
    }

    base
}

fn compile(pattern: &str) -> Result<globset::Glob> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .with_context(|| format!("invalid glob pattern: {pattern}"))
}

/// Build a [`GlobSet`] from string patterns.
pub fn build_globset<S: AsRef<str>>(patterns: &[S]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        builder.add(compile(pat.as_ref())?);
    }
    Ok(builder.build()?)
}

fn matcher(pattern: &str) -> Result<GlobMatcher> {
    Ok(compile(pattern)?.compile_matcher())
}

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Returns `None` if the path is not under `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(rel.to_string_lossy().replace('\\', "/"))
}

/// Expand `patterns` (relative to `root`) into existing files.
///
/// Literal patterns that do not exist are returned in `missing` rather than
/// silently dropped; the caller decides whether that is fatal. Files matched
/// by more than one pattern are kept at their first position.
pub fn expand(root: &Path, patterns: &[String]) -> Result<Expansion> {
    let mut seen = HashSet::new();
    let mut expansion = Expansion::default();

    for pattern in patterns {
        let pattern = pattern.trim_start_matches("./");
        let base = glob_base(pattern);

        if !is_glob(pattern) {
            let path = root.join(pattern);
            if path.is_file() {
                let relative = Path::new(pattern)
                    .strip_prefix(&base)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|_| PathBuf::from(pattern));
                if seen.insert(path.clone()) {
                    expansion.files.push(SourceFile {
                        path,
                        relative,
                        display: pattern.to_string(),
                    });
                }
            } else {
                expansion.missing.push(path);
            }
            continue;
        }

        let glob = matcher(pattern)?;
        let base_dir = root.join(&base);
        if !base_dir.is_dir() {
            continue;
        }

        let walker = WalkDir::new(&base_dir).sort_by_file_name().follow_links(true);
        for entry in walker {
            let entry = entry.with_context(|| format!("walking {:?}", base_dir))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let Some(display) = relative_str(root, entry.path()) else {
                continue;
            };
            if !glob.is_match(&display) {
                continue;
            }

            let path = entry.path().to_path_buf();
            if !seen.insert(path.clone()) {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&base_dir)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| PathBuf::from(&display));

            expansion.files.push(SourceFile {
                path,
                relative,
                display,
            });
        }
    }

    Ok(expansion)
}

/// Result of [`expand`].
#[derive(Debug, Default)]
pub struct Expansion {
    pub files: Vec<SourceFile>,
    /// Literal (non-wildcard) patterns that did not resolve to a file.
    pub missing: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn glob_base_stops_at_first_wildcard() {
        assert_eq!(
            glob_base("source/assets/images/**/*.{jpg,png}"),
            PathBuf::from("source/assets/images")
        );
        assert_eq!(glob_base("source/index.html"), PathBuf::from("source"));
        assert_eq!(glob_base("*.js"), PathBuf::new());
    }

    #[test]
    fn expansion_preserves_pattern_order_and_mirrors_relative_paths() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/img/icons")).unwrap();
        fs::write(root.join("src/img/b.png"), "b").unwrap();
        fs::write(root.join("src/img/icons/a.svg"), "a").unwrap();
        fs::write(root.join("src/img/notes.txt"), "x").unwrap();
        fs::write(root.join("src/z.js"), "z").unwrap();

        let patterns = vec![
            "src/z.js".to_string(),
            "src/img/**/*.{png,svg}".to_string(),
        ];
        let exp = expand(root, &patterns).unwrap();

        let displays: Vec<_> = exp.files.iter().map(|f| f.display.as_str()).collect();
        assert_eq!(displays, vec!["src/z.js", "src/img/b.png", "src/img/icons/a.svg"]);
        assert_eq!(exp.files[2].relative, PathBuf::from("icons/a.svg"));
        assert_eq!(exp.files[0].relative, PathBuf::from("z.js"));
        assert!(exp.missing.is_empty());
    }

    #[test]
    fn missing_literal_paths_are_reported() {
        let dir = tempdir().unwrap();
        let exp = expand(dir.path(), &["nope.js".to_string()]).unwrap();
        assert!(exp.files.is_empty());
        assert_eq!(exp.missing, vec![dir.path().join("nope.js")]);
    }

    #[test]
    fn star_does_not_cross_directories() {
        let set = build_globset(&["src/*.js"]).unwrap();
        assert!(set.is_match("src/a.js"));
        assert!(!set.is_match("src/lib/a.js"));
    }
}
