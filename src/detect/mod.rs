// src/detect/mod.rs

//! Change detection for incremental rebuilds.
//!
//! - [`filter_changed`] compares input modification times against the
//!   output they produce (conservative, timestamp based).
//! - [`IncrementalCache`] remembers per-task results for files that have
//!   not changed since they were last processed (content aware).
//!
//! Detection is not transactional: files written while it runs may or may
//! not be seen.

pub mod cache;
pub mod stamp;

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::files::SourceFile;

pub use cache::{CacheEntry, IncrementalCache};
pub use stamp::{compute_file_hash, mtime, FileStamp};

/// What an input is compared against.
#[derive(Debug, Clone, Copy)]
pub enum OutputRef<'a> {
    /// Each input maps to `dir/<input.relative>` (copy tasks).
    Mirror(&'a Path),
    /// Every input contributes to this one artifact (bundles, stylesheets).
    Single(&'a Path),
}

impl OutputRef<'_> {
    /// Output artifact corresponding to `file`.
    pub fn target_for(&self, file: &SourceFile) -> PathBuf {
        match self {
            OutputRef::Mirror(dir) => dir.join(&file.relative),
            OutputRef::Single(path) => path.to_path_buf(),
        }
    }
}

/// Keep the inputs that are strictly newer than their output.
///
/// If an output does not exist every input mapped to it counts as changed.
/// Inputs whose own mtime cannot be read are treated as changed.
pub fn filter_changed(files: &[SourceFile], reference: OutputRef<'_>) -> Vec<SourceFile> {
    let changed: Vec<SourceFile> = files
        .iter()
        .filter(|file| {
            let target = reference.target_for(file);
            match (mtime(&file.path), mtime(&target)) {
                (Some(src), Some(out)) => src > out,
                _ => true,
            }
        })
        .cloned()
        .collect();

    debug!(
        inputs = files.len(),
        changed = changed.len(),
        "change detection finished"
    );
    changed
}
