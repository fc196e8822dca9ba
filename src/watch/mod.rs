// src/watch/mod.rs

//! File watching.
//!
//! This module is responsible for:
//! - Compiling watch bindings (globs → task names).
//! - Wiring up a cross-platform filesystem watcher (`notify`).
//!
//! It does **not** know about task dependencies; it only turns filesystem
//! changes into task-level triggers.

pub mod patterns;
pub mod watcher;

use anyhow::Result;

use crate::config::{BuildConfig, GROUP_IMAGES, GROUP_INDEX, GROUP_SCRIPTS, GROUP_STYLES, GROUP_VIDEOS};
use crate::dag::TaskGraph;

pub use patterns::{WatchBinding, WatchBindings};
pub use watcher::{spawn_watcher, WatcherHandle};

/// One binding per built-in asset group: the group's source globs re-run
/// the task of the same name.
pub fn standard_bindings(cfg: &BuildConfig, graph: &TaskGraph) -> Result<WatchBindings> {
    let mut bindings = WatchBindings::new(graph.tasks().map(str::to_string));

    for group in [GROUP_IMAGES, GROUP_VIDEOS, GROUP_INDEX, GROUP_SCRIPTS, GROUP_STYLES] {
        if !graph.contains(group) {
            continue;
        }
        let globs = cfg.resolve_source_globs(group)?;
        bindings.register_binding(&globs, &[group])?;
    }

    Ok(bindings)
}
