// src/watch/patterns.rs

use std::collections::HashSet;
use std::fmt;

use anyhow::{Context, Result};
use globset::GlobSet;

use crate::engine::TaskName;
use crate::errors::ConfigError;
use crate::files::build_globset;

/// One registered binding: when a path matches `globs`, trigger `tasks`.
#[derive(Clone)]
pub struct WatchBinding {
    patterns: Vec<String>,
    globs: GlobSet,
    tasks: Vec<TaskName>,
}

impl fmt::Debug for WatchBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchBinding")
            .field("patterns", &self.patterns)
            .field("tasks", &self.tasks)
            .finish_non_exhaustive()
    }
}

impl WatchBinding {
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn tasks(&self) -> &[TaskName] {
        &self.tasks
    }

    /// `rel_path` is relative to the project root, with forward slashes.
    pub fn matches(&self, rel_path: &str) -> bool {
        self.globs.is_match(rel_path)
    }
}

/// Explicit mapping from file globs to the tasks they re-run.
///
/// Bindings are not derived from the task graph: a change only re-runs the
/// tasks bound to it, never their dependents.
#[derive(Debug, Clone)]
pub struct WatchBindings {
    known: HashSet<TaskName>,
    bindings: Vec<WatchBinding>,
}

impl WatchBindings {
    /// `known_tasks` are the names a binding may refer to.
    pub fn new<I, S>(known_tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskName>,
    {
        Self {
            known: known_tasks.into_iter().map(Into::into).collect(),
            bindings: Vec::new(),
        }
    }

    pub fn register_binding<S: AsRef<str>>(&mut self, globs: &[S], tasks: &[&str]) -> Result<()> {
        for task in tasks {
            if !self.known.contains(*task) {
                return Err(ConfigError::UnknownTask(task.to_string()))
                    .context("registering watch binding");
            }
        }

        let patterns: Vec<String> = globs
            .iter()
            .map(|g| g.as_ref().trim_start_matches("./").to_string())
            .collect();
        if patterns.is_empty() {
            return Ok(());
        }

        let compiled = build_globset(&patterns)
            .with_context(|| format!("building watch globset for {tasks:?}"))?;

        self.bindings.push(WatchBinding {
            patterns,
            globs: compiled,
            tasks: tasks.iter().map(|t| t.to_string()).collect(),
        });
        Ok(())
    }

    /// Tasks bound to a changed path, each at most once, in registration order.
    pub fn tasks_for(&self, rel_path: &str) -> Vec<TaskName> {
        let mut out: Vec<TaskName> = Vec::new();
        for binding in self.bindings.iter().filter(|b| b.matches(rel_path)) {
            for task in &binding.tasks {
                if !out.contains(task) {
                    out.push(task.clone());
                }
            }
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = &WatchBinding> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings() -> WatchBindings {
        let mut b = WatchBindings::new(["images", "scripts", "styles"]);
        b.register_binding(&["source/assets/images/**/*.{png,svg}"], &["images"])
            .unwrap();
        b.register_binding(&["./source/assets/scripts/a.js", "source/assets/scripts/b.js"], &["scripts"])
            .unwrap();
        b.register_binding(&["source/assets/styles/**/*.scss"], &["styles"])
            .unwrap();
        b
    }

    #[test]
    fn changed_path_maps_to_bound_tasks_only() {
        let b = bindings();
        assert_eq!(b.tasks_for("source/assets/images/icons/x.svg"), vec!["images"]);
        assert_eq!(b.tasks_for("source/assets/scripts/a.js"), vec!["scripts"]);
        assert_eq!(b.tasks_for("source/assets/styles/_vars.scss"), vec!["styles"]);
        assert!(b.tasks_for("source/assets/scripts/c.js").is_empty());
        assert!(b.tasks_for("README.md").is_empty());
    }

    #[test]
    fn unknown_task_is_rejected() {
        let mut b = WatchBindings::new(["images"]);
        let err = b.register_binding(&["**/*.woff2"], &["fonts"]).unwrap_err();
        assert!(format!("{err:#}").contains("unknown task 'fonts'"));
        assert!(b.is_empty());
    }

    #[test]
    fn overlapping_bindings_trigger_each_task_once() {
        let mut b = WatchBindings::new(["scripts", "styles"]);
        b.register_binding(&["src/**/*.js"], &["scripts"]).unwrap();
        b.register_binding(&["src/app.js"], &["scripts", "styles"]).unwrap();
        assert_eq!(b.tasks_for("src/app.js"), vec!["scripts", "styles"]);
    }
}
