// src/tasks/mod.rs

//! Asset transforms.
//!
//! Every task body implements [`Transform`]: given a [`TaskContext`] (config,
//! mode and the session's incremental cache) it writes its outputs and
//! returns a [`TaskReport`]. Transforms are synchronous; the executor runs
//! them on Tokio's blocking pool.
//!
//! - [`copy`]: images, videos and index passthrough.
//! - [`script`]: lint, concatenate and (in production) minify one bundle.
//! - [`style`]: compile, prefix and minify the stylesheet.

pub mod copy;
pub mod lint;
pub mod minify;
pub mod script;
pub mod style;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{
    BuildConfig, Mode, GROUP_IMAGES, GROUP_INDEX, GROUP_SCRIPTS, GROUP_STYLES, GROUP_VIDEOS,
};
use crate::detect::IncrementalCache;
use crate::errors::TaskError;

pub use copy::CopyTask;
pub use script::ScriptBundleTask;
pub use style::StyleTask;

/// Names of the tasks in the standard asset graph, in declaration order.
pub const STANDARD_TASKS: [&str; 5] = [
    GROUP_IMAGES,
    GROUP_VIDEOS,
    GROUP_INDEX,
    GROUP_SCRIPTS,
    GROUP_STYLES,
];

/// Everything a transform may read while it runs.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub config: Arc<BuildConfig>,
    pub mode: Mode,
    pub cache: Arc<IncrementalCache>,
}

impl TaskContext {
    pub fn new(config: Arc<BuildConfig>, mode: Mode, cache: Arc<IncrementalCache>) -> Self {
        Self {
            config,
            mode,
            cache,
        }
    }

    /// Output directory of a group for the active mode.
    pub fn output_dir(&self, task: &str, group: &str) -> Result<PathBuf, TaskError> {
        self.config
            .resolve_output_path(group, self.mode)
            .map_err(|source| TaskError::Config {
                task: task.to_string(),
                source,
            })
    }
}

/// One unit of asset work.
pub trait Transform: Send + Sync + fmt::Debug {
    /// Label used in logs (a task name, or `task[unit]` for fan-out units).
    fn label(&self) -> String;

    fn execute(&self, ctx: &TaskContext) -> TaskReport;
}

/// What a transform did.
#[derive(Debug, Default)]
pub struct TaskReport {
    pub files_written: Vec<PathBuf>,
    pub errors: Vec<TaskError>,
    /// Set when change detection found nothing to do.
    pub up_to_date: bool,
}

impl TaskReport {
    pub fn up_to_date() -> Self {
        Self {
            up_to_date: true,
            ..Self::default()
        }
    }

    pub fn failed(error: TaskError) -> Self {
        Self {
            errors: vec![error],
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn is_fatal(&self) -> bool {
        self.errors.iter().any(TaskError::is_fatal)
    }

    /// Fold the report of another fan-out unit into this one.
    pub fn merge(&mut self, other: TaskReport) {
        self.up_to_date &= other.up_to_date;
        self.files_written.extend(other.files_written);
        self.errors.extend(other.errors);
    }
}

/// Transforms for the standard graph, keyed by task name.
///
/// `scripts` fans out into one unit per `[[files.js]]` bundle.
pub fn standard_units(cfg: &BuildConfig) -> Vec<(&'static str, Vec<Arc<dyn Transform>>)> {
    let scripts: Vec<Arc<dyn Transform>> = cfg
        .script_bundles()
        .iter()
        .cloned()
        .map(|bundle| Arc::new(ScriptBundleTask::new(GROUP_SCRIPTS, bundle)) as Arc<dyn Transform>)
        .collect();

    vec![
        (GROUP_IMAGES, vec![Arc::new(CopyTask::new(GROUP_IMAGES)) as Arc<dyn Transform>]),
        (GROUP_VIDEOS, vec![Arc::new(CopyTask::new(GROUP_VIDEOS)) as Arc<dyn Transform>]),
        (GROUP_INDEX, vec![Arc::new(CopyTask::new(GROUP_INDEX)) as Arc<dyn Transform>]),
        (GROUP_SCRIPTS, scripts),
        (GROUP_STYLES, vec![Arc::new(StyleTask::new(GROUP_STYLES)) as Arc<dyn Transform>]),
    ]
}

/// Write `contents` to `path`, creating parent directories.
pub(crate) fn write_output(task: &str, path: &std::path::Path, contents: &[u8]) -> Result<(), TaskError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| TaskError::io(task, parent, e))?;
    }
    std::fs::write(path, contents).map_err(|e| TaskError::io(task, path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merging_keeps_errors_and_files_from_all_units() {
        let mut a = TaskReport {
            files_written: vec!["a.js".into()],
            ..TaskReport::default()
        };
        let b = TaskReport::failed(TaskError::MissingInput {
            task: "scripts".into(),
            path: "b.js".into(),
        });

        a.merge(b);
        assert_eq!(a.files_written.len(), 1);
        assert!(a.is_fatal());
        assert!(!a.up_to_date);
    }

    #[test]
    fn merged_up_to_date_units_stay_up_to_date() {
        let mut total = TaskReport::up_to_date();
        total.merge(TaskReport::up_to_date());
        total.merge(TaskReport::up_to_date());
        assert!(total.up_to_date);
    }
}
