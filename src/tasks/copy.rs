// src/tasks/copy.rs

use std::fs;

use tracing::{debug, info};

use crate::detect::{filter_changed, OutputRef};
use crate::errors::TaskError;
use crate::files;
use crate::tasks::{TaskContext, TaskReport, Transform};

/// Passthrough copy of one asset group (images, videos, index files).
///
/// Only inputs newer than their copy are written; the copy's fresh mtime is
/// what makes a second run a no-op.
#[derive(Debug, Clone)]
pub struct CopyTask {
    group: String,
}

impl CopyTask {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
        }
    }
}

impl Transform for CopyTask {
    fn label(&self) -> String {
        self.group.clone()
    }

    fn execute(&self, ctx: &TaskContext) -> TaskReport {
        let task = self.group.as_str();
        let root = &ctx.config.project_root;

        let globs = match ctx.config.resolve_source_globs(task) {
            Ok(globs) => globs,
            Err(source) => {
                return TaskReport::failed(TaskError::Config {
                    task: task.to_string(),
                    source,
                });
            }
        };
        let dest = match ctx.output_dir(task, task) {
            Ok(dest) => dest,
            Err(err) => return TaskReport::failed(err),
        };

        let expansion = match files::expand(root, &globs) {
            Ok(expansion) => expansion,
            Err(e) => {
                return TaskReport::failed(TaskError::io(
                    task,
                    root,
                    std::io::Error::other(format!("{e:#}")),
                ));
            }
        };

        let mut report = TaskReport::default();
        report.errors.extend(
            expansion
                .missing
                .into_iter()
                .map(|path| TaskError::MissingInput {
                    task: task.to_string(),
                    path,
                }),
        );

        let changed = filter_changed(&expansion.files, OutputRef::Mirror(&dest));
        if changed.is_empty() && report.errors.is_empty() {
            debug!(task, "nothing changed");
            return TaskReport::up_to_date();
        }

        for file in changed {
            let target = dest.join(&file.relative);
            if let Some(parent) = target.parent() {
                if let Err(e) = fs::create_dir_all(parent) {
                    report.errors.push(TaskError::io(task, parent, e));
                    continue;
                }
            }
            match fs::copy(&file.path, &target) {
                Ok(_) => {
                    debug!(task, from = %file.display, to = ?target, "copied");
                    report.files_written.push(target);
                }
                Err(e) => report.errors.push(TaskError::io(task, &file.path, e)),
            }
        }

        info!(task, written = report.files_written.len(), "copy finished");
        report
    }
}
