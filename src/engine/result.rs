// src/engine/result.rs

use std::collections::BTreeMap;

use tracing::{error, info, warn};

use crate::engine::TaskName;
use crate::errors::TaskError;

/// How one task ended in a run.
#[derive(Debug)]
pub enum TaskStatus {
    Succeeded {
        files_written: usize,
        up_to_date: bool,
    },
    Failed {
        errors: Vec<TaskError>,
        fatal: bool,
        files_written: usize,
    },
    /// Never started; `by` is the upstream task whose fatal failure blocked it.
    Blocked { by: TaskName },
}

/// Structured outcome of one run of the task graph.
#[derive(Debug, Default)]
pub struct BuildResult {
    pub run_id: u64,
    pub tasks: BTreeMap<TaskName, TaskStatus>,
    /// First task to fail fatally, in completion order.
    pub first_fatal: Option<TaskName>,
}

impl BuildResult {
    /// True unless some task failed fatally (recoverable failures and
    /// skipped work do not count).
    pub fn is_success(&self) -> bool {
        self.first_fatal.is_none()
    }

    pub fn status(&self, task: &str) -> Option<&TaskStatus> {
        self.tasks.get(task)
    }

    /// The error that failed the run, if any.
    pub fn first_fatal_error(&self) -> Option<&TaskError> {
        let task = self.first_fatal.as_ref()?;
        match self.tasks.get(task)? {
            TaskStatus::Failed { errors, .. } => errors.iter().find(|e| e.is_fatal()),
            _ => None,
        }
    }

    pub fn files_written(&self) -> usize {
        self.tasks
            .values()
            .map(|status| match status {
                TaskStatus::Succeeded { files_written, .. }
                | TaskStatus::Failed { files_written, .. } => *files_written,
                TaskStatus::Blocked { .. } => 0,
            })
            .sum()
    }

    pub fn log_summary(&self) {
        for (task, status) in &self.tasks {
            match status {
                TaskStatus::Succeeded {
                    files_written,
                    up_to_date: true,
                } if *files_written == 0 => info!(task = %task, "up to date"),
                TaskStatus::Succeeded { files_written, .. } => {
                    info!(task = %task, files_written, "succeeded")
                }
                TaskStatus::Failed { errors, fatal, .. } => {
                    for err in errors {
                        if *fatal {
                            error!(task = %task, "{err}");
                        } else {
                            warn!(task = %task, "{err}");
                        }
                    }
                }
                TaskStatus::Blocked { by } => warn!(task = %task, blocked_by = %by, "skipped"),
            }
        }

        if self.is_success() {
            info!(run_id = self.run_id, files_written = self.files_written(), "build finished");
        } else {
            error!(
                run_id = self.run_id,
                failed = self.first_fatal.as_deref().unwrap_or_default(),
                "build failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_fatal_error_is_looked_up_from_its_task() {
        let mut result = BuildResult::default();
        result.tasks.insert(
            "styles".into(),
            TaskStatus::Failed {
                errors: vec![TaskError::Compile {
                    task: "styles".into(),
                    file: "index.scss".into(),
                    message: "boom".into(),
                }],
                fatal: false,
                files_written: 0,
            },
        );
        assert!(result.is_success());
        assert!(result.first_fatal_error().is_none());

        result.tasks.insert(
            "index".into(),
            TaskStatus::Failed {
                errors: vec![TaskError::MissingInput {
                    task: "index".into(),
                    path: "source/index.html".into(),
                }],
                fatal: true,
                files_written: 0,
            },
        );
        result.first_fatal = Some("index".into());

        assert!(!result.is_success());
        assert_eq!(result.first_fatal_error().map(TaskError::task), Some("index"));
    }
}
