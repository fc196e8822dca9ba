// src/errors.rs

//! Crate-wide error types.
//!
//! Configuration problems surface as [`ConfigError`] before anything runs.
//! Everything that goes wrong inside a transform is a [`TaskError`]; whether
//! it stops the build is decided by [`TaskError::is_fatal`].

use std::path::PathBuf;

use thiserror::Error;

use crate::tasks::lint::LintDiagnostic;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("reading config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unknown asset group '{0}'")]
    UnknownGroup(String),

    #[error("missing or empty config key `{0}`")]
    MissingKey(String),

    #[error("unknown task '{0}'")]
    UnknownTask(String),

    #[error("cycle detected in task graph involving task '{0}'")]
    Cycle(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("task '{task}': lint failed in group '{group}' ({} error(s))", count_errors(.diagnostics))]
    Lint {
        task: String,
        group: String,
        diagnostics: Vec<LintDiagnostic>,
    },

    #[error("task '{task}': failed to compile {file:?}: {message}")]
    Compile {
        task: String,
        file: PathBuf,
        message: String,
    },

    #[error("task '{task}': failed to minify {file:?}: {message}")]
    Minify {
        task: String,
        file: PathBuf,
        message: String,
    },

    #[error("task '{task}': input {path:?} does not exist")]
    MissingInput { task: String, path: PathBuf },

    #[error("task '{task}': {source}")]
    Config {
        task: String,
        #[source]
        source: ConfigError,
    },

    #[error("task '{task}': unit '{unit}' panicked")]
    Panicked { task: String, unit: String },

    #[error("task '{task}': I/O error on {path:?}: {source}")]
    Io {
        task: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TaskError {
    pub fn io(task: &str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TaskError::Io {
            task: task.to_string(),
            path: path.into(),
            source,
        }
    }

    /// Stylesheet compile errors keep the last good output on disk and do not
    /// fail the build; everything else does.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TaskError::Compile { .. })
    }

    pub fn task(&self) -> &str {
        match self {
            TaskError::Lint { task, .. }
            | TaskError::Compile { task, .. }
            | TaskError::Minify { task, .. }
            | TaskError::MissingInput { task, .. }
            | TaskError::Config { task, .. }
            | TaskError::Panicked { task, .. }
            | TaskError::Io { task, .. } => task,
        }
    }
}

fn count_errors(diagnostics: &[LintDiagnostic]) -> usize {
    diagnostics.iter().filter(|d| d.is_error()).count()
}

pub use anyhow::{Error, Result};
