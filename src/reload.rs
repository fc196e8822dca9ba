// src/reload.rs

//! Live-reload notifications.
//!
//! The runtime calls [`Reloader::notify`] whenever a task finishes
//! successfully and wrote something; every subscriber (the dev server's
//! websocket clients, tests) receives a [`ReloadEvent`]. Nobody listening is
//! not an error.

use std::path::PathBuf;

use tokio::sync::broadcast;
use tracing::debug;

/// Message pushed to connected browsers.
pub const RELOAD_MESSAGE: &str = "reload";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadEvent {
    pub task: String,
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Reloader {
    tx: broadcast::Sender<ReloadEvent>,
}

impl Reloader {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(16);
        Self { tx }
    }

    pub fn notify(&self, task: &str, files: &[PathBuf]) {
        let event = ReloadEvent {
            task: task.to_string(),
            files: files.to_vec(),
        };
        match self.tx.send(event) {
            Ok(listeners) => debug!(task, listeners, "reload notification sent"),
            Err(_) => debug!(task, "no reload listeners"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.tx.subscribe()
    }
}

impl Default for Reloader {
    fn default() -> Self {
        Self::new()
    }
}
