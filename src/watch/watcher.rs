// src/watch/watcher.rs

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use notify::event::EventKind;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::engine::{RuntimeEvent, TaskName, TriggerReason};
use crate::files::relative_str;
use crate::watch::patterns::WatchBindings;

/// Keeps the underlying `RecommendedWatcher` alive. Dropping this handle
/// stops file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Watch `root` recursively and send `RuntimeEvent::TasksTriggered` for the
/// tasks bound to each created, modified or removed path.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    bindings: WatchBindings,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> Result<WatcherHandle> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or(root);
    let bindings = Arc::new(bindings);

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    eprintln!("assetflow: failed to forward notify event: {err}");
                }
            }
            Err(err) => eprintln!("assetflow: file watch error: {err}"),
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;
    info!(root = ?root, bindings = bindings.len(), "file watcher started");

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            trace!(?event, "received notify event");

            if !is_relevant(&event.kind) {
                continue;
            }

            let tasks = tasks_for_event(&root, &bindings, &event);
            if tasks.is_empty() {
                continue;
            }

            debug!(?tasks, paths = ?event.paths, "watch match -> triggering tasks");
            if let Err(err) = runtime_tx
                .send(RuntimeEvent::TasksTriggered {
                    tasks,
                    reason: TriggerReason::FileWatch,
                })
                .await
            {
                // The runtime is gone; nothing left to notify.
                warn!("failed to send RuntimeEvent::TasksTriggered: {err}");
                return;
            }
        }

        debug!("file watcher loop ended");
    });

    Ok(WatcherHandle { _inner: watcher })
}

fn is_relevant(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

fn tasks_for_event(root: &std::path::Path, bindings: &WatchBindings, event: &Event) -> Vec<TaskName> {
    let mut tasks: Vec<TaskName> = Vec::new();
    for path in &event.paths {
        let Some(rel) = relative_str(root, path) else {
            debug!(path = ?path, root = ?root, "path outside watch root");
            continue;
        };
        for task in bindings.tasks_for(&rel) {
            if !tasks.contains(&task) {
                tasks.push(task);
            }
        }
    }
    tasks
}
