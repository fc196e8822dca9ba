// src/pipeline.rs

//! The build session: one validated config, one mode, one task graph and
//! one incremental cache, shared by every run of the session.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::{BuildConfig, Mode};
use crate::dag::{Scheduler, TaskGraph};
use crate::detect::IncrementalCache;
use crate::engine::{
    BuildResult, Runtime, RuntimeEvent, RuntimeOptions, TaskName, TriggerQueue, TriggerReason,
};
use crate::errors::ConfigError;
use crate::exec::TaskExecutor;
use crate::reload::Reloader;
use crate::tasks::TaskContext;
use crate::watch::{self, WatchBindings};

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Arc<BuildConfig>,
    mode: Mode,
    graph: Arc<TaskGraph>,
    cache: Arc<IncrementalCache>,
    reloader: Reloader,
}

impl Pipeline {
    /// Session over the standard asset graph.
    pub fn new(config: BuildConfig, mode: Mode) -> Result<Self, ConfigError> {
        let graph = TaskGraph::standard(&config)?;
        Ok(Self::with_graph(Arc::new(config), mode, graph))
    }

    /// Session over a custom graph.
    pub fn with_graph(config: Arc<BuildConfig>, mode: Mode, graph: TaskGraph) -> Self {
        Self {
            config,
            mode,
            graph: Arc::new(graph),
            cache: Arc::new(IncrementalCache::new()),
            reloader: Reloader::new(),
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn cache(&self) -> &IncrementalCache {
        &self.cache
    }

    pub fn reloader(&self) -> &Reloader {
        &self.reloader
    }

    pub fn context(&self) -> TaskContext {
        TaskContext::new(Arc::clone(&self.config), self.mode, Arc::clone(&self.cache))
    }

    pub fn output_root(&self) -> PathBuf {
        self.config.output_root(self.mode)
    }

    /// Remove the active mode's output root and forget everything cached.
    pub fn clean(&self) -> Result<()> {
        let root = self.output_root();
        if root.exists() {
            fs::remove_dir_all(&root).with_context(|| format!("removing {}", root.display()))?;
            info!(mode = %self.mode, root = ?root, "cleaned output directory");
        } else {
            debug!(root = ?root, "nothing to clean");
        }
        self.cache.clear();
        Ok(())
    }

    /// Run `tasks` (and nothing else) once, waiting for them to finish.
    pub async fn run_tasks(&self, tasks: &[TaskName]) -> Result<BuildResult> {
        for task in tasks {
            if !self.graph.contains(task) {
                return Err(ConfigError::UnknownTask(task.clone()).into());
            }
        }

        let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
        rt_tx
            .send(RuntimeEvent::TasksTriggered {
                tasks: tasks.to_vec(),
                reason: TriggerReason::Manual,
            })
            .await?;

        let runtime = self.runtime(rt_tx, rt_rx, true);
        runtime.run().await
    }

    /// Run every task in the graph once, without cleaning.
    pub async fn run_all(&self) -> Result<BuildResult> {
        let tasks: Vec<TaskName> = self.graph.topological_order().to_vec();
        self.run_tasks(&tasks).await
    }

    /// `clean` followed by every task.
    pub async fn build(&self) -> Result<BuildResult> {
        info!(mode = %self.mode, "building");
        self.clean()?;
        self.run_all().await
    }

    pub fn standard_bindings(&self) -> Result<WatchBindings> {
        watch::standard_bindings(&self.config, &self.graph)
    }

    /// Re-run bound tasks on file changes until Ctrl-C.
    pub async fn watch(&self, bindings: WatchBindings) -> Result<()> {
        let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

        let _watcher = watch::spawn_watcher(
            self.config.project_root.clone(),
            bindings,
            rt_tx.clone(),
        )?;

        {
            let tx = rt_tx.clone();
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    eprintln!("failed to listen for Ctrl+C: {e}");
                    return;
                }
                let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
            });
        }

        info!("watching for changes (Ctrl+C to stop)");
        self.runtime(rt_tx, rt_rx, false).run().await?;
        Ok(())
    }

    fn runtime(
        &self,
        rt_tx: mpsc::Sender<RuntimeEvent>,
        rt_rx: mpsc::Receiver<RuntimeEvent>,
        exit_when_idle: bool,
    ) -> Runtime<TaskExecutor> {
        let queue = TriggerQueue::new(
            self.config.watch.triggered_while_running_behaviour,
            self.config.watch.queue_length,
        );
        let executor = TaskExecutor::new(self.context(), rt_tx);

        Runtime::new(
            Scheduler::new(Arc::clone(&self.graph)),
            queue,
            RuntimeOptions { exit_when_idle },
            rt_rx,
            executor,
        )
        .with_reloader(self.reloader.clone())
    }
}
