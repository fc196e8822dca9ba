// src/engine/runtime.rs

use std::collections::BTreeMap;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dag::scheduler::{RunState, ScheduledTask, Scheduler};
use crate::engine::queue::TriggerQueue;
use crate::engine::result::{BuildResult, TaskStatus};
use crate::exec::ExecutorBackend;
use crate::reload::Reloader;
use crate::tasks::TaskReport;

/// Public type alias for task names throughout the engine.
pub type TaskName = String;

/// Reason why tasks were triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    FileWatch,
    Manual,
}

/// Result of a task, as seen by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed { fatal: bool },
}

impl TaskOutcome {
    pub fn from_report(report: &TaskReport) -> Self {
        if report.is_success() {
            TaskOutcome::Success
        } else {
            TaskOutcome::Failed {
                fatal: report.is_fatal(),
            }
        }
    }
}

/// Events sent into the runtime from the watcher, the executor, or signals.
///
/// - the watcher and the CLI send `TasksTriggered`
/// - the executor sends `TaskCompleted`
/// - Ctrl-C handling sends `ShutdownRequested`
#[derive(Debug)]
pub enum RuntimeEvent {
    TasksTriggered {
        tasks: Vec<TaskName>,
        reason: TriggerReason,
    },
    TaskCompleted {
        task: TaskName,
        run_id: u64,
        report: TaskReport,
    },
    ShutdownRequested,
}

/// Options that influence how the runtime behaves.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOptions {
    /// Exit as soon as there is nothing left to run and no queued triggers.
    /// In watch mode this is `false`.
    pub exit_when_idle: bool,
}

/// The main orchestration loop.
///
/// Responsibilities:
/// - Consume `RuntimeEvent`s from the watcher, executor and Ctrl-C handler.
/// - Apply queue semantics for triggers that arrive mid-run.
/// - Drive the scheduler and hand ready tasks to the executor.
/// - Collect task reports into a [`BuildResult`] per run.
/// - Tell the [`Reloader`] whenever a task wrote files.
pub struct Runtime<E: ExecutorBackend> {
    scheduler: Scheduler,
    queue: TriggerQueue,
    options: RuntimeOptions,
    events_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    reloader: Option<Reloader>,

    /// Reports of the run in progress.
    reports: BTreeMap<TaskName, TaskReport>,
    first_fatal: Option<TaskName>,
    last_result: Option<BuildResult>,
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(
        scheduler: Scheduler,
        queue: TriggerQueue,
        options: RuntimeOptions,
        events_rx: mpsc::Receiver<RuntimeEvent>,
        executor: E,
    ) -> Self {
        Self {
            scheduler,
            queue,
            options,
            events_rx,
            executor,
            reloader: None,
            reports: BTreeMap::new(),
            first_fatal: None,
            last_result: None,
        }
    }

    pub fn with_reloader(mut self, reloader: Reloader) -> Self {
        self.reloader = Some(reloader);
        self
    }

    /// Run until shutdown (or until idle with `exit_when_idle`).
    ///
    /// Returns the result of the last run that finished, or an empty result
    /// if nothing ran.
    pub async fn run(mut self) -> Result<BuildResult> {
        info!("assetflow runtime started");

        while let Some(event) = self.events_rx.recv().await {
            debug!(?event, "runtime received event");

            let keep_running = match event {
                RuntimeEvent::TasksTriggered { tasks, reason } => {
                    self.handle_tasks_triggered(tasks, reason).await?
                }
                RuntimeEvent::TaskCompleted {
                    task,
                    run_id,
                    report,
                } => self.handle_task_completion(task, run_id, report).await?,
                RuntimeEvent::ShutdownRequested => {
                    info!("shutdown requested, stopping runtime");
                    false
                }
            };

            if !keep_running {
                break;
            }
        }

        info!("assetflow runtime exiting");
        Ok(self.last_result.unwrap_or_default())
    }

    async fn handle_tasks_triggered(
        &mut self,
        tasks: Vec<TaskName>,
        reason: TriggerReason,
    ) -> Result<bool> {
        info!(?tasks, ?reason, "tasks triggered");

        if self.scheduler.is_idle() {
            let mut triggers = self.queue.drain_pending();
            triggers.extend(tasks);
            self.start_new_run(triggers).await?;
        } else {
            self.queue.record_triggers(&tasks);
            debug!("triggers recorded in queue");
        }

        Ok(!self.should_exit())
    }

    async fn handle_task_completion(
        &mut self,
        task: TaskName,
        run_id: u64,
        report: TaskReport,
    ) -> Result<bool> {
        if run_id != self.scheduler.last_run_id() || self.scheduler.is_idle() {
            warn!(task = %task, run_id, "completion for a stale run; ignoring");
            return Ok(!self.should_exit());
        }

        let outcome = TaskOutcome::from_report(&report);
        match outcome {
            TaskOutcome::Success => info!(
                task = %task,
                files_written = report.files_written.len(),
                "task completed successfully"
            ),
            TaskOutcome::Failed { fatal } => {
                warn!(task = %task, fatal, errors = report.errors.len(), "task failed")
            }
        }

        if outcome == (TaskOutcome::Failed { fatal: true }) && self.first_fatal.is_none() {
            self.first_fatal = Some(task.clone());
        }

        if outcome == TaskOutcome::Success && !report.files_written.is_empty() {
            if let Some(reloader) = &self.reloader {
                reloader.notify(&task, &report.files_written);
            }
        }

        self.reports.insert(task.clone(), report);

        let newly_ready = self.scheduler.handle_completion(&task, outcome);
        self.spawn_ready_tasks(newly_ready).await?;

        if self.scheduler.is_idle() {
            self.finish_run();
            self.maybe_start_queued_run().await?;
        }

        Ok(!self.should_exit())
    }

    fn should_exit(&self) -> bool {
        let idle = self.scheduler.is_idle() && self.queue.is_empty();
        if idle && self.options.exit_when_idle {
            info!("runtime idle and exit_when_idle=true, stopping");
            return true;
        }
        false
    }

    /// Start a new run from the given root triggers.
    async fn start_new_run(&mut self, triggers: Vec<TaskName>) -> Result<()> {
        if triggers.is_empty() {
            debug!("start_new_run called with empty trigger set; nothing to do");
            return Ok(());
        }

        info!(triggers = ?triggers, "starting new run");
        self.scheduler.start_new_run();
        self.reports.clear();
        self.first_fatal = None;

        let ready = self.scheduler.handle_triggers(&triggers);
        self.spawn_ready_tasks(ready).await?;

        // Every trigger may have been unknown.
        if self.scheduler.is_idle() {
            self.finish_run();
        }
        Ok(())
    }

    async fn maybe_start_queued_run(&mut self) -> Result<()> {
        if !self.scheduler.is_idle() {
            return Ok(());
        }

        let triggers = self.queue.drain_pending();
        if triggers.is_empty() {
            return Ok(());
        }

        self.start_new_run(triggers).await
    }

    /// Turn the finished run into a [`BuildResult`].
    fn finish_run(&mut self) {
        let mut tasks = BTreeMap::new();

        for (name, state) in self.scheduler.participants() {
            let status = match state {
                RunState::Blocked => TaskStatus::Blocked {
                    by: self.scheduler.blocked_by(&name).unwrap_or_default().to_string(),
                },
                _ => {
                    let report = self.reports.remove(&name).unwrap_or_default();
                    let files_written = report.files_written.len();
                    if report.is_success() {
                        TaskStatus::Succeeded {
                            files_written,
                            up_to_date: report.up_to_date,
                        }
                    } else {
                        TaskStatus::Failed {
                            fatal: report.is_fatal(),
                            errors: report.errors,
                            files_written,
                        }
                    }
                }
            };
            tasks.insert(name, status);
        }

        let result = BuildResult {
            run_id: self.scheduler.last_run_id(),
            tasks,
            first_fatal: self.first_fatal.take(),
        };
        result.log_summary();
        self.last_result = Some(result);
    }

    async fn spawn_ready_tasks(&mut self, tasks: Vec<ScheduledTask>) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }
        for task in &tasks {
            debug!(task = %task.name, "dispatching task to executor");
        }
        self.executor.spawn_ready_tasks(tasks).await
    }
}
