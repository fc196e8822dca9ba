// src/exec/executor.rs

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::dag::ScheduledTask;
use crate::engine::RuntimeEvent;
use crate::errors::{Result, TaskError};
use crate::exec::ExecutorBackend;
use crate::tasks::{TaskContext, TaskReport, Transform};

/// Executor that runs transforms on Tokio's blocking pool.
///
/// Every scheduled task gets its own Tokio task; each of its fan-out units
/// runs concurrently with `spawn_blocking`, and the merged report is sent
/// back to the runtime. There is no cancellation: once started, a unit runs
/// to completion.
pub struct TaskExecutor {
    ctx: TaskContext,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
}

impl TaskExecutor {
    pub fn new(ctx: TaskContext, runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self { ctx, runtime_tx }
    }
}

impl ExecutorBackend for TaskExecutor {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        for task in tasks {
            let ctx = self.ctx.clone();
            let tx = self.runtime_tx.clone();
            tokio::spawn(async move {
                let name = task.name.clone();
                let run_id = task.run_id;
                let report = run_units(&name, task.units, ctx).await;

                if let Err(err) = tx
                    .send(RuntimeEvent::TaskCompleted {
                        task: name.clone(),
                        run_id,
                        report,
                    })
                    .await
                {
                    warn!(task = %name, "failed to send TaskCompleted to runtime: {err}");
                }
            });
        }

        Box::pin(async { Ok(()) })
    }
}

/// Run every unit of one task concurrently and merge their reports.
pub async fn run_units(task: &str, units: Vec<Arc<dyn Transform>>, ctx: TaskContext) -> TaskReport {
    let started = Instant::now();
    let mut set = JoinSet::new();

    for unit in units {
        let ctx = ctx.clone();
        let label = unit.label();
        set.spawn_blocking(move || {
            debug!(unit = %label, "unit started");
            let report = unit.execute(&ctx);
            debug!(unit = %label, success = report.is_success(), "unit finished");
            (label, report)
        });
    }

    let mut total = TaskReport::up_to_date();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((_label, report)) => total.merge(report),
            Err(err) => {
                error!(task, "unit panicked: {err}");
                total.merge(TaskReport::failed(TaskError::Panicked {
                    task: task.to_string(),
                    unit: err.to_string(),
                }));
            }
        }
    }

    info!(
        task,
        elapsed_ms = started.elapsed().as_millis() as u64,
        files_written = total.files_written.len(),
        errors = total.errors.len(),
        "task finished"
    );
    total
}
