use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use assetflow::dag::ScheduledTask;
use assetflow::engine::RuntimeEvent;
use assetflow::errors::{Result, TaskError};
use assetflow::exec::ExecutorBackend;
use assetflow::tasks::TaskReport;
use tokio::sync::mpsc;

/// A fake executor that:
/// - records which tasks were "run", in dispatch order
/// - immediately reports `TaskCompleted` for each scheduled task, failing
///   the ones it was told to fail.
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<String>>>,
    failures: HashMap<String, bool>,
}

impl FakeExecutor {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, executed: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            runtime_tx,
            executed,
            failures: HashMap::new(),
        }
    }

    /// Make every run of `task` fail.
    pub fn failing(mut self, task: &str, fatal: bool) -> Self {
        self.failures.insert(task.to_string(), fatal);
        self
    }

    fn report_for(&self, task: &str) -> TaskReport {
        match self.failures.get(task) {
            Some(true) => TaskReport::failed(TaskError::MissingInput {
                task: task.to_string(),
                path: PathBuf::from("missing"),
            }),
            Some(false) => TaskReport::failed(TaskError::Compile {
                task: task.to_string(),
                file: PathBuf::from("broken"),
                message: "fake failure".to_string(),
            }),
            None => TaskReport {
                files_written: vec![PathBuf::from(format!("{task}.out"))],
                ..TaskReport::default()
            },
        }
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);
        let completions: Vec<_> = tasks
            .into_iter()
            .map(|t| {
                let report = self.report_for(&t.name);
                (t, report)
            })
            .collect();

        Box::pin(async move {
            for (t, report) in completions {
                {
                    let mut guard = executed.lock().unwrap();
                    guard.push(t.name.clone());
                }

                tx.send(RuntimeEvent::TaskCompleted {
                    task: t.name.clone(),
                    run_id: t.run_id,
                    report,
                })
                .await
                .map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }
}
