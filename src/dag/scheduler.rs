// src/dag/scheduler.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::dag::graph::TaskGraph;
use crate::engine::{TaskName, TaskOutcome};
use crate::tasks::Transform;

/// Per-run state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Triggered for this run, waiting on dependencies.
    Pending,
    /// Dispatched to the executor.
    Running,
    Succeeded,
    /// Failed in a way that stops dependents.
    FailedFatal,
    /// Failed, but the last good output is still usable by dependents.
    FailedRecoverable,
    /// Never started because an upstream task failed fatally.
    Blocked,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunState::Pending | RunState::Running)
    }
}

/// A task the scheduler wants the executor to run now.
#[derive(Clone)]
pub struct ScheduledTask {
    pub name: TaskName,
    pub run_id: u64,
    pub units: Vec<Arc<dyn Transform>>,
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("name", &self.name)
            .field("run_id", &self.run_id)
            .field("units", &self.units.len())
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
struct TaskInfo {
    /// `None` if the task is not part of the current run.
    run_state: Option<RunState>,
    /// Root-cause task when `run_state == Blocked`.
    blocked_by: Option<TaskName>,
}

/// Immutable task graph plus mutable per-run state.
///
/// It is responsible for:
/// - remembering which tasks take part in the current run
/// - deciding when a triggered task is ready (its in-run dependencies succeeded)
/// - recording outcomes and releasing dependents
/// - blocking dependents when a task fails fatally
///
/// Dependencies that were not triggered for the run count as satisfied: a
/// watch run that only rebuilds `scripts` does not wait for `styles`.
pub struct Scheduler {
    graph: Arc<TaskGraph>,
    tasks: HashMap<TaskName, TaskInfo>,

    /// Monotonically increasing run ID.
    run_counter: u64,
    /// Currently active run ID, or `None` if there is no active run.
    current_run_id: Option<u64>,
}

impl Scheduler {
    pub fn new(graph: Arc<TaskGraph>) -> Self {
        let tasks = graph
            .tasks()
            .map(|name| (name.to_string(), TaskInfo::default()))
            .collect();

        Self {
            graph,
            tasks,
            run_counter: 0,
            current_run_id: None,
        }
    }

    /// Returns `true` if there is currently no active run.
    pub fn is_idle(&self) -> bool {
        self.current_run_id.is_none()
    }

    /// ID of the active run, or of the last one once it finished.
    pub fn last_run_id(&self) -> u64 {
        self.run_counter
    }

    /// Start a new run, resetting per-run state.
    pub fn start_new_run(&mut self) {
        self.run_counter += 1;
        self.current_run_id = Some(self.run_counter);

        for info in self.tasks.values_mut() {
            *info = TaskInfo::default();
        }

        debug!(run_id = self.run_counter, "scheduler: starting new run");
    }

    /// Add one task to the current run.
    ///
    /// Returns the tasks that are now ready to be executed.
    pub fn handle_trigger(&mut self, task: &str) -> Vec<ScheduledTask> {
        self.handle_triggers(&[task.to_string()])
    }

    /// Add a batch of tasks to the current run before looking for ready
    /// work, so a dependency triggered in the same batch is waited for.
    pub fn handle_triggers(&mut self, tasks: &[TaskName]) -> Vec<ScheduledTask> {
        if self.current_run_id.is_none() {
            warn!("handle_triggers called with no active run; implicitly starting a new run");
            self.start_new_run();
        }

        for task in tasks {
            match self.tasks.get_mut(task) {
                Some(info) if info.run_state.is_none() => {
                    info.run_state = Some(RunState::Pending);
                    debug!(task = %task, "task marked as Pending in this run");
                }
                Some(_) => {
                    debug!(task = %task, "task already participating in current run; ignoring trigger");
                }
                None => warn!(task = %task, "trigger for unknown task; ignoring"),
            }
        }

        let ready = self.collect_new_ready_tasks();
        self.maybe_finish_run();
        ready
    }

    /// Record the outcome of a task.
    ///
    /// - Success or a recoverable failure releases dependents.
    /// - A fatal failure marks every pending dependent (transitively) as
    ///   `Blocked`. Tasks already running are left to finish.
    pub fn handle_completion(&mut self, task: &str, outcome: TaskOutcome) -> Vec<ScheduledTask> {
        if self.current_run_id.is_none() {
            warn!(task = %task, "handle_completion called with no active run; ignoring");
            return Vec::new();
        }

        let Some(info) = self.tasks.get_mut(task) else {
            warn!(task = %task, "completion for unknown task; ignoring");
            return Vec::new();
        };

        if info.run_state != Some(RunState::Running) {
            warn!(task = %task, state = ?info.run_state, "completion for a task that is not running; ignoring");
            return Vec::new();
        }

        let mut newly_ready = Vec::new();
        match outcome {
            TaskOutcome::Success => {
                info.run_state = Some(RunState::Succeeded);
                debug!(task = %task, "task completed successfully");
                newly_ready.extend(self.collect_new_ready_tasks());
            }
            TaskOutcome::Failed { fatal: false } => {
                info.run_state = Some(RunState::FailedRecoverable);
                debug!(task = %task, "task failed recoverably; dependents may continue");
                newly_ready.extend(self.collect_new_ready_tasks());
            }
            TaskOutcome::Failed { fatal: true } => {
                info.run_state = Some(RunState::FailedFatal);
                warn!(task = %task, "task failed; blocking dependents in this run");
                self.block_dependents(task);
                newly_ready.extend(self.collect_new_ready_tasks());
            }
        }

        self.maybe_finish_run();
        newly_ready
    }

    /// State of a task in the current (or last finished) run.
    pub fn state_of(&self, task: &str) -> Option<RunState> {
        self.tasks.get(task).and_then(|info| info.run_state)
    }

    pub fn blocked_by(&self, task: &str) -> Option<&str> {
        self.tasks.get(task).and_then(|info| info.blocked_by.as_deref())
    }

    /// Tasks that took part in the current (or last finished) run, in
    /// topological order.
    pub fn participants(&self) -> Vec<(TaskName, RunState)> {
        self.graph
            .topological_order()
            .iter()
            .filter_map(|name| self.state_of(name).map(|state| (name.clone(), state)))
            .collect()
    }

    /// Clear `current_run_id` once every participating task is terminal.
    fn maybe_finish_run(&mut self) {
        if self.current_run_id.is_none() {
            return;
        }

        let any_active = self
            .tasks
            .values()
            .any(|info| matches!(info.run_state, Some(s) if !s.is_terminal()));

        if !any_active {
            info!(
                run_id = self.current_run_id,
                "scheduler: all tasks terminal; marking run as finished"
            );
            self.current_run_id = None;
        }
    }

    /// Mark ready `Pending` tasks as `Running`, in topological order.
    fn collect_new_ready_tasks(&mut self) -> Vec<ScheduledTask> {
        let run_id = self.run_counter;
        let candidates: Vec<TaskName> = self
            .graph
            .topological_order()
            .iter()
            .filter(|name| self.state_of(name) == Some(RunState::Pending) && self.deps_satisfied(name))
            .cloned()
            .collect();

        let mut ready = Vec::with_capacity(candidates.len());
        for name in candidates {
            if let Some(info) = self.tasks.get_mut(&name) {
                debug!(task = %name, "dependencies satisfied; marking Running");
                info.run_state = Some(RunState::Running);
            }
            let units = self
                .graph
                .node(&name)
                .map(|node| node.units.clone())
                .unwrap_or_default();
            ready.push(ScheduledTask {
                name,
                run_id,
                units,
            });
        }

        ready
    }

    /// A dependency is satisfied if it succeeded (or failed recoverably) in
    /// this run, or if it is not part of this run at all.
    fn deps_satisfied(&self, task: &str) -> bool {
        self.graph.dependencies_of(task).iter().all(|dep| {
            match self.state_of(dep) {
                None | Some(RunState::Succeeded) | Some(RunState::FailedRecoverable) => true,
                Some(RunState::Pending)
                | Some(RunState::Running)
                | Some(RunState::FailedFatal)
                | Some(RunState::Blocked) => false,
            }
        })
    }

    fn block_dependents(&mut self, failed_task: &str) {
        let mut stack: Vec<TaskName> = self.graph.dependents_of(failed_task).to_vec();

        while let Some(name) = stack.pop() {
            let Some(info) = self.tasks.get_mut(&name) else {
                continue;
            };
            if info.run_state == Some(RunState::Pending) {
                info.run_state = Some(RunState::Blocked);
                info.blocked_by = Some(failed_task.to_string());
                debug!(task = %name, upstream = %failed_task, "blocked by upstream failure");
                stack.extend(self.graph.dependents_of(&name).iter().cloned());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::graph::TaskNode;
    use crate::tasks::{TaskContext, TaskReport};

    #[derive(Debug)]
    struct Noop;

    impl Transform for Noop {
        fn label(&self) -> String {
            "noop".into()
        }

        fn execute(&self, _ctx: &TaskContext) -> TaskReport {
            TaskReport::default()
        }
    }

    fn scheduler(nodes: Vec<TaskNode>) -> Scheduler {
        Scheduler::new(Arc::new(TaskGraph::new(nodes).unwrap()))
    }

    fn node(name: &str) -> TaskNode {
        TaskNode::single(name, Arc::new(Noop))
    }

    fn names(tasks: &[ScheduledTask]) -> Vec<&str> {
        tasks.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn batch_trigger_waits_for_in_run_dependency() {
        let mut s = scheduler(vec![node("scripts").after("styles"), node("styles"), node("images")]);
        s.start_new_run();

        let ready = s.handle_triggers(&["scripts".into(), "styles".into(), "images".into()]);
        let mut ready = names(&ready);
        ready.sort();
        assert_eq!(ready, vec!["images", "styles"]);

        assert!(s.handle_completion("images", TaskOutcome::Success).is_empty());
        let ready = s.handle_completion("styles", TaskOutcome::Success);
        assert_eq!(names(&ready), vec!["scripts"]);

        s.handle_completion("scripts", TaskOutcome::Success);
        assert!(s.is_idle());
    }

    #[test]
    fn dependency_outside_the_run_is_satisfied() {
        let mut s = scheduler(vec![node("scripts").after("styles"), node("styles")]);
        s.start_new_run();
        assert_eq!(names(&s.handle_trigger("scripts")), vec!["scripts"]);
    }

    #[test]
    fn fatal_failure_blocks_transitive_dependents() {
        let mut s = scheduler(vec![node("a"), node("b").after("a"), node("c").after("b"), node("d")]);
        s.start_new_run();
        s.handle_triggers(&["a".into(), "b".into(), "c".into(), "d".into()]);

        assert!(s.handle_completion("a", TaskOutcome::Failed { fatal: true }).is_empty());
        assert_eq!(s.state_of("b"), Some(RunState::Blocked));
        assert_eq!(s.state_of("c"), Some(RunState::Blocked));
        assert_eq!(s.blocked_by("c"), Some("a"));
        assert!(!s.is_idle(), "independent task d is still running");

        s.handle_completion("d", TaskOutcome::Success);
        assert!(s.is_idle());
        assert_eq!(s.state_of("d"), Some(RunState::Succeeded));
    }

    #[test]
    fn recoverable_failure_releases_dependents() {
        let mut s = scheduler(vec![node("styles"), node("scripts").after("styles")]);
        s.start_new_run();
        s.handle_triggers(&["styles".into(), "scripts".into()]);

        let ready = s.handle_completion("styles", TaskOutcome::Failed { fatal: false });
        assert_eq!(names(&ready), vec!["scripts"]);
    }

    #[test]
    fn duplicate_completion_is_ignored() {
        let mut s = scheduler(vec![node("a")]);
        s.start_new_run();
        s.handle_trigger("a");
        s.handle_completion("a", TaskOutcome::Success);
        assert!(s.handle_completion("a", TaskOutcome::Success).is_empty());
        assert_eq!(s.participants(), vec![("a".to_string(), RunState::Succeeded)]);
    }
}
