use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use assetflow::dag::{Scheduler, TaskGraph, TaskNode};
use assetflow::engine::TaskOutcome;
use assetflow_test_utils::{RecordingTransform, UnitLog};
use proptest::prelude::*;

/// Up to 8 tasks; task `i` may depend on any task `j < i`, so the graph is
/// always acyclic. Each task is triggered or not.
fn dag_and_triggers() -> impl Strategy<Value = (Vec<Vec<usize>>, Vec<bool>)> {
    (1usize..=8).prop_flat_map(|n| {
        let deps = (0..n)
            .map(|i| proptest::collection::vec(0..i.max(1), 0..=i.min(3)))
            .collect::<Vec<_>>();
        (deps, proptest::collection::vec(any::<bool>(), n))
    })
}

fn name(i: usize) -> String {
    format!("t{i}")
}

proptest! {
    #[test]
    fn every_triggered_task_runs_once_after_its_triggered_deps(
        (deps, triggered) in dag_and_triggers()
    ) {
        let log = UnitLog::new();
        let nodes: Vec<TaskNode> = deps
            .iter()
            .enumerate()
            .map(|(i, ds)| {
                let mut node = TaskNode::single(name(i), RecordingTransform::new(&name(i), &log).into_unit());
                for d in ds.iter().filter(|d| **d < i) {
                    if !node.after.contains(&name(*d)) {
                        node = node.after(name(*d));
                    }
                }
                node
            })
            .collect();
        let graph = Arc::new(TaskGraph::new(nodes).unwrap());
        let mut scheduler = Scheduler::new(Arc::clone(&graph));

        let triggers: Vec<String> = triggered
            .iter()
            .enumerate()
            .filter(|(_, t)| **t)
            .map(|(i, _)| name(i))
            .collect();
        let expected: HashSet<String> = triggers.iter().cloned().collect();

        scheduler.start_new_run();
        let mut ready: VecDeque<String> =
            scheduler.handle_triggers(&triggers).into_iter().map(|t| t.name).collect();
        let mut completed: Vec<String> = Vec::new();

        while let Some(task) = ready.pop_front() {
            for dep in graph.dependencies_of(&task) {
                if expected.contains(dep) {
                    prop_assert!(completed.contains(dep), "{task} ran before {dep}");
                }
            }
            prop_assert!(!completed.contains(&task), "{task} ran twice");
            completed.push(task.clone());
            ready.extend(
                scheduler
                    .handle_completion(&task, TaskOutcome::Success)
                    .into_iter()
                    .map(|t| t.name),
            );
        }

        prop_assert!(scheduler.is_idle());
        let ran: HashSet<String> = completed.into_iter().collect();
        prop_assert_eq!(ran, expected);
    }
}
