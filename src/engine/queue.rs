// src/engine/queue.rs

use std::collections::{HashSet, VecDeque};

use serde::Deserialize;
use tracing::{debug, warn};

use super::runtime::TaskName;

/// Behaviour when a new trigger arrives while a run is already in progress.
///
/// - `Queue`: remember the trigger and start a new run when the current one
///   finishes (default behaviour).
/// - `Cancel`: drop any previously queued batch and keep only the latest
///   trigger. The run in progress is never interrupted; tasks always run to
///   completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerWhileRunningBehaviour {
    #[default]
    Queue,
    Cancel,
}

/// Queue of triggers that arrive while a run is already executing.
///
/// Semantics:
/// - Each queued entry is a *batch* of task names to trigger together in a
///   future run.
/// - `queue_length` (max_runs) defines how many such batches to keep; the
///   default of 1 means "at most one future run is queued".
/// - When the runtime becomes idle it calls `drain_pending()`, which merges
///   all queued batches into a single set of task names for that run.
///
/// Saving a stylesheet twice while `styles` is running therefore rebuilds it
/// exactly once more.
#[derive(Debug)]
pub struct TriggerQueue {
    behaviour: TriggerWhileRunningBehaviour,
    max_runs: usize,
    runs: VecDeque<HashSet<TaskName>>,
}

impl TriggerQueue {
    /// `max_runs` is clamped to at least 1.
    pub fn new(behaviour: TriggerWhileRunningBehaviour, max_runs: usize) -> Self {
        Self {
            behaviour,
            max_runs: max_runs.max(1),
            runs: VecDeque::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Record a batch of tasks triggered while a run is in progress.
    ///
    /// - `Queue`: merge into the last queued batch (creating one if needed);
    ///   if more than `max_runs` batches exist, drop the oldest.
    /// - `Cancel`: replace everything queued with this batch.
    pub fn record_triggers(&mut self, tasks: &[TaskName]) {
        if tasks.is_empty() {
            return;
        }

        match self.behaviour {
            TriggerWhileRunningBehaviour::Queue => {
                match self.runs.back_mut() {
                    Some(last_batch) => {
                        last_batch.extend(tasks.iter().cloned());
                        debug!(?tasks, "merged triggers into last queued batch (queue mode)");
                    }
                    None => {
                        self.runs.push_back(tasks.iter().cloned().collect());
                        debug!(?tasks, "created first queued batch (queue mode)");
                    }
                }

                if self.runs.len() > self.max_runs {
                    warn!(
                        current_batches = self.runs.len(),
                        max_runs = self.max_runs,
                        "exceeded queue_length; dropping oldest queued batches"
                    );
                    while self.runs.len() > self.max_runs {
                        self.runs.pop_front();
                    }
                }
            }
            TriggerWhileRunningBehaviour::Cancel => {
                debug!(?tasks, "resetting queued batches to the latest triggers (cancel mode)");
                self.runs.clear();
                self.runs.push_back(tasks.iter().cloned().collect());
            }
        }
    }

    /// Drain all queued batches, merged into one list of task names.
    pub fn drain_pending(&mut self) -> Vec<TaskName> {
        let mut merged: HashSet<TaskName> = HashSet::new();

        while let Some(batch) = self.runs.pop_front() {
            merged.extend(batch);
        }

        let mut tasks: Vec<TaskName> = merged.into_iter().collect();
        tasks.sort();
        debug!(drained = tasks.len(), "drained queued triggers into new run");
        tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(names: &[&str]) -> Vec<TaskName> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn queue_mode_coalesces_into_one_batch() {
        let mut q = TriggerQueue::new(TriggerWhileRunningBehaviour::Queue, 1);
        q.record_triggers(&batch(&["styles"]));
        q.record_triggers(&batch(&["styles", "scripts"]));

        assert_eq!(q.drain_pending(), batch(&["scripts", "styles"]));
        assert!(q.is_empty());
    }

    #[test]
    fn cancel_mode_keeps_only_latest_batch() {
        let mut q = TriggerQueue::new(TriggerWhileRunningBehaviour::Cancel, 3);
        q.record_triggers(&batch(&["images"]));
        q.record_triggers(&batch(&["index"]));

        assert_eq!(q.drain_pending(), batch(&["index"]));
    }

    #[test]
    fn behaviour_deserializes_from_lowercase() {
        #[derive(Deserialize)]
        struct W {
            b: TriggerWhileRunningBehaviour,
        }
        let w: W = toml::from_str("b = \"cancel\"").unwrap();
        assert_eq!(w.b, TriggerWhileRunningBehaviour::Cancel);
        assert!(toml::from_str::<W>("b = \"restart\"").is_err());
    }
}
