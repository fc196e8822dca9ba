#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use assetflow::errors::TaskError;
use assetflow::tasks::{TaskContext, TaskReport, Transform};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitEvent {
    Started(String),
    Finished(String),
}

/// Shared, ordered log of unit start/finish events.
#[derive(Debug, Clone, Default)]
pub struct UnitLog {
    events: Arc<Mutex<Vec<UnitEvent>>>,
}

impl UnitLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: UnitEvent) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<UnitEvent> {
        self.events.lock().unwrap().clone()
    }

    fn position(&self, event: &UnitEvent) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    pub fn started(&self, label: &str) -> bool {
        self.position(&UnitEvent::Started(label.to_string())).is_some()
    }

    /// True if `first` finished before `second` started.
    pub fn finished_before_start(&self, first: &str, second: &str) -> bool {
        match (
            self.position(&UnitEvent::Finished(first.to_string())),
            self.position(&UnitEvent::Started(second.to_string())),
        ) {
            (Some(f), Some(s)) => f < s,
            _ => false,
        }
    }

    /// True if both units were running at the same time at some point.
    pub fn overlapped(&self, a: &str, b: &str) -> bool {
        let events = self.events();
        let pos = |e: UnitEvent| events.iter().position(|x| *x == e);
        match (
            pos(UnitEvent::Started(a.to_string())),
            pos(UnitEvent::Finished(a.to_string())),
            pos(UnitEvent::Started(b.to_string())),
            pos(UnitEvent::Finished(b.to_string())),
        ) {
            (Some(sa), Some(fa), Some(sb), Some(fb)) => sa < fb && sb < fa,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Failure {
    Fatal,
    Recoverable,
}

/// A transform that sleeps, logs when it starts and finishes, and reports
/// whatever it was told to.
#[derive(Debug, Clone)]
pub struct RecordingTransform {
    label: String,
    log: UnitLog,
    delay: Duration,
    writes: Vec<PathBuf>,
    failure: Option<Failure>,
}

impl RecordingTransform {
    pub fn new(label: &str, log: &UnitLog) -> Self {
        Self {
            label: label.to_string(),
            log: log.clone(),
            delay: Duration::from_millis(20),
            writes: Vec::new(),
            failure: None,
        }
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Report `path` as written (nothing touches the disk).
    pub fn writes(mut self, path: &str) -> Self {
        self.writes.push(PathBuf::from(path));
        self
    }

    pub fn fails_fatally(mut self) -> Self {
        self.failure = Some(Failure::Fatal);
        self
    }

    pub fn fails_recoverably(mut self) -> Self {
        self.failure = Some(Failure::Recoverable);
        self
    }

    pub fn into_unit(self) -> Arc<dyn Transform> {
        Arc::new(self)
    }
}

impl Transform for RecordingTransform {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn execute(&self, _ctx: &TaskContext) -> TaskReport {
        self.log.push(UnitEvent::Started(self.label.clone()));
        thread::sleep(self.delay);

        let mut report = TaskReport {
            files_written: self.writes.clone(),
            ..TaskReport::default()
        };
        match self.failure {
            Some(Failure::Fatal) => report.errors.push(TaskError::MissingInput {
                task: self.label.clone(),
                path: PathBuf::from(format!("{}.missing", self.label)),
            }),
            Some(Failure::Recoverable) => report.errors.push(TaskError::Compile {
                task: self.label.clone(),
                file: PathBuf::from(format!("{}.scss", self.label)),
                message: "recorded failure".to_string(),
            }),
            None => {}
        }

        self.log.push(UnitEvent::Finished(self.label.clone()));
        report
    }
}
