// src/engine/mod.rs

//! Orchestration engine.
//!
//! This module ties together:
//! - the task scheduler
//! - the trigger queue (what happens when triggers arrive while a run is active)
//! - the runtime event loop that reacts to file-watch triggers, task
//!   completions and shutdown signals
//! - the per-run [`BuildResult`]

pub mod queue;
pub mod result;
pub mod runtime;

pub use queue::{TriggerQueue, TriggerWhileRunningBehaviour};
pub use result::{BuildResult, TaskStatus};
pub use runtime::{
    Runtime, RuntimeEvent, RuntimeOptions, TaskName, TaskOutcome, TriggerReason,
};
