// src/dag/mod.rs

//! Task graph and scheduling.
//!
//! - [`graph`] holds the validated directed acyclic graph of tasks.
//! - [`scheduler`] contains the per-run state machine that decides
//!   which tasks are ready to run, and when dependents can be scheduled.

pub mod graph;
pub mod scheduler;

pub use graph::{TaskGraph, TaskNode};
pub use scheduler::{RunState, ScheduledTask, Scheduler};
