// src/exec/mod.rs

//! Execution layer.
//!
//! Runs the transforms of scheduled tasks and reports back to the runtime
//! via `RuntimeEvent`s.
//!
//! - [`backend`] defines the `ExecutorBackend` seam used by the runtime.
//! - [`executor`] is the production backend (Tokio tasks plus the blocking
//!   pool, one unit per fan-out entry).

pub mod backend;
pub mod executor;

pub use backend::ExecutorBackend;
pub use executor::{run_units, TaskExecutor};
