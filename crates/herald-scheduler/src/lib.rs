//! # Herald Scheduler
//!
//! Daily triggers and the pipeline run state machine. The trigger
//! table turns configured "HH:MM" entries into jobs, the engine loop
//! fires them, and the runner executes the fetch → analyze → report →
//! notify sequence with at most one run in flight.

pub mod engine;
pub mod runner;
pub mod triggers;

pub use engine::{run_due_jobs, spawn_scheduler};
pub use runner::{PipelineRunner, RunState};
pub use triggers::{TriggerJob, TriggerTable, parse_trigger_time};
