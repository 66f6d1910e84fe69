//! Scheduler loop: ticks the trigger table and drives due runs.
//!
//! Uses tokio::time::interval for zero-overhead ticking. A fired job
//! runs the pipeline to completion before the next due job is looked
//! at, so same-tick jobs execute one after another instead of piling
//! into the busy rejection.

use std::sync::Arc;

use chrono::{DateTime, Local};
use tokio::sync::Mutex;
use tracing::info;

use crate::runner::PipelineRunner;
use crate::triggers::TriggerTable;

/// Fire every job due at `now`, awaiting each run. Returns how many
/// jobs fired.
pub async fn run_due_jobs(
    table: &Mutex<TriggerTable>,
    runner: &PipelineRunner,
    now: DateTime<Local>,
) -> usize {
    let due = {
        let mut table = table.lock().await;
        table.take_due(now)
    };

    let fired = due.len();
    for job in due {
        info!("🔔 Trigger {} fired", job.label());
        runner.run_if_idle().await;
    }
    fired
}

/// Spawn the scheduler loop as a background task. The task checks the
/// table every `check_interval_secs` and never exits on its own.
pub fn spawn_scheduler(
    table: Arc<Mutex<TriggerTable>>,
    runner: Arc<PipelineRunner>,
    check_interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("⏰ Scheduler started (check every {check_interval_secs}s)");

        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(check_interval_secs));

        loop {
            interval.tick().await;
            run_due_jobs(&table, &runner, Local::now()).await;
        }
    })
}
