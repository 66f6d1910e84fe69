//! Daily trigger table.
//!
//! Each configured "HH:MM" entry becomes one job firing once per local
//! day. Applying a new configuration is destructive: the previous jobs
//! are dropped wholesale and the table rebuilt, so the table always
//! mirrors exactly the entries last applied.

use chrono::{DateTime, Duration, Local, TimeZone};
use tracing::{info, warn};

use herald_core::{HeraldError, Result};

/// Parse a strict `HH:MM` trigger time.
///
/// Accepts one- or two-digit components within 0-23 / 0-59. Anything
/// else, including seconds or signs, is rejected.
pub fn parse_trigger_time(entry: &str) -> Result<(u32, u32)> {
    let mut parts = entry.split(':');
    let (Some(h), Some(m), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(HeraldError::InvalidTrigger(entry.to_string()));
    };
    let hour = parse_component(h, 23)
        .ok_or_else(|| HeraldError::InvalidTrigger(entry.to_string()))?;
    let minute = parse_component(m, 59)
        .ok_or_else(|| HeraldError::InvalidTrigger(entry.to_string()))?;
    Ok((hour, minute))
}

fn parse_component(field: &str, max: u32) -> Option<u32> {
    if field.is_empty() || field.len() > 2 || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: u32 = field.parse().ok()?;
    (value <= max).then_some(value)
}

/// One scheduled daily firing, keyed by its configuration position.
#[derive(Debug, Clone)]
pub struct TriggerJob {
    pub index: usize,
    pub hour: u32,
    pub minute: u32,
    pub next_run: DateTime<Local>,
}

impl TriggerJob {
    pub fn label(&self) -> String {
        format!("{:02}:{:02}", self.hour, self.minute)
    }
}

/// The active set of daily triggers.
#[derive(Debug, Default)]
pub struct TriggerTable {
    jobs: Vec<TriggerJob>,
}

impl TriggerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the table from configured entries. A malformed entry is
    /// skipped with a warning and never aborts the rest. Returns the
    /// number of jobs scheduled.
    pub fn apply(&mut self, entries: &[String]) -> usize {
        self.apply_at(entries, Local::now())
    }

    fn apply_at(&mut self, entries: &[String], now: DateTime<Local>) -> usize {
        self.jobs.clear();
        for (index, entry) in entries.iter().enumerate() {
            match parse_trigger_time(entry) {
                Ok((hour, minute)) => {
                    let next_run = next_occurrence(now, hour, minute);
                    info!(
                        "📅 Trigger {:02}:{:02} scheduled, next run {}",
                        hour,
                        minute,
                        next_run.format("%Y-%m-%d %H:%M")
                    );
                    self.jobs.push(TriggerJob { index, hour, minute, next_run });
                }
                Err(err) => warn!("⚠️ Skipping schedule entry: {err}"),
            }
        }
        self.jobs.len()
    }

    /// Earliest upcoming fire time across all jobs.
    pub fn next_run(&self) -> Option<DateTime<Local>> {
        self.jobs.iter().map(|job| job.next_run).min()
    }

    pub fn jobs(&self) -> &[TriggerJob] {
        &self.jobs
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Pop every job due at `now` and reschedule each for its next day.
    /// Returns the fired jobs in table order.
    pub fn take_due(&mut self, now: DateTime<Local>) -> Vec<TriggerJob> {
        let mut due = Vec::new();
        for job in self.jobs.iter_mut() {
            if job.next_run <= now {
                due.push(job.clone());
                job.next_run = next_occurrence(now, job.hour, job.minute);
            }
        }
        due
    }
}

/// First local instant of `hour:minute` strictly after `after`.
///
/// A DST gap can make the wall time invalid for one day; in that case
/// the occurrence rolls to the next day. An ambiguous (repeated) wall
/// time resolves to its earlier instant.
fn next_occurrence(after: DateTime<Local>, hour: u32, minute: u32) -> DateTime<Local> {
    let mut day = after.date_naive();
    for _ in 0..3 {
        let candidate = day
            .and_hms_opt(hour, minute, 0)
            .and_then(|naive| Local.from_local_datetime(&naive).earliest())
            .filter(|candidate| *candidate > after);
        if let Some(candidate) = candidate {
            return candidate;
        }
        day = day.succ_opt().unwrap_or(day);
    }
    after + Duration::days(1)
}
