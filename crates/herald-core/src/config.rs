//! Operator configuration: destinations, trigger times, lookback window.
//!
//! Persisted as pretty JSON so the file stays hand-editable. Older
//! deployments wrote single-value `feishu_webhook` / `schedule_time`
//! fields; those are folded into the list fields on load and the file is
//! rewritten in the canonical shape on the next save.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Operator-editable schedule configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(from = "RawScheduleConfig")]
pub struct ScheduleConfig {
    /// Feishu webhook destinations. Duplicates are kept; each occurrence
    /// gets its own send.
    pub feishu_webhooks: Vec<String>,
    /// Daily trigger times, "HH:MM" on the host wall clock.
    pub schedule_times: Vec<String>,
    /// Lookback window for crawling and fetching, in days (≥ 1).
    pub days_to_crawl: u32,
}

fn default_days_to_crawl() -> u32 {
    1
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            feishu_webhooks: Vec::new(),
            schedule_times: Vec::new(),
            days_to_crawl: default_days_to_crawl(),
        }
    }
}

/// On-disk shape, tolerant of older files: any field may be absent,
/// and a legacy single-value field stands in for an empty list.
#[derive(Deserialize)]
struct RawScheduleConfig {
    #[serde(default)]
    feishu_webhooks: Vec<String>,
    #[serde(default)]
    schedule_times: Vec<String>,
    #[serde(default = "default_days_to_crawl")]
    days_to_crawl: u32,
    // Legacy single-value fields from older config files.
    #[serde(default)]
    feishu_webhook: Option<String>,
    #[serde(default)]
    schedule_time: Option<String>,
}

impl From<RawScheduleConfig> for ScheduleConfig {
    fn from(raw: RawScheduleConfig) -> Self {
        Self {
            feishu_webhooks: reconcile(raw.feishu_webhooks, raw.feishu_webhook),
            schedule_times: reconcile(raw.schedule_times, raw.schedule_time),
            days_to_crawl: raw.days_to_crawl.max(1),
        }
    }
}

/// An empty list field falls back to the legacy scalar, if present.
fn reconcile(list: Vec<String>, legacy: Option<String>) -> Vec<String> {
    if list.is_empty() {
        if let Some(value) = legacy.filter(|v| !v.is_empty()) {
            return vec![value];
        }
    }
    list
}

/// File-backed configuration store, write-through.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default config path (~/.herald/config.json).
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".herald")
            .join("config.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the config. An absent, unreadable, or malformed file falls
    /// back to defaults with a warning; this never fails.
    pub fn load(&self) -> ScheduleConfig {
        if !self.path.exists() {
            return ScheduleConfig::default();
        }
        match std::fs::read_to_string(&self.path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!("⚠️ Failed to parse {}: {e}", self.path.display());
                ScheduleConfig::default()
            }),
            Err(e) => {
                tracing::warn!("⚠️ Failed to read {}: {e}", self.path.display());
                ScheduleConfig::default()
            }
        }
    }

    /// Save the config. Writes a temp file and renames it into place so
    /// a concurrent reader never observes a partial file.
    pub fn save(&self, config: &ScheduleConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(config)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, &self.path)?;
        tracing::debug!("💾 Saved config to {}", self.path.display());
        Ok(())
    }
}
