//! Shared data models: articles, references, step log entries, run status.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A crawled content item, the unit that flows through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
    pub id: String,
    pub source: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub summary: Option<String>,
    pub published_at: DateTime<Utc>,
    /// Set once the item has contributed to a delivered report.
    #[serde(default)]
    pub reported: bool,
}

/// A supplementary link attached to a ranked item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reference {
    pub title: String,
    pub url: String,
}

/// References keyed by article id.
pub type ReferenceMap = BTreeMap<String, Vec<Reference>>;

/// Small tabular payload for `dataframe` step entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl StepTable {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, cells: &[&str]) {
        self.rows.push(cells.iter().map(|c| c.to_string()).collect());
    }
}

/// Typed payload of a step log entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum StepBody {
    Text(String),
    Info(String),
    Success(String),
    Error(String),
    /// Category → count, e.g. fetched items per source.
    Chart(BTreeMap<String, u64>),
    Dataframe(StepTable),
}

/// One entry in a run's append-only step log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepEntry {
    #[serde(flatten)]
    pub body: StepBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl StepEntry {
    fn new(body: StepBody, label: Option<String>) -> Self {
        Self {
            body,
            label,
            timestamp: Utc::now(),
        }
    }

    pub fn text(msg: impl Into<String>) -> Self {
        Self::new(StepBody::Text(msg.into()), None)
    }

    pub fn info(msg: impl Into<String>) -> Self {
        Self::new(StepBody::Info(msg.into()), None)
    }

    pub fn success(msg: impl Into<String>) -> Self {
        Self::new(StepBody::Success(msg.into()), None)
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self::new(StepBody::Error(msg.into()), None)
    }

    pub fn chart(counts: BTreeMap<String, u64>, label: impl Into<String>) -> Self {
        Self::new(StepBody::Chart(counts), Some(label.into()))
    }

    pub fn dataframe(table: StepTable, label: impl Into<String>) -> Self {
        Self::new(StepBody::Dataframe(table), Some(label.into()))
    }

    /// Kind tag as it appears on the status surface.
    pub fn kind(&self) -> &'static str {
        match self.body {
            StepBody::Text(_) => "text",
            StepBody::Info(_) => "info",
            StepBody::Success(_) => "success",
            StepBody::Error(_) => "error",
            StepBody::Chart(_) => "chart",
            StepBody::Dataframe(_) => "dataframe",
        }
    }
}

/// Lifecycle of a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Idle,
    Starting,
    /// A named stage of the execution sequence is underway.
    Stage { label: String },
    Completed,
    /// The fetch returned no items; the run ended early without output.
    NoData,
    Error { message: String },
}

impl RunStatus {
    pub fn stage(label: impl Into<String>) -> Self {
        Self::Stage {
            label: label.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::NoData | Self::Error { .. }
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Starting => write!(f, "starting"),
            Self::Stage { label } => write!(f, "{label}"),
            Self::Completed => write!(f, "completed"),
            Self::NoData => write!(f, "no_data"),
            Self::Error { message } => write!(f, "error: {message}"),
        }
    }
}
