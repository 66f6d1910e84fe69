//! Trait seams for the collaborator subsystems.
//!
//! Crawling, analysis, and article storage are separate systems; the
//! orchestrator only drives them through these boundaries. Baseline
//! implementations live in the `herald` binary crate, test fakes next to
//! the runner tests.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Article, ReferenceMap};

/// Persistent article storage boundary.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Prepare the backing store (create files or tables as needed).
    async fn init(&self) -> Result<()>;

    /// Unreported items published within the last `days` days.
    async fn fetch_window(&self, days: u32) -> Result<Vec<Article>>;

    /// Flag items as having contributed to a delivered report.
    async fn mark_reported(&self, ids: &[String]) -> Result<()>;

    /// Write the final report body to durable storage; returns the path.
    async fn persist_report(&self, body: &str) -> Result<PathBuf>;
}

/// Crawling subsystem boundary.
#[async_trait]
pub trait CrawlRunner: Send + Sync {
    /// Run every configured crawler over the lookback window.
    async fn run_all(&self, days: u32, max_concurrent: usize, incremental: bool) -> Result<()>;
}

/// Analysis subsystem boundary: the stages between raw items and the
/// report body.
#[async_trait]
pub trait AnalysisAgent: Send + Sync {
    async fn filter(&self, items: Vec<Article>) -> Result<Vec<Article>>;

    async fn cluster(&self, items: Vec<Article>) -> Result<Vec<Article>>;

    async fn deduplicate(&self, items: Vec<Article>) -> Result<Vec<Article>>;

    async fn rank(&self, items: Vec<Article>) -> Result<Vec<Article>>;

    /// Supplementary links for the ranked items, keyed by article id.
    async fn fetch_references(&self, items: &[Article]) -> Result<ReferenceMap>;

    /// Final report body; `None` when there is nothing worth reporting.
    async fn generate_report(
        &self,
        items: &[Article],
        references: &ReferenceMap,
        days: u32,
        target_count: usize,
    ) -> Result<Option<String>>;
}
