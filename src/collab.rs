//! Baseline collaborators behind the orchestrator's trait seams.
//!
//! The crawler fleet and the LLM analysis stack live outside this
//! repo. What ships here is a file-backed article store, a crawler
//! placeholder, and a digest agent that turns stored items into a
//! plain markdown report.

use std::collections::HashSet;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{Duration, Local, Utc};
use herald_core::{AnalysisAgent, Article, ArticleStore, CrawlRunner, ReferenceMap, Result};
use tracing::{debug, info};

/// JSON-file article store under a single data directory.
///
/// `<data_dir>/articles.json` holds every known item; delivered
/// reports land in `<data_dir>/reports/`.
pub struct FileArticleStore {
    articles_path: PathBuf,
    reports_dir: PathBuf,
}

impl FileArticleStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            articles_path: data_dir.join("articles.json"),
            reports_dir: data_dir.join("reports"),
        }
    }

    fn load_articles(&self) -> Result<Vec<Article>> {
        if !self.articles_path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&self.articles_path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn save_articles(&self, articles: &[Article]) -> Result<()> {
        let raw = serde_json::to_string_pretty(articles)?;
        std::fs::write(&self.articles_path, raw)?;
        Ok(())
    }
}

#[async_trait]
impl ArticleStore for FileArticleStore {
    async fn init(&self) -> Result<()> {
        if let Some(parent) = self.articles_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::create_dir_all(&self.reports_dir)?;
        Ok(())
    }

    async fn fetch_window(&self, days: u32) -> Result<Vec<Article>> {
        let cutoff = Utc::now() - Duration::days(i64::from(days));
        let items: Vec<_> = self
            .load_articles()?
            .into_iter()
            .filter(|a| !a.reported && a.published_at >= cutoff)
            .collect();
        debug!("💾 {} stored item(s) in the {days}-day window", items.len());
        Ok(items)
    }

    async fn mark_reported(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut articles = self.load_articles()?;
        let mut flipped = 0usize;
        for article in &mut articles {
            if !article.reported && ids.contains(&article.id) {
                article.reported = true;
                flipped += 1;
            }
        }
        if flipped > 0 {
            self.save_articles(&articles)?;
        }
        debug!("💾 Marked {flipped} item(s) as reported");
        Ok(())
    }

    async fn persist_report(&self, body: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.reports_dir)?;
        let name = format!("AI_Report_{}.md", Local::now().format("%Y-%m-%d_%H%M%S"));
        let path = self.reports_dir.join(name);
        std::fs::write(&path, body)?;
        Ok(path)
    }
}

/// Stands in for the external crawler fleet. Ingestion happens out of
/// process; a run over an already-populated store is still useful.
pub struct NoopCrawler;

#[async_trait]
impl CrawlRunner for NoopCrawler {
    async fn run_all(&self, days: u32, max_concurrent: usize, incremental: bool) -> Result<()> {
        info!(
            "🌐 Crawl stage delegated to external ingestion \
             (window {days}d, concurrency {max_concurrent}, incremental {incremental})"
        );
        Ok(())
    }
}

/// Turns stored items into a markdown digest without an LLM: items
/// without a title are dropped, URLs deduplicated, newest first, one
/// section per item.
pub struct DigestAgent;

impl DigestAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DigestAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalysisAgent for DigestAgent {
    async fn filter(&self, items: Vec<Article>) -> Result<Vec<Article>> {
        let before = items.len();
        let kept: Vec<_> = items
            .into_iter()
            .filter(|a| !a.title.trim().is_empty())
            .collect();
        if kept.len() < before {
            debug!("Dropped {} item(s) without a title", before - kept.len());
        }
        Ok(kept)
    }

    async fn cluster(&self, items: Vec<Article>) -> Result<Vec<Article>> {
        Ok(items)
    }

    async fn deduplicate(&self, items: Vec<Article>) -> Result<Vec<Article>> {
        let mut seen = HashSet::new();
        Ok(items
            .into_iter()
            .filter(|a| seen.insert(a.url.clone()))
            .collect())
    }

    async fn rank(&self, mut items: Vec<Article>) -> Result<Vec<Article>> {
        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(items)
    }

    async fn fetch_references(&self, _items: &[Article]) -> Result<ReferenceMap> {
        Ok(ReferenceMap::new())
    }

    async fn generate_report(
        &self,
        items: &[Article],
        references: &ReferenceMap,
        days: u32,
        target_count: usize,
    ) -> Result<Option<String>> {
        if items.is_empty() {
            return Ok(None);
        }

        let mut body = String::new();
        body.push_str(&format!(
            "# AI 前沿动态速报 ({})\n\n",
            Local::now().format("%Y-%m-%d")
        ));
        body.push_str(&format!(
            "> 过去 {days} 天共收录 {} 条动态。\n\n",
            items.len()
        ));

        for article in items.iter().take(target_count) {
            body.push_str(&format!("## {}\n\n", article.title.trim()));
            if let Some(summary) = &article.summary {
                body.push_str(&format!("> 摘要：{}\n\n", summary.trim()));
            }
            body.push_str(&format!("来源：{}\n\n", article.source));
            body.push_str(&format!("[阅读原文]({})\n\n", article.url));
        }

        let mut ref_lines = String::new();
        for article in items.iter().take(target_count) {
            if let Some(refs) = references.get(&article.id).filter(|r| !r.is_empty()) {
                ref_lines.push_str(&format!("### {}\n\n", article.title.trim()));
                for reference in refs {
                    ref_lines.push_str(&format!("- [{}]({})\n", reference.title, reference.url));
                }
                ref_lines.push('\n');
            }
        }
        if !ref_lines.is_empty() {
            body.push_str("## 延伸阅读\n\n");
            body.push_str(&ref_lines);
        }

        Ok(Some(body))
    }
}
