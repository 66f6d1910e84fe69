//! Pipeline runner: the run state machine.
//!
//! One runner owns one [`RunState`] and drives the whole execution
//! sequence behind a one-permit gate, so at most one run exists
//! system-wide. Scheduled fires and manual fires go through the same
//! entry points and are rejected, never queued, while a run is active.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{OwnedSemaphorePermit, RwLock, Semaphore};
use tracing::{error, info, warn};

use herald_core::{
    AnalysisAgent, ArticleStore, CrawlRunner, Result, RunStatus, ScheduleConfig, StepEntry,
    StepTable,
};
use herald_notify::{Dispatcher, ReportPayload};

/// Concurrency bound handed to the crawl collaborator.
const CRAWL_CONCURRENCY: usize = 3;
/// Scheduled runs crawl incrementally.
const CRAWL_INCREMENTAL: bool = true;
/// Target item count for the generated report.
const REPORT_TARGET_COUNT: usize = 10;

/// Mutable state of the current run, retained after it finishes until
/// the next accepted run resets it.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    pub running: bool,
    pub status: RunStatus,
    pub steps: Vec<StepEntry>,
    pub last_started: Option<DateTime<Utc>>,
    pub last_finished: Option<DateTime<Utc>>,
}

impl RunState {
    fn begin(&mut self) {
        self.running = true;
        self.status = RunStatus::Starting;
        self.steps.clear();
        self.last_started = Some(Utc::now());
        self.last_finished = None;
    }

    fn finish(&mut self, status: RunStatus) {
        self.running = false;
        self.status = status;
        self.last_finished = Some(Utc::now());
    }
}

/// Drives one complete pipeline execution per accepted invocation.
pub struct PipelineRunner {
    state: RwLock<RunState>,
    gate: Arc<Semaphore>,
    config: Arc<RwLock<ScheduleConfig>>,
    store: Arc<dyn ArticleStore>,
    crawler: Arc<dyn CrawlRunner>,
    agent: Arc<dyn AnalysisAgent>,
    dispatcher: Dispatcher,
}

impl PipelineRunner {
    pub fn new(
        config: Arc<RwLock<ScheduleConfig>>,
        store: Arc<dyn ArticleStore>,
        crawler: Arc<dyn CrawlRunner>,
        agent: Arc<dyn AnalysisAgent>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            state: RwLock::new(RunState::default()),
            gate: Arc::new(Semaphore::new(1)),
            config,
            store,
            crawler,
            agent,
            dispatcher,
        }
    }

    /// Snapshot of the run state for observability callers. Readers may
    /// see a mid-run snapshot; entries already present never change.
    pub async fn snapshot(&self) -> RunState {
        self.state.read().await.clone()
    }

    /// Run the pipeline now if no run is active, awaiting completion.
    /// Returns false when the invocation was rejected as busy.
    pub async fn run_if_idle(&self) -> bool {
        match Arc::clone(&self.gate).try_acquire_owned() {
            Ok(permit) => {
                self.execute_run(permit).await;
                true
            }
            Err(_) => {
                warn!("⚠️ Run rejected: a pipeline run is already in progress");
                false
            }
        }
    }

    /// Start a background run if no run is active. Returns whether the
    /// run was accepted; progress is visible through [`Self::snapshot`].
    pub fn spawn_if_idle(self: &Arc<Self>) -> bool {
        match Arc::clone(&self.gate).try_acquire_owned() {
            Ok(permit) => {
                let runner = Arc::clone(self);
                tokio::spawn(async move { runner.execute_run(permit).await });
                true
            }
            Err(_) => {
                warn!("⚠️ Run rejected: a pipeline run is already in progress");
                false
            }
        }
    }

    /// The permit is held for the whole run and released on drop, which
    /// is what re-opens the gate whatever way the run ends.
    async fn execute_run(&self, _permit: OwnedSemaphorePermit) {
        let (days, webhooks) = {
            let cfg = self.config.read().await;
            (cfg.days_to_crawl, cfg.feishu_webhooks.clone())
        };

        self.state.write().await.begin();
        info!("⏰ Pipeline run started (lookback {days} day(s))");

        let status = match self.run_stages(days, &webhooks).await {
            Ok(status) => status,
            Err(err) => {
                let message = err.to_string();
                error!("❌ Pipeline failed: {message}");
                self.push_step(StepEntry::error(format!("Pipeline failed: {message}")))
                    .await;
                // Best-effort notice; its own failures stay inside.
                self.dispatcher.dispatch_error(&webhooks, &message, days).await;
                RunStatus::error(message)
            }
        };

        info!("📣 Pipeline run finished: {status}");
        self.state.write().await.finish(status);
    }

    async fn run_stages(&self, days: u32, webhooks: &[String]) -> Result<RunStatus> {
        // 1. Storage init
        self.enter_stage("Initializing storage").await;
        self.store.init().await?;
        self.push_step(StepEntry::text("Storage initialized")).await;

        // 2. Crawl
        self.enter_stage("Running crawlers").await;
        self.crawler
            .run_all(days, CRAWL_CONCURRENCY, CRAWL_INCREMENTAL)
            .await?;
        self.push_step(StepEntry::text(format!(
            "Crawlers finished for the last {days} day(s)"
        )))
        .await;

        // 3. Fetch window; empty ends the run early with NoData.
        self.enter_stage("Fetching articles").await;
        let articles = self.store.fetch_window(days).await?;
        if articles.is_empty() {
            warn!("⚠️ No articles in the last {days} day(s), ending run early");
            self.push_step(StepEntry::error(format!(
                "No articles found in the last {days} day(s)"
            )))
            .await;
            return Ok(RunStatus::NoData);
        }
        self.push_step(StepEntry::info(format!("Fetched {} article(s)", articles.len())))
            .await;

        // 4. Per-source chart
        let mut by_source: BTreeMap<String, u64> = BTreeMap::new();
        for article in &articles {
            *by_source.entry(article.source.clone()).or_default() += 1;
        }
        self.push_step(StepEntry::chart(by_source, "Articles by source")).await;

        // 5.-8. Analysis stages
        let raw_count = articles.len();
        self.enter_stage("Filtering articles").await;
        let filtered = self.agent.filter(articles).await?;
        let filtered_count = filtered.len();
        self.push_step(StepEntry::info(format!(
            "Filtered {raw_count} -> {filtered_count} article(s)"
        )))
        .await;

        self.enter_stage("Clustering articles").await;
        let clustered = self.agent.cluster(filtered).await?;
        self.push_step(StepEntry::info("Clustering finished")).await;

        self.enter_stage("Deduplicating articles").await;
        let deduplicated = self.agent.deduplicate(clustered).await?;
        let deduplicated_count = deduplicated.len();
        self.push_step(StepEntry::info(format!(
            "{deduplicated_count} article(s) after deduplication"
        )))
        .await;

        self.enter_stage("Ranking articles").await;
        let ranked = self.agent.rank(deduplicated).await?;
        self.push_step(StepEntry::info("Ranking finished")).await;

        // 9. Funnel table
        let mut funnel = StepTable::new(&["stage", "count"]);
        funnel.push_row(&["raw", &raw_count.to_string()]);
        funnel.push_row(&["filtered", &filtered_count.to_string()]);
        funnel.push_row(&["deduplicated", &deduplicated_count.to_string()]);
        self.push_step(StepEntry::dataframe(funnel, "Selection funnel")).await;

        // 10. References
        self.enter_stage("Collecting references").await;
        let references = self.agent.fetch_references(&ranked).await?;
        self.push_step(StepEntry::text(format!(
            "References collected for {} item(s)",
            references.len()
        )))
        .await;

        // 11. Report body
        self.enter_stage("Generating report").await;
        let report = self
            .agent
            .generate_report(&ranked, &references, days, REPORT_TARGET_COUNT)
            .await?;
        let Some(body) = report else {
            self.push_step(StepEntry::error("Report generation produced no content"))
                .await;
            self.push_step(StepEntry::success("Pipeline finished without a report"))
                .await;
            return Ok(RunStatus::Completed);
        };
        self.push_step(StepEntry::text(format!(
            "Report generated ({} chars)",
            body.chars().count()
        )))
        .await;

        // 12. Persist and mark
        self.enter_stage("Saving report").await;
        let path = self.store.persist_report(&body).await?;
        let ids: Vec<String> = ranked.iter().map(|a| a.id.clone()).collect();
        self.store.mark_reported(&ids).await?;
        info!("💾 Report saved: {}", path.display());
        self.push_step(StepEntry::success(format!("Report saved to {}", path.display())))
            .await;

        // 13. Notify
        if webhooks.is_empty() {
            warn!("⚠️ No webhooks configured, skipping notification");
        } else {
            self.enter_stage("Sending notifications").await;
            let payload = ReportPayload::new(body, days);
            let results = self.dispatcher.dispatch_report(webhooks, &payload).await;
            for (webhook, result) in &results {
                if let Err(err) = result {
                    self.push_step(StepEntry::error(format!(
                        "Delivery to {webhook} failed: {err}"
                    )))
                    .await;
                }
            }
            let delivered = results.iter().filter(|(_, r)| r.is_ok()).count();
            self.push_step(StepEntry::success(format!(
                "Notified {delivered}/{} destination(s)",
                results.len()
            )))
            .await;
        }

        // 14. Terminal entry
        self.push_step(StepEntry::success("Pipeline finished")).await;
        Ok(RunStatus::Completed)
    }

    async fn enter_stage(&self, label: &str) {
        info!("🔔 {label}");
        self.state.write().await.status = RunStatus::stage(label);
    }

    async fn push_step(&self, entry: StepEntry) {
        self.state.write().await.steps.push(entry);
    }
}
