use std::path::PathBuf;
use std::sync::Arc;

use axum::http::StatusCode;
use herald_core::{
    AnalysisAgent, Article, ArticleStore, ConfigStore, CrawlRunner, ReferenceMap, Result,
    ScheduleConfig,
};
use herald_gateway::{AppState, build_router};
use herald_notify::{Dispatcher, FeishuSender};
use herald_scheduler::{PipelineRunner, TriggerTable};
use http_body_util::BodyExt;
use serde_json::json;
use tokio::sync::{Mutex, Notify, RwLock};
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Send a GET request via `oneshot` and return (status, parsed JSON body).
async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// Send a POST request with a JSON body via `oneshot` and return (status, parsed JSON body).
async fn post_json(
    app: axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

fn temp_store(name: &str) -> ConfigStore {
    let dir = std::env::temp_dir().join(format!("herald-gateway-test-{name}"));
    std::fs::remove_dir_all(&dir).ok();
    ConfigStore::new(dir.join("config.json"))
}

fn test_state(store: ConfigStore, crawler: Arc<dyn CrawlRunner>) -> AppState {
    let cfg = ScheduleConfig {
        feishu_webhooks: Vec::new(),
        schedule_times: vec!["08:00".to_string()],
        days_to_crawl: 1,
    };
    let config = Arc::new(RwLock::new(cfg));
    let mut triggers = TriggerTable::new();
    triggers.apply(&["08:00".to_string()]);

    let runner = Arc::new(PipelineRunner::new(
        Arc::clone(&config),
        Arc::new(EmptyStore),
        crawler,
        Arc::new(UnusedAgent),
        Dispatcher::new(FeishuSender::new()),
    ));

    AppState {
        config,
        config_store: store,
        triggers: Arc::new(Mutex::new(triggers)),
        runner,
        start_time: std::time::Instant::now(),
    }
}

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

struct EmptyStore;

#[async_trait::async_trait]
impl ArticleStore for EmptyStore {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn fetch_window(&self, _days: u32) -> Result<Vec<Article>> {
        Ok(Vec::new())
    }

    async fn mark_reported(&self, _ids: &[String]) -> Result<()> {
        Ok(())
    }

    async fn persist_report(&self, _body: &str) -> Result<PathBuf> {
        Ok(PathBuf::new())
    }
}

struct NoopCrawler;

#[async_trait::async_trait]
impl CrawlRunner for NoopCrawler {
    async fn run_all(&self, _days: u32, _max_concurrent: usize, _incremental: bool) -> Result<()> {
        Ok(())
    }
}

/// Parks in the crawl stage until released, so a test can observe a
/// run in progress.
struct BlockingCrawler {
    started: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait::async_trait]
impl CrawlRunner for BlockingCrawler {
    async fn run_all(&self, _days: u32, _max_concurrent: usize, _incremental: bool) -> Result<()> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(())
    }
}

/// Never reached: the empty store ends every run before analysis.
struct UnusedAgent;

#[async_trait::async_trait]
impl AnalysisAgent for UnusedAgent {
    async fn filter(&self, items: Vec<Article>) -> Result<Vec<Article>> {
        Ok(items)
    }

    async fn cluster(&self, items: Vec<Article>) -> Result<Vec<Article>> {
        Ok(items)
    }

    async fn deduplicate(&self, items: Vec<Article>) -> Result<Vec<Article>> {
        Ok(items)
    }

    async fn rank(&self, items: Vec<Article>) -> Result<Vec<Article>> {
        Ok(items)
    }

    async fn fetch_references(&self, _items: &[Article]) -> Result<ReferenceMap> {
        Ok(ReferenceMap::new())
    }

    async fn generate_report(
        &self,
        _items: &[Article],
        _references: &ReferenceMap,
        _days: u32,
        _target_count: usize,
    ) -> Result<Option<String>> {
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_service_and_version() {
    let state = test_state(temp_store("health"), Arc::new(NoopCrawler));

    let (status, json) = get(build_router(state), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "herald");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn status_reflects_idle_runner_and_schedule() {
    let state = test_state(temp_store("status"), Arc::new(NoopCrawler));

    let (status, json) = get(build_router(state), "/api/v1/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], true);
    assert_eq!(json["is_running"], false);
    assert_eq!(json["current_status"], "idle");
    assert_eq!(json["webhooks_configured"], 0);
    assert_eq!(json["schedule_times"], json!(["08:00"]));
    assert_eq!(json["days_to_crawl"], 1);
    assert_eq!(json["steps"], json!([]));
    assert!(json["next_run_time"].is_string());
    assert!(json["last_started"].is_null());
    assert!(json["last_finished"].is_null());
    assert!(json["uptime_secs"].is_number());
}

#[tokio::test]
async fn get_config_returns_live_values() {
    let state = test_state(temp_store("get-config"), Arc::new(NoopCrawler));

    let (status, json) = get(build_router(state), "/api/v1/config").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["feishu_webhooks"], json!([]));
    assert_eq!(json["schedule_times"], json!(["08:00"]));
    assert_eq!(json["days_to_crawl"], 1);
}

#[tokio::test]
async fn config_update_persists_and_reschedules() {
    let store = temp_store("update");
    let state = test_state(store.clone(), Arc::new(NoopCrawler));

    let (status, json) = post_json(
        build_router(state.clone()),
        "/api/v1/config",
        json!({
            "feishu_webhooks": [
                "https://example.com/hook/a",
                "https://example.com/hook/a",
            ],
            "schedule_times": ["07:30", "18:00"],
            "days_to_crawl": 0,
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], true);
    assert_eq!(json["jobs_scheduled"], 2);
    // Duplicate destinations are kept as given, days are clamped up to 1.
    assert_eq!(
        json["config"]["feishu_webhooks"],
        json!([
            "https://example.com/hook/a",
            "https://example.com/hook/a",
        ])
    );
    assert_eq!(json["config"]["days_to_crawl"], 1);

    // The update went through the store, not just the in-memory copy.
    let persisted = store.load();
    assert_eq!(persisted.feishu_webhooks.len(), 2);
    assert_eq!(persisted.schedule_times, vec!["07:30", "18:00"]);
    assert_eq!(persisted.days_to_crawl, 1);

    let (_, json) = get(build_router(state), "/api/v1/config").await;
    assert_eq!(json["schedule_times"], json!(["07:30", "18:00"]));
}

#[tokio::test]
async fn config_update_ignores_malformed_fields() {
    let state = test_state(temp_store("malformed"), Arc::new(NoopCrawler));

    let (status, json) = post_json(
        build_router(state.clone()),
        "/api/v1/config",
        json!({
            "schedule_times": ["25:99", "07:00"],
            "days_to_crawl": "three",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    // The raw list is stored, but only the parseable entry is scheduled.
    assert_eq!(json["jobs_scheduled"], 1);
    assert_eq!(json["config"]["schedule_times"], json!(["25:99", "07:00"]));
    // Non-numeric days leave the previous value in place.
    assert_eq!(json["config"]["days_to_crawl"], 1);
}

#[tokio::test]
async fn config_update_rejects_mixed_type_lists() {
    let state = test_state(temp_store("mixed"), Arc::new(NoopCrawler));

    let (status, json) = post_json(
        build_router(state),
        "/api/v1/config",
        json!({ "schedule_times": ["07:00", 42] }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    // One non-string element rejects the whole list; the old schedule stays.
    assert_eq!(json["config"]["schedule_times"], json!(["08:00"]));
    assert_eq!(json["jobs_scheduled"], 1);
}

#[tokio::test]
async fn config_update_saturates_oversized_days() {
    let state = test_state(temp_store("big-days"), Arc::new(NoopCrawler));

    let (status, json) = post_json(
        build_router(state),
        "/api/v1/config",
        json!({ "days_to_crawl": 4_294_967_296_u64 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["config"]["days_to_crawl"], u32::MAX);
}

#[tokio::test]
async fn manual_run_accepts_then_rejects_while_busy() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let crawler = Arc::new(BlockingCrawler {
        started: Arc::clone(&started),
        release: Arc::clone(&release),
    });
    let state = test_state(temp_store("run"), crawler);

    let (status, json) = post_json(build_router(state.clone()), "/api/v1/run", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["accepted"], true);

    started.notified().await;

    // A second trigger while the crawl is parked is turned away.
    let (status, json) = post_json(build_router(state.clone()), "/api/v1/run", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["accepted"], false);

    let (_, json) = get(build_router(state.clone()), "/api/v1/status").await;
    assert_eq!(json["is_running"], true);

    release.notify_one();
    for _ in 0..100 {
        if !state.runner.snapshot().await.running {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    let (_, json) = get(build_router(state), "/api/v1/status").await;
    assert_eq!(json["is_running"], false);
    assert_eq!(json["current_status"], "no_data");
    assert!(json["last_finished"].is_string());
}
