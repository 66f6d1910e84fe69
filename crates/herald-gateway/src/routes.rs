//! Route handlers. Every handler returns a `Json<serde_json::Value>`
//! built with `json!` so the wire shape is visible at the call site.

use std::sync::Arc;

use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::AppState;

/// Health check endpoint.
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "herald",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Run state, schedule, and the step log of the latest run.
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let snapshot = state.runner.snapshot().await;
    let next_run = state.triggers.lock().await.next_run();
    let cfg = state.config.read().await;

    Json(json!({
        "ok": true,
        "is_running": snapshot.running,
        "current_status": snapshot.status.to_string(),
        "next_run_time": next_run.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
        "webhooks_configured": cfg.feishu_webhooks.len(),
        "webhooks": cfg.feishu_webhooks,
        "schedule_times": cfg.schedule_times,
        "days_to_crawl": cfg.days_to_crawl,
        "last_started": snapshot.last_started.map(|t| t.to_rfc3339()),
        "last_finished": snapshot.last_finished.map(|t| t.to_rfc3339()),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "steps": snapshot.steps,
    }))
}

/// Current configuration.
pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<Value> {
    let cfg = state.config.read().await;
    Json(json!({
        "feishu_webhooks": cfg.feishu_webhooks,
        "schedule_times": cfg.schedule_times,
        "days_to_crawl": cfg.days_to_crawl,
    }))
}

/// Apply the fields present in the body, persist the result, and
/// rebuild the trigger table from the new schedule. Fields that are
/// absent or of the wrong type are left unchanged.
pub async fn update_config(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let mut cfg = state.config.write().await;

    if let Some(webhooks) = body.get("feishu_webhooks").and_then(string_list) {
        cfg.feishu_webhooks = webhooks;
    }
    if let Some(times) = body.get("schedule_times").and_then(string_list) {
        cfg.schedule_times = times;
    }
    if let Some(days) = body.get("days_to_crawl").and_then(Value::as_u64) {
        cfg.days_to_crawl = u32::try_from(days).unwrap_or(u32::MAX).max(1);
    }

    if let Err(e) = state.config_store.save(&cfg) {
        tracing::warn!("⚠️ Failed to persist config: {e}");
    }

    let scheduled = state.triggers.lock().await.apply(&cfg.schedule_times);
    tracing::info!("💾 Config updated, {scheduled} trigger(s) scheduled");

    Json(json!({
        "ok": true,
        "jobs_scheduled": scheduled,
        "config": {
            "feishu_webhooks": cfg.feishu_webhooks,
            "schedule_times": cfg.schedule_times,
            "days_to_crawl": cfg.days_to_crawl,
        },
    }))
}

/// Kick off a pipeline run right away. A busy runner rejects instead
/// of queueing; `accepted` reports which happened.
pub async fn trigger_run(State(state): State<Arc<AppState>>) -> Json<Value> {
    let accepted = state.runner.spawn_if_idle();
    if accepted {
        tracing::info!("📣 Manual run accepted");
    }
    Json(json!({ "ok": true, "accepted": accepted }))
}

// All-or-nothing: one non-string element rejects the whole list.
fn string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}
