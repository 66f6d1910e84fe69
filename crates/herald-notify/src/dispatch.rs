//! Report fan-out to configured destinations.
//!
//! Every webhook gets its own send and its own result. A destination
//! that times out, refuses the payload, or returns a non-zero code
//! never blocks delivery to the destinations after it.

use chrono::{DateTime, Local};
use tracing::{error, warn};

use herald_core::Result;

use crate::format::{FormatOptions, format_markdown};
use crate::sender::{FeishuSender, FlowMessage, is_flow_webhook};

/// Title of the failure notice sent when a run dies.
pub const ERROR_REPORT_TITLE: &str = "AI News Report - Error";

/// One generated report, ready for delivery.
///
/// `section_count` is derived from the raw body before any card
/// formatting since flow templates bind it as a display variable.
#[derive(Debug, Clone)]
pub struct ReportPayload {
    pub title: String,
    pub body: String,
    pub section_count: usize,
    pub generated_at: DateTime<Local>,
    pub report_type: String,
}

impl ReportPayload {
    /// Wrap a freshly generated report. The default title carries the
    /// local date, same as the persisted report file name.
    pub fn new(body: impl Into<String>, days: u32) -> Self {
        let body = body.into();
        let now = Local::now();
        Self {
            title: format!("AI 前沿动态速报 ({})", now.format("%Y-%m-%d")),
            section_count: count_sections(&body),
            generated_at: now,
            report_type: report_type_label(days),
            body,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Failure notice payload.
    pub fn error(message: impl Into<String>, days: u32) -> Self {
        Self {
            title: ERROR_REPORT_TITLE.to_string(),
            body: message.into(),
            section_count: 0,
            generated_at: Local::now(),
            report_type: report_type_label(days),
        }
    }
}

/// Count the second-level headings of a report body.
pub fn count_sections(body: &str) -> usize {
    body.lines().filter(|line| line.starts_with("## ")).count()
}

/// Human label for a lookback window.
pub fn report_type_label(days: u32) -> String {
    match days {
        1 => "Daily Report".to_string(),
        7 => "Weekly Report".to_string(),
        n => format!("{n}-Day Report"),
    }
}

/// Fans one payload out to a list of webhooks.
///
/// Flow endpoints receive the raw report text inside a [`FlowMessage`];
/// card endpoints receive the body passed through [`format_markdown`]
/// and chunked by the sender.
pub struct Dispatcher {
    sender: FeishuSender,
    options: FormatOptions,
}

impl Dispatcher {
    pub fn new(sender: FeishuSender) -> Self {
        Self {
            sender,
            options: FormatOptions::default(),
        }
    }

    pub fn with_options(mut self, options: FormatOptions) -> Self {
        self.options = options;
        self
    }

    /// Deliver the report to every webhook in order.
    /// Returns a Vec of (webhook, Result), one entry per destination.
    pub async fn dispatch_report(
        &self,
        webhooks: &[String],
        payload: &ReportPayload,
    ) -> Vec<(String, Result<()>)> {
        let mut results = Vec::new();
        for webhook in webhooks {
            let result = self.send_one(webhook, payload).await;
            if let Err(err) = &result {
                error!("❌ Delivery to {webhook} failed: {err}");
            }
            results.push((webhook.clone(), result));
        }
        results
    }

    async fn send_one(&self, webhook: &str, payload: &ReportPayload) -> Result<()> {
        if is_flow_webhook(webhook) {
            let message = FlowMessage {
                title: payload.title.clone(),
                total_titles: payload.section_count,
                timestamp: payload.generated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                report_type: payload.report_type.clone(),
                text: payload.body.clone(),
            };
            self.sender.send_flow(webhook, &message).await
        } else {
            let formatted = format_markdown(&payload.body, &self.options);
            self.sender.send_card(webhook, &payload.title, &formatted).await
        }
    }

    /// Best-effort failure notice. Per-destination failures are already
    /// logged by [`Self::dispatch_report`]; here they are swallowed so a
    /// dead run cannot die twice.
    pub async fn dispatch_error(&self, webhooks: &[String], message: &str, days: u32) {
        if webhooks.is_empty() {
            return;
        }
        let payload = ReportPayload::error(format!("Pipeline failed: {message}"), days);
        let results = self.dispatch_report(webhooks, &payload).await;
        let delivered = results.iter().filter(|(_, r)| r.is_ok()).count();
        if delivered < results.len() {
            warn!(
                "⚠️ Error notice reached {delivered}/{} destination(s)",
                results.len()
            );
        }
    }
}
