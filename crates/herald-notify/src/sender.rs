//! Feishu webhook delivery.
//!
//! Two endpoint shapes exist. Ordinary bot webhooks take interactive
//! cards and enforce a body size limit, so long reports go out as a
//! numbered card series. Flow trigger endpoints take one structured
//! text payload and render the layout themselves.

use std::time::Duration;

use serde_json::{Value, json};
use tracing::{error, info};

use herald_core::{HeraldError, Result};

use crate::chunk::split_content;

/// Character budget per card chunk.
pub const CARD_CHUNK_CHARS: usize = 40_000;
/// URL fragment identifying a flow trigger endpoint.
pub const FLOW_URL_MARKER: &str = "flow/api/trigger-webhook";

const CHUNK_PAUSE: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// True when the webhook expects the flow payload shape.
pub fn is_flow_webhook(url: &str) -> bool {
    url.contains(FLOW_URL_MARKER)
}

/// Payload for a flow trigger endpoint. Fields mirror the variables the
/// flow template binds, which is why `total_titles` travels as a string.
#[derive(Debug, Clone)]
pub struct FlowMessage {
    pub title: String,
    pub total_titles: usize,
    pub timestamp: String,
    pub report_type: String,
    pub text: String,
}

/// Sends payloads to one webhook URL at a time.
#[derive(Debug, Clone)]
pub struct FeishuSender {
    client: reqwest::Client,
    chunk_pause: Duration,
}

impl Default for FeishuSender {
    fn default() -> Self {
        Self::new()
    }
}

impl FeishuSender {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            chunk_pause: CHUNK_PAUSE,
        }
    }

    /// Override the pause between card chunks. The webhook rate limit
    /// wants 1s in production; tests pass `Duration::ZERO`.
    pub fn with_chunk_pause(mut self, pause: Duration) -> Self {
        self.chunk_pause = pause;
        self
    }

    /// Send `content` to a card webhook, splitting into a numbered
    /// series when it exceeds the per-card budget. A failed part is
    /// logged and the remaining parts are still attempted.
    pub async fn send_card(&self, webhook: &str, title: &str, content: &str) -> Result<()> {
        let chunks = split_content(content, CARD_CHUNK_CHARS);
        let total = chunks.len();
        let mut failed = 0usize;

        for (idx, chunk) in chunks.iter().enumerate() {
            let part_title = if total > 1 {
                format!("{title} ({}/{total})", idx + 1)
            } else {
                title.to_string()
            };
            if let Err(err) = self.post_checked(webhook, &card_payload(&part_title, chunk)).await {
                error!("❌ Card part {}/{total} failed: {err}", idx + 1);
                failed += 1;
            }
            if idx + 1 < total {
                tokio::time::sleep(self.chunk_pause).await;
            }
        }

        if failed > 0 {
            return Err(HeraldError::notify(format!(
                "{failed}/{total} card part(s) failed"
            )));
        }
        info!("✅ Card delivered in {total} part(s)");
        Ok(())
    }

    /// Send one flow payload.
    pub async fn send_flow(&self, webhook: &str, message: &FlowMessage) -> Result<()> {
        self.post_checked(webhook, &flow_payload(message)).await?;
        info!("✅ Flow message delivered: {}", message.title);
        Ok(())
    }

    /// POST the payload and check both the transport status and the
    /// application-level `code` field in the response body.
    async fn post_checked(&self, webhook: &str, payload: &Value) -> Result<()> {
        let resp = self
            .client
            .post(webhook)
            .json(payload)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| HeraldError::notify(format!("send failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(HeraldError::notify(format!("webhook HTTP {status}: {body}")));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| HeraldError::notify(format!("unreadable webhook response: {e}")))?;
        // A missing code field counts as failure too.
        let code = body.get("code").and_then(Value::as_i64).unwrap_or(-1);
        if code != 0 {
            let msg = body.get("msg").and_then(Value::as_str).unwrap_or("");
            return Err(HeraldError::notify(format!("webhook code {code}: {msg}")));
        }
        Ok(())
    }
}

/// Interactive-card payload wrapping one content chunk.
pub fn card_payload(title: &str, chunk: &str) -> Value {
    json!({
        "msg_type": "interactive",
        "card": {
            "config": {
                "wide_screen_mode": true
            },
            "header": {
                "title": {
                    "tag": "plain_text",
                    "content": title
                },
                "template": "blue"
            },
            "elements": [
                {
                    "tag": "markdown",
                    "content": chunk
                }
            ]
        }
    })
}

/// Flow trigger payload.
pub fn flow_payload(message: &FlowMessage) -> Value {
    json!({
        "message_type": "text",
        "content": {
            "title": message.title,
            "total_titles": message.total_titles.to_string(),
            "timestamp": message.timestamp,
            "report_type": message.report_type,
            "text": message.text
        }
    })
}
