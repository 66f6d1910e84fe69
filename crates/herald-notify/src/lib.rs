//! # Herald Notify
//!
//! Delivery side of the report pipeline: rewrites a markdown report
//! into card-safe text, splits it into size-bounded chunks, and fans
//! it out to every configured Feishu webhook with per-destination
//! failure isolation.

pub mod chunk;
pub mod dispatch;
pub mod format;
pub mod sender;

pub use chunk::split_content;
pub use dispatch::{
    Dispatcher, ERROR_REPORT_TITLE, ReportPayload, count_sections, report_type_label,
};
pub use format::{FormatOptions, format_markdown};
pub use sender::{CARD_CHUNK_CHARS, FeishuSender, FlowMessage, is_flow_webhook};
