//! # Herald Core
//!
//! Shared foundation for the herald workspace: operator configuration,
//! error types, pipeline data models, and the trait seams to the
//! collaborator subsystems (storage, crawling, analysis).

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::{ConfigStore, ScheduleConfig};
pub use error::{HeraldError, Result};
pub use traits::{AnalysisAgent, ArticleStore, CrawlRunner};
pub use types::{Article, Reference, ReferenceMap, RunStatus, StepBody, StepEntry, StepTable};
