//! litgraph Common Library
//!
//! Shared code for the litgraph research pipeline and its services:
//! - Paper data model and boundary normalisation
//! - Paper search and completion service clients
//! - Paper cache (Redis or in-process)
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod cache;
pub mod config;
pub mod errors;
pub mod llm;
pub mod metrics;
pub mod models;
pub mod scholar;

// Re-export commonly used types
pub use cache::{connect_store, MemoryStore, PaperStore, RedisStore};
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use llm::{ChatCompletionClient, CompletionClient, CompletionRequest};
pub use models::{Author, PaperRecord, PaperRef, RankedPaper};
pub use scholar::{PaperSource, ScholarClient};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
