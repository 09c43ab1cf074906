//! Intent normalisation
//!
//! Maps a raw question to a [`SearchDirective`]. Never fails: any completion
//! or parse error yields a keyword search over the raw question.

use crate::prompts::INTENT_SYSTEM_PROMPT;
use litgraph_common::llm::extract_json;
use litgraph_common::{AppError, CompletionClient, CompletionRequest, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// How seed papers are retrieved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Keyword,
    Title,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Keyword => "keyword",
            SearchMode::Title => "title",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalised search intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchDirective {
    pub mode: SearchMode,
    pub text: String,
}

impl SearchDirective {
    pub fn keyword(text: impl Into<String>) -> Self {
        Self {
            mode: SearchMode::Keyword,
            text: text.into(),
        }
    }
}

pub struct IntentNormalizer {
    llm: Arc<dyn CompletionClient>,
    temperature: f32,
}

impl IntentNormalizer {
    pub fn new(llm: Arc<dyn CompletionClient>, temperature: f32) -> Self {
        Self { llm, temperature }
    }

    pub async fn normalize(&self, query: &str) -> SearchDirective {
        info!(query = %query, "Normalising query");

        let request = CompletionRequest::new(INTENT_SYSTEM_PROMPT, query, self.temperature).json();
        let parsed = match self.llm.complete(&request).await {
            Ok(raw) => parse_directive(&raw, query),
            Err(e) => Err(e),
        };

        match parsed {
            Ok(directive) => {
                info!(mode = %directive.mode, text = %directive.text, "Intent resolved");
                directive
            }
            Err(e) => {
                warn!(error = %e, "Intent normalisation failed, searching the raw query");
                SearchDirective::keyword(query.trim())
            }
        }
    }
}

/// Parse `{"search_type": .., "query": ..}` out of model output.
///
/// Unknown search types become keyword; an empty query falls back to `original`.
pub fn parse_directive(raw: &str, original: &str) -> Result<SearchDirective> {
    let value = extract_json(raw)?;
    let object = value.as_object().ok_or_else(|| AppError::Completion {
        message: "intent response is not a JSON object".to_string(),
    })?;

    let mode = match object.get("search_type").and_then(Value::as_str) {
        Some(kind) if kind.trim().eq_ignore_ascii_case("title") => SearchMode::Title,
        _ => SearchMode::Keyword,
    };

    let text = object
        .get("query")
        .and_then(Value::as_str)
        .map(|q| q.trim().trim_matches('"').trim())
        .filter(|q| !q.is_empty())
        .unwrap_or_else(|| original.trim());

    Ok(SearchDirective {
        mode,
        text: text.to_string(),
    })
}
