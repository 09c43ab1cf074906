//! Research handlers

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use litgraph_common::{
    errors::{AppError, Result},
    RankedPaper,
};
use litgraph_research::{ChannelSink, ResearchOutcome, RunStatus, SearchDirective};

/// Research request
#[derive(Debug, Deserialize, Validate)]
pub struct ResearchRequest {
    #[validate(length(min = 1, max = 2000))]
    pub query: String,

    /// Return the stage announcements with the result
    #[serde(default)]
    pub include_progress: bool,
}

/// Research response
#[derive(Serialize)]
pub struct ResearchResponse {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub directive: Option<SearchDirective>,
    pub report: String,
    pub papers: Vec<RankedPaper>,
    pub progress: Vec<String>,
    pub elapsed_ms: u64,
}

impl ResearchResponse {
    fn new(outcome: ResearchOutcome, progress: Vec<String>) -> Self {
        Self {
            run_id: outcome.run_id,
            status: outcome.status,
            directive: outcome.directive,
            report: outcome.report,
            papers: outcome.papers,
            progress,
            elapsed_ms: outcome.elapsed_ms,
        }
    }
}

/// Run one research query
pub async fn research(
    State(state): State<AppState>,
    Json(request): Json<ResearchRequest>,
) -> Result<Json<ResearchResponse>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("query".to_string()),
    })?;

    let query = request.query.trim();
    if query.is_empty() {
        return Err(AppError::Validation {
            message: "query must not be blank".to_string(),
            field: Some("query".to_string()),
        });
    }

    let (outcome, progress) = if request.include_progress {
        let (sink, mut rx) = ChannelSink::new();
        let outcome = state.workflow.execute(query, Some(&sink)).await;
        drop(sink);

        let mut progress = Vec::new();
        while let Ok(status) = rx.try_recv() {
            progress.push(status);
        }
        (outcome, progress)
    } else {
        (state.workflow.execute(query, None).await, Vec::new())
    };

    if outcome.status == RunStatus::Failed {
        return Err(AppError::Internal {
            message: outcome.report,
        });
    }

    tracing::info!(
        run_id = %outcome.run_id,
        status = outcome.status.as_str(),
        papers = outcome.papers.len(),
        latency_ms = outcome.elapsed_ms,
        "Research completed"
    );

    Ok(Json(ResearchResponse::new(outcome, progress)))
}
