//! Core-paper ranking
//!
//! Resolves the most frequent ids to records, asks the completion service to
//! score them, and reconciles the answer against the candidates. If scoring
//! fails for any reason the candidates are ordered by citation count instead.

use crate::prompts::RANKING_SYSTEM_PROMPT;
use crate::store::PaperCache;
use crate::tracker::FrequencyTracker;
use litgraph_common::llm::extract_json;
use litgraph_common::{
    metrics, AppError, CompletionClient, CompletionRequest, PaperRecord, RankedPaper, Result,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Placeholder sent for papers without an abstract
pub const NO_ABSTRACT: &str = "No abstract available.";

/// Reduced record sent to the scoring call
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Candidate<'a> {
    paper_id: Option<&'a str>,
    title: &'a str,
    #[serde(rename = "abstract")]
    abstract_text: &'a str,
    year: Option<i32>,
    citation_count: u64,
}

/// One item of the model's ranking list
#[derive(Debug, Clone, PartialEq)]
pub struct RankingEntry {
    pub paper_id: String,
    pub score: Option<f64>,
    pub reason: Option<String>,
}

pub struct Ranker {
    cache: Arc<PaperCache>,
    llm: Arc<dyn CompletionClient>,
    temperature: f32,
}

impl Ranker {
    pub fn new(cache: Arc<PaperCache>, llm: Arc<dyn CompletionClient>, temperature: f32) -> Self {
        Self { cache, llm, temperature }
    }

    /// Rank the `k` most frequent papers in `tracker`
    pub async fn rank_top(&self, tracker: &FrequencyTracker, k: usize) -> Vec<RankedPaper> {
        let ids = tracker.top_k(k);
        if ids.is_empty() {
            warn!("Frequency table is empty, nothing to rank");
            return Vec::new();
        }
        info!(count = ids.len(), "Ranking core papers");

        let papers = self.cache.get_many(&ids).await;
        if papers.is_empty() {
            warn!(requested = ids.len(), "No core papers could be resolved");
            return Vec::new();
        }

        self.rank(papers).await
    }

    /// Score and order resolved papers, falling back to citation order
    pub async fn rank(&self, papers: Vec<PaperRecord>) -> Vec<RankedPaper> {
        match self.score(&papers).await {
            Ok(entries) => {
                debug!(entries = entries.len(), candidates = papers.len(), "Reconciling model ranking");
                reconcile(papers, entries)
            }
            Err(e) => {
                error!(error = %e, "AI ranking failed, ordering by citation count");
                metrics::record_ranking_fallback();
                fallback_order(papers)
            }
        }
    }

    async fn score(&self, papers: &[PaperRecord]) -> Result<Vec<RankingEntry>> {
        let payload = build_payload(papers)?;
        let request = CompletionRequest::new(
            RANKING_SYSTEM_PROMPT,
            format!("Candidate Papers JSON:\n{}", payload),
            self.temperature,
        )
        .json();

        let raw = self.llm.complete(&request).await?;
        parse_ranking(&raw)
    }
}

/// JSON array of reduced candidate records
pub fn build_payload(papers: &[PaperRecord]) -> Result<String> {
    let candidates: Vec<Candidate<'_>> = papers
        .iter()
        .map(|paper| Candidate {
            paper_id: paper.id(),
            title: &paper.title,
            abstract_text: if paper.abstract_text.trim().is_empty() {
                NO_ABSTRACT
            } else {
                &paper.abstract_text
            },
            year: paper.year,
            citation_count: paper.citation_count,
        })
        .collect();

    serde_json::to_string(&candidates).map_err(AppError::from)
}

/// Parse the model's ranking list.
///
/// Accepts `{"ranking": [...]}` or a bare array. An object without a
/// `ranking` key is an empty ranking; anything else is an error.
pub fn parse_ranking(raw: &str) -> Result<Vec<RankingEntry>> {
    let items = match extract_json(raw)? {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("ranking") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(AppError::Completion {
                    message: "ranking is not a list".to_string(),
                })
            }
        },
        _ => {
            return Err(AppError::Completion {
                message: "ranking response is not a JSON object".to_string(),
            })
        }
    };

    Ok(items.iter().filter_map(ranking_entry).collect())
}

fn ranking_entry(item: &Value) -> Option<RankingEntry> {
    let object = item.as_object()?;
    let paper_id = object
        .get("paperId")
        .or_else(|| object.get("paper_id"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())?;

    let score = object.get("score").and_then(|score| {
        score
            .as_f64()
            .or_else(|| score.as_str().and_then(|s| s.trim().parse().ok()))
    });

    let reason = object
        .get("reason")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string);

    Some(RankingEntry {
        paper_id: paper_id.to_string(),
        score,
        reason,
    })
}

/// Order papers by the model's ranking.
///
/// Ranked papers come first in the model's order, carrying score and reason.
/// Unknown and repeated ids in the ranking are skipped. Papers the model did
/// not mention follow in their original order, unscored.
pub fn reconcile(papers: Vec<PaperRecord>, ranking: Vec<RankingEntry>) -> Vec<RankedPaper> {
    let papers = dedup_candidates(papers);
    let mut index: HashMap<String, usize> = HashMap::with_capacity(papers.len());
    for (slot, paper) in papers.iter().enumerate() {
        if let Some(id) = paper.id() {
            index.insert(id.to_string(), slot);
        }
    }
    let mut slots: Vec<Option<PaperRecord>> = papers.into_iter().map(Some).collect();

    let mut ordered = Vec::with_capacity(slots.len());
    for entry in ranking {
        let Some(&slot) = index.get(&entry.paper_id) else {
            debug!(paper_id = %entry.paper_id, "Model ranked an unknown paper");
            continue;
        };
        if let Some(paper) = slots[slot].take() {
            ordered.push(RankedPaper::scored(paper, entry.score, entry.reason));
        }
    }

    ordered.extend(slots.into_iter().flatten().map(RankedPaper::unscored));
    ordered
}

/// Citation count descending; equal counts keep their original order
pub fn fallback_order(papers: Vec<PaperRecord>) -> Vec<RankedPaper> {
    let mut papers = dedup_candidates(papers);
    papers.sort_by(|a, b| b.citation_count.cmp(&a.citation_count));
    papers.into_iter().map(RankedPaper::unscored).collect()
}

/// Keep the first occurrence of each id; papers without an id are kept
fn dedup_candidates(papers: Vec<PaperRecord>) -> Vec<PaperRecord> {
    let mut seen = HashSet::with_capacity(papers.len());
    papers
        .into_iter()
        .filter(|paper| match paper.id() {
            Some(id) if !seen.insert(id.to_string()) => {
                debug!(paper_id = %id, "Dropping duplicate candidate");
                false
            }
            _ => true,
        })
        .collect()
}
