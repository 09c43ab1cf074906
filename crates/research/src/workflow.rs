//! Research workflow
//!
//! Drives one query through the eight pipeline stages:
//!
//! | # | Stage | Notes |
//! |---|---|---|
//! | 0 | Reset | fresh frequency table for this run |
//! | 1 | Intent | always yields a directive |
//! | 2 | Seed retrieval | an empty result ends the run |
//! | 3 | Seed storage | cache seeds, count each at seed weight |
//! | 4 | Graph expansion | batch details for the seeds |
//! | 5 | Recursive counting | one bump per reference or citation edge |
//! | 6 | Ranking | AI scoring with citation-count fallback |
//! | 7 | Reporting | narrative report or "no papers" message |
//!
//! Each component degrades on its own; [`ResearchWorkflow::execute`] only
//! guards against panics escaping a stage.

use crate::intent::{IntentNormalizer, SearchDirective, SearchMode};
use crate::progress::ProgressSink;
use crate::ranking::Ranker;
use crate::report::Reporter;
use crate::store::PaperCache;
use crate::tracker::FrequencyTracker;
use futures::FutureExt;
use litgraph_common::config::PipelineConfig;
use litgraph_common::{
    connect_store, metrics, AppConfig, ChatCompletionClient, CompletionClient, PaperRecord,
    PaperSource, PaperStore, RankedPaper, Result, ScholarClient,
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument, Level};
use uuid::Uuid;

const TITLE_PREVIEW_CHARS: usize = 80;

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Reset,
    Intent,
    SeedRetrieval,
    SeedStorage,
    GraphExpansion,
    RecursiveCounting,
    Ranking,
    Reporting,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Reset,
        Stage::Intent,
        Stage::SeedRetrieval,
        Stage::SeedStorage,
        Stage::GraphExpansion,
        Stage::RecursiveCounting,
        Stage::Ranking,
        Stage::Reporting,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Metric and log label
    pub fn label(self) -> &'static str {
        match self {
            Stage::Reset => "reset",
            Stage::Intent => "intent",
            Stage::SeedRetrieval => "seed_retrieval",
            Stage::SeedStorage => "seed_storage",
            Stage::GraphExpansion => "graph_expansion",
            Stage::RecursiveCounting => "recursive_counting",
            Stage::Ranking => "ranking",
            Stage::Reporting => "reporting",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Stage::Reset => "Resetting citation frequency statistics",
            Stage::Intent => "Identifying search intent and optimising the query",
            Stage::SeedRetrieval => "Retrieving seed papers",
            Stage::SeedStorage => "Storing seed paper details",
            Stage::GraphExpansion => "Expanding citations and fetching reference graphs",
            Stage::RecursiveCounting => "Counting citation frequencies to mine core papers",
            Stage::Ranking => "Reading and scoring the top core papers",
            Stage::Reporting => "Writing the research report",
        }
    }

    /// Progress message announced when the stage starts
    pub fn status_line(self) -> String {
        format!("Step {}/7: {}", self.index(), self.description())
    }
}

/// Times one stage into the stage histogram
struct StageTimer {
    stage: Stage,
    started: Instant,
}

impl StageTimer {
    fn start(stage: Stage) -> Self {
        Self {
            stage,
            started: Instant::now(),
        }
    }

    fn finish(self) {
        let elapsed = self.started.elapsed();
        metrics::record_stage(self.stage.label(), elapsed.as_secs_f64());
        debug!(stage = self.stage.label(), elapsed_ms = elapsed.as_millis() as u64, "Stage finished");
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Report written from ranked papers
    Completed,
    /// Seed retrieval found nothing
    NoSeeds,
    /// Seeds were found but no core paper could be resolved
    NoPapers,
    /// A stage panicked
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::NoSeeds => "no_seeds",
            RunStatus::NoPapers => "no_papers",
            RunStatus::Failed => "failed",
        }
    }
}

/// Result of one research run
#[derive(Debug, Clone, Serialize)]
pub struct ResearchOutcome {
    pub run_id: Uuid,
    pub directive: Option<SearchDirective>,
    pub status: RunStatus,
    /// User-visible text: the report or the reason there is none
    pub report: String,
    pub papers: Vec<RankedPaper>,
    pub elapsed_ms: u64,
}

impl ResearchOutcome {
    fn failed(run_id: Uuid, message: String) -> Self {
        Self {
            run_id,
            directive: None,
            status: RunStatus::Failed,
            report: message,
            papers: Vec::new(),
            elapsed_ms: 0,
        }
    }
}

/// Message for a run that found no seed papers
pub fn no_seeds_message(mode: SearchMode) -> String {
    format!(
        "No relevant papers found (search type: {}). Please check that the query is accurate.",
        mode
    )
}

pub struct ResearchWorkflow {
    intent: IntentNormalizer,
    source: Arc<dyn PaperSource>,
    cache: Arc<PaperCache>,
    ranker: Ranker,
    reporter: Reporter,
    config: PipelineConfig,
}

impl ResearchWorkflow {
    pub fn new(
        source: Arc<dyn PaperSource>,
        store: Arc<dyn PaperStore>,
        llm: Arc<dyn CompletionClient>,
        config: &AppConfig,
    ) -> Self {
        let cache = Arc::new(PaperCache::new(store, source.clone()));

        Self {
            intent: IntentNormalizer::new(llm.clone(), config.llm.intent_temperature),
            ranker: Ranker::new(cache.clone(), llm.clone(), config.llm.ranking_temperature),
            reporter: Reporter::new(llm, config.llm.reporting_temperature),
            source,
            cache,
            config: config.pipeline.clone(),
        }
    }

    /// Build the production collaborators from configuration
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let source = Arc::new(ScholarClient::new(config.scholar.clone())?);
        let llm = Arc::new(ChatCompletionClient::new(config.llm.clone())?);
        let store = connect_store(&config.redis).await;

        info!(
            model = %config.llm.model,
            store = store.name(),
            seed_limit = config.pipeline.seed_limit,
            top_k = config.pipeline.top_k,
            "Research workflow ready"
        );

        Ok(Self::new(source, store, llm, config))
    }

    /// The paper store behind the cache
    pub fn store(&self) -> Arc<dyn PaperStore> {
        self.cache.store().clone()
    }

    /// Run one query to completion. Never panics; a panicking stage yields
    /// a [`RunStatus::Failed`] outcome.
    pub async fn execute(&self, query: &str, sink: Option<&dyn ProgressSink>) -> ResearchOutcome {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let span = info_span!("research_run", %run_id);

        let result = AssertUnwindSafe(self.run(run_id, query, sink))
            .catch_unwind()
            .instrument(span)
            .await;

        let mut outcome = result.unwrap_or_else(|panic| {
            let reason = panic_message(panic.as_ref());
            error!(%run_id, panic = %reason, "Research run failed");
            ResearchOutcome::failed(
                run_id,
                format!("The research run failed unexpectedly: {}", reason),
            )
        });

        let elapsed = started.elapsed();
        outcome.elapsed_ms = elapsed.as_millis() as u64;
        metrics::record_research_run(outcome.status.as_str(), elapsed.as_secs_f64());
        info!(
            %run_id,
            status = outcome.status.as_str(),
            papers = outcome.papers.len(),
            elapsed_ms = outcome.elapsed_ms,
            "Research run finished"
        );
        outcome
    }

    /// The stages, without the panic guard
    pub async fn run(
        &self,
        run_id: Uuid,
        query: &str,
        sink: Option<&dyn ProgressSink>,
    ) -> ResearchOutcome {
        let tracker = FrequencyTracker::new();

        let timer = enter(Stage::Reset, sink).await;
        tracker.reset();
        timer.finish();

        let timer = enter(Stage::Intent, sink).await;
        let directive = self.intent.normalize(query).await;
        timer.finish();

        let timer = enter(Stage::SeedRetrieval, sink).await;
        let seeds = self.retrieve_seeds(&directive).await;
        timer.finish();

        if seeds.is_empty() {
            warn!(mode = %directive.mode, text = %directive.text, "No seed papers found");
            return ResearchOutcome {
                run_id,
                report: no_seeds_message(directive.mode),
                directive: Some(directive),
                status: RunStatus::NoSeeds,
                papers: Vec::new(),
                elapsed_ms: 0,
            };
        }

        let timer = enter(Stage::SeedStorage, sink).await;
        self.store_seeds(&tracker, &seeds).await;
        timer.finish();

        let timer = enter(Stage::GraphExpansion, sink).await;
        let detailed = self.expand_graph(&seeds).await;
        timer.finish();

        let timer = enter(Stage::RecursiveCounting, sink).await;
        self.count_edges(&tracker, &detailed);
        timer.finish();

        let timer = enter(Stage::Ranking, sink).await;
        let ranked = self.ranker.rank_top(&tracker, self.config.top_k).await;
        timer.finish();

        let timer = enter(Stage::Reporting, sink).await;
        let report = self.reporter.generate(query, &ranked).await;
        timer.finish();

        ResearchOutcome {
            run_id,
            directive: Some(directive),
            status: if ranked.is_empty() {
                RunStatus::NoPapers
            } else {
                RunStatus::Completed
            },
            report,
            papers: ranked,
            elapsed_ms: 0,
        }
    }

    async fn retrieve_seeds(&self, directive: &SearchDirective) -> Vec<PaperRecord> {
        match directive.mode {
            SearchMode::Title => self
                .source
                .search_by_title(&directive.text)
                .await
                .into_iter()
                .collect(),
            SearchMode::Keyword => {
                self.source
                    .search_by_keyword(&directive.text, self.config.seed_limit)
                    .await
            }
        }
    }

    /// Cache the seeds and count each one at seed weight
    pub(crate) async fn store_seeds(&self, tracker: &FrequencyTracker, seeds: &[PaperRecord]) {
        self.cache.set_many(seeds).await;

        for seed in seeds {
            if let Some(id) = seed.id() {
                tracker.seed(id);
            }
        }
        info!(seeds = seeds.len(), tracked = tracker.len(), "Seed papers counted");

        if tracing::enabled!(Level::DEBUG) {
            for (i, seed) in seeds.iter().enumerate() {
                let title: String = seed.title.chars().take(TITLE_PREVIEW_CHARS).collect();
                debug!(
                    seed = i + 1,
                    paper_id = seed.id().unwrap_or("unknown"),
                    title = %title,
                    "Seed paper"
                );
            }
        }
    }

    /// Fetch reference and citation edges for every seed with an id
    pub(crate) async fn expand_graph(&self, seeds: &[PaperRecord]) -> Vec<PaperRecord> {
        let ids: Vec<String> = seeds
            .iter()
            .filter_map(|seed| seed.id().map(str::to_string))
            .collect();
        if ids.is_empty() {
            warn!("No seed has an id, skipping graph expansion");
            return Vec::new();
        }

        info!(count = ids.len(), "Expanding citation graph");
        self.source.batch_details(&ids).await
    }

    /// Bump every reference and citation endpoint once per occurrence
    pub(crate) fn count_edges(&self, tracker: &FrequencyTracker, detailed: &[PaperRecord]) {
        if detailed.is_empty() {
            warn!("Graph expansion returned no papers");
        }

        let mut updates = 0usize;
        for paper in detailed {
            for id in paper.edge_ids() {
                tracker.bump(id);
                updates += 1;
            }
        }
        info!(updates, tracked = tracker.len(), "Graph expansion counted");

        if tracing::enabled!(Level::DEBUG) {
            for (rank, (id, count)) in tracker
                .top_k_with_counts(self.config.debug_top_n)
                .into_iter()
                .enumerate()
            {
                debug!(rank = rank + 1, count, paper_id = %id, "Frequent paper");
            }
        }
    }
}

/// Announce a stage to the log and the sink, then start its timer
async fn enter(stage: Stage, sink: Option<&dyn ProgressSink>) -> StageTimer {
    let status = stage.status_line();
    info!(stage = stage.label(), "{}", status);

    if let Some(sink) = sink {
        if let Err(e) = sink.notify(&status).await {
            warn!(error = %e, stage = stage.label(), "Progress sink failed, continuing");
        }
    }

    StageTimer::start(stage)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
