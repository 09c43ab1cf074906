//! litgraph research pipeline
//!
//! Turns a research question into a ranked list of core papers and a cited
//! Markdown report by expanding the citation graph around a set of seed
//! papers and counting how often each paper recurs.

pub mod intent;
pub mod progress;
pub mod prompts;
pub mod ranking;
pub mod report;
pub mod store;
pub mod tracker;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use intent::{IntentNormalizer, SearchDirective, SearchMode};
pub use progress::{ChannelSink, ProgressSink};
pub use ranking::Ranker;
pub use report::Reporter;
pub use store::PaperCache;
pub use tracker::FrequencyTracker;
pub use workflow::{ResearchOutcome, ResearchWorkflow, RunStatus, Stage};
