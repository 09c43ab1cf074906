//! Test doubles for the pipeline's collaborators

use crate::progress::ProgressSink;
use crate::prompts::{INTENT_SYSTEM_PROMPT, RANKING_SYSTEM_PROMPT, REPORTING_SYSTEM_PROMPT};
use async_trait::async_trait;
use litgraph_common::{
    AppError, CompletionClient, CompletionRequest, PaperRecord, PaperRef, PaperSource, PaperStore,
    Result,
};
use std::collections::HashMap;
use std::sync::Mutex;

pub fn paper(id: &str, title: &str, citations: u64) -> PaperRecord {
    PaperRecord {
        paper_id: Some(id.to_string()),
        title: title.to_string(),
        citation_count: citations,
        ..Default::default()
    }
}

/// `paper` with reference edges
pub fn citing(id: &str, references: &[&str]) -> PaperRecord {
    PaperRecord {
        references: references
            .iter()
            .map(|r| PaperRef { paper_id: r.to_string(), title: None })
            .collect(),
        ..paper(id, &format!("Paper {}", id), 0)
    }
}

/// Paper source answering from fixed data and recording every call
#[derive(Default)]
pub struct ScriptedSource {
    keyword: Vec<PaperRecord>,
    title: Option<PaperRecord>,
    details: HashMap<String, PaperRecord>,
    keyword_calls: Mutex<Vec<(String, usize)>>,
    title_calls: Mutex<Vec<String>>,
    batch_calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keyword(mut self, papers: Vec<PaperRecord>) -> Self {
        self.keyword = papers;
        self
    }

    pub fn with_title(mut self, paper: PaperRecord) -> Self {
        self.title = Some(paper);
        self
    }

    pub fn with_details(mut self, papers: Vec<PaperRecord>) -> Self {
        for paper in papers {
            if let Some(id) = paper.id() {
                self.details.insert(id.to_string(), paper.clone());
            }
        }
        self
    }

    pub fn keyword_calls(&self) -> Vec<(String, usize)> {
        self.keyword_calls.lock().unwrap().clone()
    }

    pub fn title_calls(&self) -> Vec<String> {
        self.title_calls.lock().unwrap().clone()
    }

    pub fn batch_calls(&self) -> Vec<Vec<String>> {
        self.batch_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaperSource for ScriptedSource {
    async fn search_by_keyword(&self, query: &str, limit: usize) -> Vec<PaperRecord> {
        self.keyword_calls.lock().unwrap().push((query.to_string(), limit));
        self.keyword.iter().take(limit).cloned().collect()
    }

    async fn search_by_title(&self, title: &str) -> Option<PaperRecord> {
        self.title_calls.lock().unwrap().push(title.to_string());
        self.title.clone()
    }

    async fn batch_details(&self, ids: &[String]) -> Vec<PaperRecord> {
        self.batch_calls.lock().unwrap().push(ids.to_vec());
        ids.iter().filter_map(|id| self.details.get(id).cloned()).collect()
    }
}

/// Scripted answer for one kind of completion call
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Fail,
    Panic,
}

impl Reply {
    pub fn text(body: &str) -> Self {
        Reply::Text(body.to_string())
    }
}

/// Completion client routed by system prompt
pub struct ScriptedCompletion {
    intent: Reply,
    ranking: Reply,
    reporting: Reply,
    calls: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    /// Every call fails until scripted otherwise
    pub fn new() -> Self {
        Self {
            intent: Reply::Fail,
            ranking: Reply::Fail,
            reporting: Reply::Fail,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn intent(mut self, reply: Reply) -> Self {
        self.intent = reply;
        self
    }

    pub fn ranking(mut self, reply: Reply) -> Self {
        self.ranking = reply;
        self
    }

    pub fn reporting(mut self, reply: Reply) -> Self {
        self.reporting = reply;
        self
    }

    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.calls.lock().unwrap().push(request.clone());

        let reply = match request.system.as_str() {
            INTENT_SYSTEM_PROMPT => Some(&self.intent),
            RANKING_SYSTEM_PROMPT => Some(&self.ranking),
            REPORTING_SYSTEM_PROMPT => Some(&self.reporting),
            _ => None,
        };

        match reply {
            Some(Reply::Text(body)) => Ok(body.clone()),
            Some(Reply::Panic) => panic!("scripted panic"),
            Some(Reply::Fail) | None => Err(AppError::Completion {
                message: "scripted failure".to_string(),
            }),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Progress sink that records messages, optionally failing every call
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProgressSink for RecordingSink {
    async fn notify(&self, status: &str) -> Result<()> {
        self.messages.lock().unwrap().push(status.to_string());
        if self.fail {
            return Err(AppError::Internal {
                message: "sink unavailable".to_string(),
            });
        }
        Ok(())
    }
}

/// Store whose every operation fails
pub struct FailingStore;

#[async_trait]
impl PaperStore for FailingStore {
    async fn get_many(&self, _ids: &[String]) -> Result<Vec<Option<PaperRecord>>> {
        Err(AppError::CacheError { message: "store down".to_string() })
    }

    async fn set_many(&self, _papers: &[PaperRecord]) -> Result<usize> {
        Err(AppError::CacheError { message: "store down".to_string() })
    }

    async fn ping(&self) -> Result<()> {
        Err(AppError::CacheError { message: "store down".to_string() })
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}
