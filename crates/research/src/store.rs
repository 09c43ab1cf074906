//! Paper cache facade
//!
//! Read-through cache over a [`PaperStore`]: lookups that miss are fetched
//! from the [`PaperSource`] in one batch and written back. Store failures
//! never reach the pipeline; a failed read counts as all misses and a failed
//! write is logged and dropped.

use litgraph_common::{metrics, PaperRecord, PaperSource, PaperStore};
use std::iter;
use std::sync::Arc;
use tracing::{info, warn};

pub struct PaperCache {
    store: Arc<dyn PaperStore>,
    source: Arc<dyn PaperSource>,
}

impl PaperCache {
    pub fn new(store: Arc<dyn PaperStore>, source: Arc<dyn PaperSource>) -> Self {
        Self { store, source }
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<dyn PaperStore> {
        &self.store
    }

    /// Resolve ids to records.
    ///
    /// Cached records come first, in request order, followed by whatever the
    /// source returned for the misses. Ids the source cannot resolve are
    /// simply absent from the result.
    pub async fn get_many(&self, ids: &[String]) -> Vec<PaperRecord> {
        if ids.is_empty() {
            return Vec::new();
        }

        let cached = match self.store.get_many(ids).await {
            Ok(cached) => cached,
            Err(e) => {
                warn!(error = %e, store = self.store.name(), "Paper cache read failed, treating all as misses");
                metrics::record_cache_error("get_many");
                Vec::new()
            }
        };

        let mut papers = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();
        let slots = cached.into_iter().chain(iter::repeat_with(|| None));
        for (id, slot) in ids.iter().zip(slots) {
            match slot {
                Some(paper) => papers.push(paper),
                None => missing.push(id.clone()),
            }
        }
        metrics::record_cache(papers.len(), missing.len(), self.store.name());

        if !missing.is_empty() {
            info!(missing = missing.len(), "Fetching papers missing from cache");
            let fetched = self.source.batch_details(&missing).await;
            self.set_many(&fetched).await;
            papers.extend(fetched);
        }

        papers
    }

    /// Write records that carry an id; returns how many were stored
    pub async fn set_many(&self, papers: &[PaperRecord]) -> usize {
        if papers.is_empty() {
            return 0;
        }

        match self.store.set_many(papers).await {
            Ok(stored) => {
                info!(stored, store = self.store.name(), "Stored papers");
                stored
            }
            Err(e) => {
                warn!(error = %e, store = self.store.name(), "Paper cache write failed, continuing without cache");
                metrics::record_cache_error("set_many");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{paper, FailingStore, ScriptedSource};
    use litgraph_common::MemoryStore;

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_mixed_hits_and_backfill() {
        let store = Arc::new(MemoryStore::new());
        let cached_a = paper("a", "Cached A", 3);
        let cached_c = paper("c", "Cached C", 9);
        store.set_many(&[cached_a.clone(), cached_c.clone()]).await.unwrap();

        // The source knows "b" but not "x"
        let source = Arc::new(ScriptedSource::new().with_details(vec![paper("b", "Fetched B", 1)]));
        let cache = PaperCache::new(store.clone(), source.clone());

        let papers = cache.get_many(&ids(&["a", "b", "x", "c"])).await;

        assert_eq!(papers.len(), 3);
        assert_eq!(papers[0], cached_a);
        assert_eq!(papers[1], cached_c);
        assert_eq!(papers[2].title, "Fetched B");

        // Only the misses were requested, in one call
        assert_eq!(source.batch_calls(), vec![ids(&["b", "x"])]);

        // Backfilled records are now cached
        let again = store.get_many(&ids(&["b"])).await.unwrap();
        assert_eq!(again[0].as_ref().map(|p| p.title.as_str()), Some("Fetched B"));
    }

    #[tokio::test]
    async fn test_all_hits_skip_source() {
        let store = Arc::new(MemoryStore::new());
        store.set_many(&[paper("a", "A", 0)]).await.unwrap();
        let source = Arc::new(ScriptedSource::new());
        let cache = PaperCache::new(store, source.clone());

        assert_eq!(cache.get_many(&ids(&["a"])).await.len(), 1);
        assert!(source.batch_calls().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_degrades_to_source() {
        let source = Arc::new(ScriptedSource::new().with_details(vec![paper("a", "A", 0)]));
        let cache = PaperCache::new(Arc::new(FailingStore), source.clone());

        let papers = cache.get_many(&ids(&["a", "b"])).await;
        assert_eq!(papers.len(), 1);
        assert_eq!(source.batch_calls(), vec![ids(&["a", "b"])]);

        assert_eq!(cache.set_many(&papers).await, 0);
    }

    #[tokio::test]
    async fn test_set_many_skips_missing_ids() {
        let store = Arc::new(MemoryStore::new());
        let cache = PaperCache::new(store.clone(), Arc::new(ScriptedSource::new()));

        let orphan = PaperRecord { title: "No id".into(), ..Default::default() };
        assert_eq!(cache.set_many(&[orphan, paper("a", "A", 0)]).await, 1);
        assert_eq!(store.len().await, 1);
    }
}
