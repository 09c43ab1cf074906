//! Paper cache
//!
//! Provides:
//! - The [`PaperStore`] seam used by the research pipeline
//! - A Redis-backed store (one MGET per lookup, pipelined SET EX writes)
//! - An in-process store for local runs and tests

use crate::config::RedisConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::models::PaperRecord;
use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, Client};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Key-value store for normalised papers, keyed by paper id
#[async_trait]
pub trait PaperStore: Send + Sync {
    /// Look up every id; the result has one slot per input id, in order.
    async fn get_many(&self, ids: &[String]) -> Result<Vec<Option<PaperRecord>>>;

    /// Write every paper that has an id; returns how many were written.
    async fn set_many(&self, papers: &[PaperRecord]) -> Result<usize>;

    /// Check connectivity
    async fn ping(&self) -> Result<()>;

    /// Short name used in logs and metrics
    fn name(&self) -> &'static str;
}

/// Redis paper store
pub struct RedisStore {
    connection: RwLock<MultiplexedConnection>,
    config: RedisConfig,
}

impl RedisStore {
    /// Connect to the configured Redis URL
    pub async fn connect(url: &str, config: RedisConfig) -> Result<Self> {
        let client = Client::open(url).map_err(|e| AppError::CacheError {
            message: format!("Failed to create Redis client: {}", e),
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Failed to connect to Redis: {}", e),
            })?;

        Ok(Self {
            connection: RwLock::new(connection),
            config,
        })
    }

    /// Build a prefixed key
    fn key(&self, paper_id: &str) -> String {
        keys::paper(&self.config.key_prefix, paper_id)
    }
}

#[async_trait]
impl PaperStore for RedisStore {
    async fn get_many(&self, ids: &[String]) -> Result<Vec<Option<PaperRecord>>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let full_keys: Vec<String> = ids.iter().map(|id| self.key(id)).collect();
        let mut conn = self.connection.write().await;

        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&full_keys)
            .query_async(&mut *conn)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Failed to read {} keys: {}", full_keys.len(), e),
            })?;
        drop(conn);

        let papers: Vec<Option<PaperRecord>> = values
            .into_iter()
            .zip(full_keys.iter())
            .map(|(value, key)| {
                let json = value?;
                match serde_json::from_str(&json) {
                    Ok(paper) => Some(paper),
                    Err(e) => {
                        warn!(key = %key, error = %e, "Undecodable cache entry, treating as miss");
                        None
                    }
                }
            })
            .collect();

        let hits = papers.iter().filter(|p| p.is_some()).count();
        debug!(requested = ids.len(), hits, "Cache lookup");
        Ok(papers)
    }

    async fn set_many(&self, papers: &[PaperRecord]) -> Result<usize> {
        let mut pipe = redis::pipe();
        let mut written = 0;

        for paper in papers {
            let Some(id) = paper.id() else { continue };
            let json = serde_json::to_string(paper).map_err(|e| AppError::CacheError {
                message: format!("Failed to serialize paper '{}': {}", id, e),
            })?;
            pipe.set_ex(self.key(id), json, self.config.default_ttl_secs).ignore();
            written += 1;
        }

        if written == 0 {
            return Ok(0);
        }

        let mut conn = self.connection.write().await;
        pipe.query_async::<()>(&mut *conn)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Failed to write {} papers: {}", written, e),
            })?;

        debug!(written, ttl_secs = self.config.default_ttl_secs, "Cache set");
        Ok(written)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.write().await;
        redis::cmd("PING")
            .query_async::<String>(&mut *conn)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Redis ping failed: {}", e),
            })?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

/// In-process paper store.
///
/// Entries never expire; a process-lifetime cache is what local runs want.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, PaperRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl PaperStore for MemoryStore {
    async fn get_many(&self, ids: &[String]) -> Result<Vec<Option<PaperRecord>>> {
        let entries = self.entries.read().await;
        Ok(ids.iter().map(|id| entries.get(id).cloned()).collect())
    }

    async fn set_many(&self, papers: &[PaperRecord]) -> Result<usize> {
        let mut entries = self.entries.write().await;
        let mut written = 0;
        for paper in papers {
            if let Some(id) = paper.id() {
                entries.insert(id.to_string(), paper.clone());
                written += 1;
            }
        }
        Ok(written)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Open the configured store.
///
/// Falls back to [`MemoryStore`] when no URL is configured or Redis is
/// unreachable, so a missing cache never blocks a run.
pub async fn connect_store(config: &RedisConfig) -> Arc<dyn PaperStore> {
    let Some(url) = config.url.as_deref().filter(|u| !u.is_empty()) else {
        info!("No Redis URL configured, using in-process paper store");
        return Arc::new(MemoryStore::new());
    };

    match RedisStore::connect(url, config.clone()).await {
        Ok(store) => {
            info!(prefix = %config.key_prefix, "Connected to Redis paper store");
            Arc::new(store)
        }
        Err(e) => {
            warn!(error = %e, "Redis unavailable, falling back to in-process paper store");
            metrics::record_cache_error("connect");
            Arc::new(MemoryStore::new())
        }
    }
}

/// Cache key builders
pub mod keys {
    /// Build a paper cache key
    pub fn paper(prefix: &str, paper_id: &str) -> String {
        format!("{}:{}", prefix, paper_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(id: Option<&str>, title: &str) -> PaperRecord {
        PaperRecord {
            paper_id: id.map(str::to_string),
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_key_builder() {
        assert_eq!(keys::paper("litgraph:paper", "abc"), "litgraph:paper:abc");
    }

    #[tokio::test]
    async fn test_memory_store_preserves_request_order() {
        let store = MemoryStore::new();
        let written = store
            .set_many(&[paper(Some("a"), "A"), paper(Some("b"), "B")])
            .await
            .unwrap();
        assert_eq!(written, 2);

        let ids = vec!["b".to_string(), "x".to_string(), "a".to_string()];
        let found = store.get_many(&ids).await.unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].as_ref().unwrap().title, "B");
        assert!(found[1].is_none());
        assert_eq!(found[2].as_ref().unwrap().title, "A");
    }

    #[tokio::test]
    async fn test_memory_store_skips_papers_without_id() {
        let store = MemoryStore::new();
        let written = store
            .set_many(&[paper(None, "orphan"), paper(Some(""), "blank"), paper(Some("a"), "A")])
            .await
            .unwrap();
        assert_eq!(written, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_connect_without_url_uses_memory() {
        let store = connect_store(&RedisConfig::default()).await;
        assert_eq!(store.name(), "memory");
        assert!(store.ping().await.is_ok());
    }
}
