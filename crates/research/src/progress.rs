//! Progress reporting
//!
//! The workflow announces every stage through a [`ProgressSink`]. Sinks are
//! observational only: a failing sink is logged and the run continues.

use async_trait::async_trait;
use litgraph_common::{AppError, Result};
use tokio::sync::mpsc;

/// Receiver of human-readable stage announcements
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn notify(&self, status: &str) -> Result<()>;
}

/// Forwards announcements over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ProgressSink for ChannelSink {
    async fn notify(&self, status: &str) -> Result<()> {
        self.tx
            .send(status.to_string())
            .map_err(|_| AppError::Internal {
                message: "progress receiver closed".to_string(),
            })
    }
}
