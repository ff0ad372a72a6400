use crate::config::WinogradConfig;
use crate::device::{ExecutionQueue, InlineQueue, Job, StreamQueue};
use crate::Result;
use std::sync::Arc;

/// Execution context handed explicitly to every pipeline entry point.
///
/// Cloning is cheap and clones share the same queue.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    queue: Arc<dyn ExecutionQueue>,
    config: WinogradConfig,
}

impl ExecutionContext {
    pub fn new(queue: Arc<dyn ExecutionQueue>, config: WinogradConfig) -> Self {
        Self { queue, config }
    }

    /// Context whose jobs run synchronously at submission
    pub fn inline() -> Self {
        Self::new(Arc::new(InlineQueue::new()), WinogradConfig::default())
    }

    /// Context backed by a dedicated in-order worker thread
    pub fn stream() -> Result<Self> {
        Ok(Self::new(
            Arc::new(StreamQueue::new()?),
            WinogradConfig::default(),
        ))
    }

    /// Replace the configuration, keeping the queue
    pub fn with_config(mut self, config: WinogradConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &WinogradConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<dyn ExecutionQueue> {
        &self.queue
    }

    pub fn submit(&self, label: &str, job: Job) {
        self.queue.submit(label, job);
    }

    /// Block until all issued work has finished, reporting the first
    /// failure on the queue since the last call
    pub fn synchronize(&self) -> Result<()> {
        self.queue.synchronize()
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::inline()
    }
}
