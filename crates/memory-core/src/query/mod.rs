pub mod consolidate;
pub mod link;
pub mod read;
pub mod write;

use std::sync::Arc;
use std::time::Duration;

use crate::config::MemoryConfig;
use crate::error::{Error, Result};
use crate::scoring::Scoring;
use crate::store::Store;

/// Composes the `Store` and `Scoring` ports behind one `Clone`-able,
/// `Arc`-backed handle so multiple async tasks can drive it
/// concurrently. Every component operation (write/read/link/
/// consolidate) is a thin method here that delegates to its own
/// module, mirroring each step's own top-level `execute` function.
#[derive(Clone)]
pub struct MemoryEngine {
    store: Arc<dyn Store>,
    scoring: Arc<dyn Scoring>,
    config: MemoryConfig,
}

impl MemoryEngine {
    pub fn new(store: Arc<dyn Store>, scoring: Arc<dyn Scoring>, config: MemoryConfig) -> Self {
        Self { store, scoring, config }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn scoring(&self) -> &Arc<dyn Scoring> {
        &self.scoring
    }

    /// Wraps a scoring call with the configured provider timeout,
    /// surfacing `Error::Cancelled` on expiry rather than letting the
    /// caller hang indefinitely on a wedged provider.
    pub(crate) async fn scored<T>(&self, fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(Duration::from_secs(self.config.provider_timeout_secs), fut)
            .await
            .map_err(|_| Error::Cancelled)?
    }

    pub async fn write(&self, request: write::WriteRequest) -> Result<write::WriteOutcome> {
        write::execute(self, request).await
    }

    pub async fn read(&self, request: read::ReadRequest) -> Result<read::ReadOutcome> {
        read::execute(self, request).await
    }

    pub async fn link(&self, source: uuid::Uuid, target: uuid::Uuid, increment: f32) -> Result<link::LinkOutcome> {
        link::execute(self, source, target, increment).await
    }

    pub async fn consolidate(&self, request: consolidate::ConsolidateRequest) -> Result<consolidate::ConsolidateReport> {
        consolidate::execute(self, request).await
    }
}
