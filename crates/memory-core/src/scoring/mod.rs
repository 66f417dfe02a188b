pub mod noop;
pub mod openai;

use crate::error::Result;
use crate::model::memory::Memory;

/// The external scoring port. Every call may fail (network, quota,
/// schema drift); degradation on failure is the *caller's*
/// responsibility, not this trait's — `embed` failures propagate, the
/// others are turned into documented defaults by `query::write` /
/// `query::consolidate`.
#[async_trait::async_trait]
pub trait Scoring: Send + Sync {
    /// Deterministic within a provider session; vector dimension fixed.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Up to `max_k` short keywords.
    async fn extract_topics(&self, text: &str, max_k: usize) -> Result<Vec<String>>;

    /// In `[0, 1]`.
    async fn score_importance(&self, text: &str, context: Option<&str>) -> Result<f32>;

    /// Caller MUST NOT pass an empty list. A single-element list is
    /// returned verbatim, not summarized.
    async fn summarize(&self, memories: &[Memory]) -> Result<String>;

    fn dimensions(&self) -> usize;
}
