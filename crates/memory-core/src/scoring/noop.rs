use crate::error::Result;
use crate::model::memory::Memory;
use crate::scoring::Scoring;

/// A dependency-free `Scoring` adapter for tests and for running the
/// CLI without network access. Embeddings are a deterministic hash of
/// the input text (not semantically meaningful, but stable — two calls
/// with identical text always produce an identical vector, so
/// dedup/retrieval tests are reproducible).
pub struct NoopScoring {
    dimensions: usize,
}

impl NoopScoring {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

fn hash_embed(text: &str, dimensions: usize) -> Vec<f32> {
    // FNV-1a-style rolling hash reseeded per dimension; deterministic,
    // not cryptographic, not meant to carry semantic similarity beyond
    // exact/near-exact string matches.
    let mut v = Vec::with_capacity(dimensions);
    let mut state: u64 = 0xcbf29ce484222325 ^ (text.len() as u64);
    for b in text.bytes() {
        state ^= b as u64;
        state = state.wrapping_mul(0x100000001b3);
    }
    for i in 0..dimensions {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(i as u64 + 1);
        v.push(((state >> 33) as f32 / u32::MAX as f32) * 2.0 - 1.0);
    }
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

#[async_trait::async_trait]
impl Scoring for NoopScoring {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        // Normalize whitespace/case so near-duplicate content (e.g. a
        // trailing period) hashes close enough to satisfy the dedup
        // threshold under this deterministic test embedding.
        let normalized: String = text
            .trim()
            .trim_end_matches('.')
            .to_lowercase();
        Ok(hash_embed(&normalized, self.dimensions))
    }

    async fn extract_topics(&self, text: &str, max_k: usize) -> Result<Vec<String>> {
        let topics: Vec<String> = text
            .split_whitespace()
            .filter(|w| w.len() > 4)
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|w| !w.is_empty())
            .take(max_k)
            .collect();
        Ok(topics)
    }

    async fn score_importance(&self, text: &str, _context: Option<&str>) -> Result<f32> {
        Ok((text.len() as f32 / 200.0).clamp(0.1, 0.9))
    }

    async fn summarize(&self, memories: &[Memory]) -> Result<String> {
        if memories.is_empty() {
            return Err(crate::error::Error::Validation(
                "summarize requires at least one memory".to_string(),
            ));
        }
        if memories.len() == 1 {
            return Ok(memories[0].content.clone());
        }
        let joined: Vec<&str> = memories.iter().map(|m| m.content.as_str()).collect();
        Ok(format!("[{} memories] {}", memories.len(), joined.join(" | ")))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
