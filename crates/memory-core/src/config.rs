use std::path::PathBuf;

/// Process-wide configuration, built once and treated as immutable
/// thereafter. The CLI constructs this from `clap` args with
/// environment fallbacks and passes it once into engine construction.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    pub memory_db_url: PathBuf,
    pub embedding_model: String,
    pub scoring_model: String,
    pub embedding_dim: usize,
    pub decay_base_days: f64,
    pub dedup_threshold: f32,
    pub min_retention: f32,
    pub promotion_stability: f32,
    pub promotion_access: u64,
    pub provider_timeout_secs: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            memory_db_url: PathBuf::from("memory.db"),
            embedding_model: "text-embedding-3-small".to_string(),
            scoring_model: "gpt-5-mini".to_string(),
            embedding_dim: 1536,
            decay_base_days: crate::retention::DECAY_BASE_DAYS,
            dedup_threshold: 0.92,
            min_retention: 0.2,
            promotion_stability: 0.9,
            promotion_access: 10,
            provider_timeout_secs: 30,
        }
    }
}
