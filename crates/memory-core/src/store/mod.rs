pub mod duckdb;
pub mod memory;
pub mod migrations;

use crate::error::Result;
use crate::model::link::Link;
use crate::model::memory::{Memory, MemoryType};
use uuid::Uuid;

/// A `knn` hit: the candidate plus the raw cosine similarity the index
/// returned (retention is derived by the caller, not stored here).
#[derive(Debug, Clone)]
pub struct ScoredMemory {
    pub memory: Memory,
    pub similarity: f32,
}

/// A `fetch_links` hit: the associated memory plus the strength of the
/// edge that surfaced it.
#[derive(Debug, Clone)]
pub struct LinkedMemory {
    pub memory: Memory,
    pub link_strength: f32,
}

/// The persistence port: everything the write/read/link/consolidate
/// paths need from storage, with one operation per concern so each
/// adapter owns its own transactional boundaries.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Nearest neighbors by cosine similarity, restricted to
    /// `is_deleted = false` and (if `type_filter` is set) the given
    /// `MemoryType`. Retention is computed by the caller against
    /// `now`, not by the store, but implementations MAY exclude rows
    /// they can already tell will score below `min_retention`.
    async fn knn(
        &self,
        agent_id: &str,
        vector: &[f32],
        k: usize,
        min_retention: f32,
        type_filter: Option<MemoryType>,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<ScoredMemory>>;

    /// Inserts a new memory and returns its assigned id/created_at.
    async fn insert(&self, memory: Memory) -> Result<(Uuid, String)>;

    /// Applies the reinforcement update (stability/last_accessed/access_count)
    /// to one memory, atomically, relative to `now`.
    async fn reinforce(&self, id: Uuid, now: chrono::DateTime<chrono::Utc>) -> Result<()>;

    /// Symmetric upsert of one logical association: both
    /// `(source, target)` and `(target, source)` rows are created or
    /// strengthened in the same transaction.
    async fn upsert_link(&self, source: Uuid, target: Uuid, increment: f32, now: chrono::DateTime<chrono::Utc>) -> Result<()>;

    /// Non-summary memories whose retention (relative to `now`) is
    /// below `threshold`.
    async fn scan_below_retention(
        &self,
        agent_id: &str,
        threshold: f32,
        exclude_summaries: bool,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<Memory>>;

    /// Semantic memories meeting both the stability and access-count
    /// floors, for client-driven promotion.
    async fn scan_promotion(&self, agent_id: &str, stability_min: f32, access_count_min: u64) -> Result<Vec<Memory>>;

    /// Soft-deletes (sets `is_deleted = true`) every non-summary memory
    /// whose retention (relative to `now`) is at or below
    /// `retention_cutoff` AND whose `last_accessed` is at least
    /// `dormant_for` in the past. Returns the count affected.
    async fn soft_delete_dormant(
        &self,
        agent_id: &str,
        retention_cutoff: f32,
        dormant_for: chrono::Duration,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<usize>;

    /// Sets `is_summary = true` on every id in `ids`.
    async fn mark_summarized(&self, ids: &[Uuid]) -> Result<()>;

    /// Up to `limit` distinct associated memories reachable from
    /// `source_ids` with `strength >= strength_min`, excluding deleted
    /// memories and anything already in `source_ids`. When a candidate
    /// is reachable from more than one source, the strongest edge wins.
    async fn fetch_links(&self, source_ids: &[Uuid], strength_min: f32, limit: usize) -> Result<Vec<LinkedMemory>>;

    /// Fetches one memory by id, for the link manager's existence check.
    async fn get(&self, id: Uuid) -> Result<Option<Memory>>;
}

pub use link_helpers::*;

mod link_helpers {
    use super::Link;
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    /// Builds the two complementary rows a symmetric `upsert_link` call
    /// needs to write, given the current state of each half (`None` if
    /// absent).
    pub fn next_link_states(
        source: Uuid,
        target: Uuid,
        existing_forward: Option<&Link>,
        existing_backward: Option<&Link>,
        increment: f32,
        now: DateTime<Utc>,
    ) -> (Link, Link) {
        let forward = match existing_forward {
            None => Link {
                source_id: source,
                target_id: target,
                strength: Link::INITIAL_STRENGTH,
                link_type: Link::DEFAULT_TYPE.to_string(),
                created_at: now.to_rfc3339(),
                updated_at: now.to_rfc3339(),
            },
            Some(link) => Link {
                strength: (link.strength + increment).min(1.0),
                updated_at: now.to_rfc3339(),
                ..link.clone()
            },
        };
        let backward = match existing_backward {
            None => Link {
                source_id: target,
                target_id: source,
                strength: Link::INITIAL_STRENGTH,
                link_type: Link::DEFAULT_TYPE.to_string(),
                created_at: now.to_rfc3339(),
                updated_at: now.to_rfc3339(),
            },
            Some(link) => Link {
                strength: (link.strength + increment).min(1.0),
                updated_at: now.to_rfc3339(),
                ..link.clone()
            },
        };
        (forward, backward)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn fresh_pair_starts_at_initial_strength() {
            let now = Utc::now();
            let (f, b) = next_link_states(Uuid::now_v7(), Uuid::now_v7(), None, None, 0.1, now);
            assert_eq!(f.strength, Link::INITIAL_STRENGTH);
            assert_eq!(b.strength, Link::INITIAL_STRENGTH);
        }

        #[test]
        fn existing_pair_increments_and_caps_at_one() {
            let now = Utc::now();
            let source = Uuid::now_v7();
            let target = Uuid::now_v7();
            let existing = Link {
                source_id: source,
                target_id: target,
                strength: 0.95,
                link_type: "association".to_string(),
                created_at: now.to_rfc3339(),
                updated_at: now.to_rfc3339(),
            };
            let (f, _) = next_link_states(source, target, Some(&existing), None, 0.2, now);
            assert_eq!(f.strength, 1.0);
        }
    }
}
