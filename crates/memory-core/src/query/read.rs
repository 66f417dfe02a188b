use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::memory::{Memory, MemoryType};
use crate::query::MemoryEngine;
use crate::retention::retention;
use chrono::Utc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadRequest {
    pub agent_id: String,
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_true")]
    pub include_associations: bool,
    #[serde(default = "default_min_retention")]
    pub min_retention: f32,
    pub memory_types: Option<Vec<MemoryType>>,
}

fn default_limit() -> usize {
    5
}

fn default_true() -> bool {
    true
}

fn default_min_retention() -> f32 {
    0.2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedMemory {
    pub memory: Memory,
    pub similarity: f32,
    pub retention: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociatedMemory {
    pub memory: Memory,
    pub link_strength: f32,
    pub retention: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadOutcome {
    pub query: String,
    pub memories: Vec<RankedMemory>,
    pub associations: Vec<AssociatedMemory>,
    pub primary_count: usize,
    pub association_count: usize,
}

/// Primary similarity search is over memory types individually, but
/// the `Store::knn` port takes a single optional filter; a multi-type
/// request is answered by querying each type and merging, since C2's
/// contract only specifies one `type_filter`.
pub async fn execute(engine: &MemoryEngine, request: ReadRequest) -> Result<ReadOutcome> {
    let vector = engine.scored(engine.scoring.embed(&request.query)).await?;
    let now = Utc::now();

    let primary = match &request.memory_types {
        None => {
            engine
                .store
                .knn(&request.agent_id, &vector, request.limit, request.min_retention, None, now)
                .await?
        }
        Some(types) => {
            let mut merged = Vec::new();
            for t in types {
                merged.extend(
                    engine
                        .store
                        .knn(&request.agent_id, &vector, request.limit, request.min_retention, Some(*t), now)
                        .await?,
                );
            }
            merged.sort_by(|a, b| {
                let key_a = a.similarity * effective_retention(&a.memory, now);
                let key_b = b.similarity * effective_retention(&b.memory, now);
                key_b
                    .partial_cmp(&key_a)
                    .unwrap()
                    .then_with(|| b.memory.created_at.cmp(&a.memory.created_at))
                    .then_with(|| a.memory.id.cmp(&b.memory.id))
            });
            merged.truncate(request.limit);
            merged
        }
    };

    let mut primary_ids = Vec::with_capacity(primary.len());
    for scored in &primary {
        engine.store.reinforce(scored.memory.id, now).await?;
        primary_ids.push(scored.memory.id);
    }

    let associations = if request.include_associations && !primary_ids.is_empty() {
        let fetched = engine.store.fetch_links(&primary_ids, 0.3, request.limit).await?;
        for a in &fetched {
            engine.store.reinforce(a.memory.id, now).await?;
        }
        fetched
    } else {
        Vec::new()
    };

    let memories: Vec<RankedMemory> = primary
        .into_iter()
        .map(|s| {
            let retention = effective_retention(&s.memory, now);
            RankedMemory { memory: s.memory, similarity: s.similarity, retention }
        })
        .collect();

    let mut associations: Vec<AssociatedMemory> = associations
        .into_iter()
        .map(|a| {
            let retention = effective_retention(&a.memory, now);
            AssociatedMemory { memory: a.memory, link_strength: a.link_strength, retention }
        })
        .collect();
    associations.sort_by(|a, b| {
        b.link_strength
            .partial_cmp(&a.link_strength)
            .unwrap()
            .then_with(|| b.retention.partial_cmp(&a.retention).unwrap())
    });

    Ok(ReadOutcome {
        query: request.query,
        primary_count: memories.len(),
        association_count: associations.len(),
        memories,
        associations,
    })
}

fn effective_retention(memory: &Memory, now: chrono::DateTime<Utc>) -> f32 {
    let last_accessed = chrono::DateTime::parse_from_rfc3339(&memory.last_accessed)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or(now);
    retention(memory.stability, memory.importance, last_accessed, now) as f32
}
