use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::model::link::Link;
use crate::model::memory::{Memory, MemoryType};
use crate::retention::retention;
use crate::store::{next_link_states, LinkedMemory, ScoredMemory, Store};

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// A dependency-free `Store` fake used throughout the unit test suite
/// so retention/write/read/link/consolidate logic can be exercised
/// with zero I/O. Not an ANN index: `knn` is brute-force, which is
/// fine at test-sized data volumes.
#[derive(Default)]
pub struct InMemoryStore {
    memories: Mutex<HashMap<Uuid, Memory>>,
    links: Mutex<HashMap<(Uuid, Uuid), Link>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Store for InMemoryStore {
    async fn knn(
        &self,
        agent_id: &str,
        vector: &[f32],
        k: usize,
        min_retention: f32,
        type_filter: Option<MemoryType>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScoredMemory>> {
        let memories = self.memories.lock().unwrap();
        let mut scored: Vec<ScoredMemory> = memories
            .values()
            .filter(|m| !m.is_deleted && m.agent_id == agent_id)
            .filter(|m| type_filter.is_none_or(|t| m.memory_type == t))
            .filter_map(|m| {
                let similarity = cosine_similarity(vector, &m.embedding);
                let last_accessed = DateTime::parse_from_rfc3339(&m.last_accessed)
                    .ok()?
                    .with_timezone(&Utc);
                let r = retention(m.stability, m.importance, last_accessed, now) as f32;
                let expired = m
                    .expires_at
                    .as_deref()
                    .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
                    .is_some_and(|exp| exp.with_timezone(&Utc) <= now);
                let effective_retention = if expired { 0.0 } else { r };
                if min_retention > 0.0 && effective_retention < min_retention {
                    return None;
                }
                Some(ScoredMemory { memory: m.clone(), similarity })
            })
            .collect();
        scored.sort_by(|a, b| {
            let ra = retention_of(a, now);
            let rb = retention_of(b, now);
            let key_a = a.similarity * ra;
            let key_b = b.similarity * rb;
            key_b
                .partial_cmp(&key_a)
                .unwrap()
                .then_with(|| b.memory.created_at.cmp(&a.memory.created_at))
                .then_with(|| a.memory.id.cmp(&b.memory.id))
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn insert(&self, memory: Memory) -> Result<(Uuid, String)> {
        let id = memory.id;
        let created_at = memory.created_at.clone();
        self.memories.lock().unwrap().insert(id, memory);
        Ok((id, created_at))
    }

    async fn reinforce(&self, id: Uuid, now: DateTime<Utc>) -> Result<()> {
        let mut memories = self.memories.lock().unwrap();
        if let Some(m) = memories.get_mut(&id) {
            crate::query::write::apply_reinforcement(m, now);
        }
        Ok(())
    }

    async fn upsert_link(&self, source: Uuid, target: Uuid, increment: f32, now: DateTime<Utc>) -> Result<()> {
        let mut links = self.links.lock().unwrap();
        let existing_forward = links.get(&(source, target)).cloned();
        let existing_backward = links.get(&(target, source)).cloned();
        let (forward, backward) =
            next_link_states(source, target, existing_forward.as_ref(), existing_backward.as_ref(), increment, now);
        links.insert((source, target), forward);
        links.insert((target, source), backward);
        Ok(())
    }

    async fn scan_below_retention(
        &self,
        agent_id: &str,
        threshold: f32,
        exclude_summaries: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<Memory>> {
        let memories = self.memories.lock().unwrap();
        Ok(memories
            .values()
            .filter(|m| !m.is_deleted && m.agent_id == agent_id)
            .filter(|m| !(exclude_summaries && m.is_summary))
            .filter(|m| {
                let last_accessed = DateTime::parse_from_rfc3339(&m.last_accessed)
                    .map(|d| d.with_timezone(&Utc))
                    .unwrap_or(now);
                retention(m.stability, m.importance, last_accessed, now) < threshold as f64
            })
            .cloned()
            .collect())
    }

    async fn scan_promotion(&self, agent_id: &str, stability_min: f32, access_count_min: u64) -> Result<Vec<Memory>> {
        let memories = self.memories.lock().unwrap();
        Ok(memories
            .values()
            .filter(|m| !m.is_deleted && m.agent_id == agent_id)
            .filter(|m| m.memory_type == MemoryType::Semantic)
            .filter(|m| m.stability >= stability_min && m.access_count >= access_count_min)
            .cloned()
            .collect())
    }

    async fn soft_delete_dormant(
        &self,
        agent_id: &str,
        retention_cutoff: f32,
        dormant_for: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let mut memories = self.memories.lock().unwrap();
        let mut count = 0;
        for m in memories.values_mut() {
            if m.is_deleted || m.agent_id != agent_id || m.is_summary {
                continue;
            }
            let last_accessed = match DateTime::parse_from_rfc3339(&m.last_accessed) {
                Ok(d) => d.with_timezone(&Utc),
                Err(_) => continue,
            };
            let r = retention(m.stability, m.importance, last_accessed, now) as f32;
            if r <= retention_cutoff && now - last_accessed >= dormant_for {
                m.is_deleted = true;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn mark_summarized(&self, ids: &[Uuid]) -> Result<()> {
        let mut memories = self.memories.lock().unwrap();
        for id in ids {
            if let Some(m) = memories.get_mut(id) {
                m.is_summary = true;
            }
        }
        Ok(())
    }

    async fn fetch_links(&self, source_ids: &[Uuid], strength_min: f32, limit: usize) -> Result<Vec<LinkedMemory>> {
        let links = self.links.lock().unwrap();
        let memories = self.memories.lock().unwrap();
        let source_set: std::collections::HashSet<Uuid> = source_ids.iter().copied().collect();

        let mut best: HashMap<Uuid, f32> = HashMap::new();
        for ((src, tgt), link) in links.iter() {
            if !source_set.contains(src) || source_set.contains(tgt) || link.strength < strength_min {
                continue;
            }
            let Some(target_memory) = memories.get(tgt) else { continue };
            if target_memory.is_deleted {
                continue;
            }
            best.entry(*tgt)
                .and_modify(|s| *s = s.max(link.strength))
                .or_insert(link.strength);
        }

        let mut results: Vec<LinkedMemory> = best
            .into_iter()
            .filter_map(|(id, strength)| {
                memories.get(&id).map(|m| LinkedMemory { memory: m.clone(), link_strength: strength })
            })
            .collect();
        results.sort_by(|a, b| b.link_strength.partial_cmp(&a.link_strength).unwrap());
        results.truncate(limit);
        Ok(results)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Memory>> {
        Ok(self.memories.lock().unwrap().get(&id).cloned())
    }
}

fn retention_of(scored: &ScoredMemory, now: DateTime<Utc>) -> f32 {
    let last_accessed = DateTime::parse_from_rfc3339(&scored.memory.last_accessed)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or(now);
    retention(scored.memory.stability, scored.memory.importance, last_accessed, now) as f32
}
