use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::memory::{Memory, MemoryType};
use crate::query::MemoryEngine;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteRequest {
    pub agent_id: String,
    pub content: String,
    pub memory_type: Option<MemoryType>,
    pub importance: Option<f32>,
    pub topics: Option<Vec<String>>,
    pub event_date: Option<String>,
    pub expires_at: Option<String>,
    pub channel: Option<String>,
    pub session: Option<String>,
    #[serde(default)]
    pub skip_dedup: bool,
    #[serde(default)]
    pub auto_score_importance: bool,
    #[serde(default)]
    pub auto_extract_topics: bool,
    #[serde(default = "default_dedup_threshold")]
    pub dedup_threshold: f32,
}

fn default_dedup_threshold() -> f32 {
    0.92
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WriteOutcome {
    Created { id: Uuid, created_at: String },
    Reinforced { id: Uuid, existing_content: String, similarity: f32 },
}

pub async fn execute(engine: &MemoryEngine, request: WriteRequest) -> Result<WriteOutcome> {
    if request.content.trim().is_empty() {
        return Err(Error::Validation("content cannot be empty".to_string()));
    }
    if request.agent_id.trim().is_empty() || request.agent_id.len() > 50 {
        return Err(Error::Validation("agent_id must be 1-50 characters".to_string()));
    }
    if let Some(importance) = request.importance {
        if !(0.0..=1.0).contains(&importance) {
            return Err(Error::Validation("importance must be in [0, 1]".to_string()));
        }
    }

    let importance = match request.importance {
        Some(i) => i,
        None if request.auto_score_importance => engine
            .scored(engine.scoring.score_importance(&request.content, None))
            .await
            .unwrap_or(0.5),
        None => 0.5,
    };

    let topics = match request.topics {
        Some(t) => t,
        None if request.auto_extract_topics => engine
            .scored(engine.scoring.extract_topics(&request.content, 5))
            .await
            .unwrap_or_default(),
        None => Vec::new(),
    };

    let embedding = engine.scored(engine.scoring.embed(&request.content)).await?;

    if !request.skip_dedup {
        let candidates = engine
            .store
            .knn(&request.agent_id, &embedding, 1, 0.0, None, Utc::now())
            .await?;
        if let Some(top) = candidates.first() {
            if top.similarity > request.dedup_threshold && !top.memory.is_deleted {
                engine.store.reinforce(top.memory.id, Utc::now()).await?;
                return Ok(WriteOutcome::Reinforced {
                    id: top.memory.id,
                    existing_content: top.memory.content.clone(),
                    similarity: top.similarity,
                });
            }
        }
    }

    let now = Utc::now();
    let now_str = now.to_rfc3339();
    let memory = Memory {
        id: Uuid::now_v7(),
        agent_id: request.agent_id,
        content: request.content,
        embedding,
        memory_type: request.memory_type.unwrap_or(MemoryType::Episodic),
        topics,
        importance,
        stability: Memory::INITIAL_STABILITY,
        created_at: now_str.clone(),
        event_date: request.event_date,
        expires_at: request.expires_at,
        last_accessed: now_str,
        access_count: 0,
        source_channel: request.channel,
        source_session: request.session,
        is_summary: false,
        summarizes: Vec::new(),
        is_deleted: false,
    };

    let (id, created_at) = engine.store.insert(memory).await?;
    tracing::debug!(memory_id = %id, "memory created");
    Ok(WriteOutcome::Created { id, created_at })
}

/// The reinforcement update applied on every recall and every
/// dedup-collapsed write: widely spaced re-access grows stability
/// faster than a burst of back-to-back retrievals.
pub fn apply_reinforcement(memory: &mut Memory, now: DateTime<Utc>) {
    let last_accessed = DateTime::parse_from_rfc3339(&memory.last_accessed)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or(now);
    let days_since_access = (now - last_accessed).num_milliseconds() as f64 / 86_400_000.0;
    let spacing_bonus = (days_since_access / 7.0).min(2.0).max(0.0);
    memory.stability = (memory.stability as f64 + 0.1 * spacing_bonus).min(1.0) as f32;
    memory.last_accessed = now.to_rfc3339();
    memory.access_count += 1;
}
