use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::query::MemoryEngine;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkOutcome {
    pub source: Uuid,
    pub target: Uuid,
    pub forward_strength: f32,
    pub backward_strength: f32,
}

/// Strengthens (or creates) the association between two existing,
/// non-deleted memories. Both directions are written by the store in
/// one call so the pair never diverges.
pub async fn execute(engine: &MemoryEngine, source: Uuid, target: Uuid, increment: f32) -> Result<LinkOutcome> {
    if source == target {
        return Err(Error::Validation("a memory cannot be linked to itself".to_string()));
    }

    let source_memory = engine
        .store
        .get(source)
        .await?
        .filter(|m| !m.is_deleted)
        .ok_or_else(|| Error::NotFound(format!("memory {source} not found")))?;
    let target_memory = engine
        .store
        .get(target)
        .await?
        .filter(|m| !m.is_deleted)
        .ok_or_else(|| Error::NotFound(format!("memory {target} not found")))?;

    engine.store.upsert_link(source_memory.id, target_memory.id, increment, Utc::now()).await?;

    let forward = engine.store.fetch_links(&[source], 0.0, usize::MAX).await?;
    let backward = engine.store.fetch_links(&[target], 0.0, usize::MAX).await?;
    let forward_strength = forward.iter().find(|l| l.memory.id == target).map(|l| l.link_strength).unwrap_or(0.0);
    let backward_strength = backward.iter().find(|l| l.memory.id == source).map(|l| l.link_strength).unwrap_or(0.0);

    Ok(LinkOutcome { source, target, forward_strength, backward_strength })
}
